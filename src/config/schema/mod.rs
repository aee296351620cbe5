use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::HrmailError;

/// Minimum length of the session signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 16;

/// Upper bound for `mailbox.listLimit`.
const MAX_LIST_LIMIT: usize = 10_000;

/// Longest session lifetime accepted from config or the CLI: one year.
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Generates a `Debug` impl that redacts secret fields.
///
/// Field specifiers:
/// - `field_name`            : printed normally via `&self.field_name`
/// - `redact(field_name)`    : `String` field: shows `[empty]` or `[REDACTED]`
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mailbox
// ---------------------------------------------------------------------------

fn default_database_path() -> String {
    "~/.hrmail/mailbox.db".to_string()
}

fn default_list_limit() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    #[serde(default = "default_database_path", rename = "databasePath")]
    pub database_path: String,
    /// Maximum rows returned by the inbox and sent listings.
    #[serde(default = "default_list_limit", rename = "listLimit")]
    pub list_limit: usize,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            list_limit: default_list_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

fn default_cookie_name() -> String {
    "hrmail_session".to_string()
}

fn default_ttl_secs() -> u64 {
    12 * 60 * 60
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HMAC key for session cookies. Usually injected via `HRMAIL_SESSION_SECRET`.
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_cookie_name", rename = "cookieName")]
    pub cookie_name: String,
    #[serde(default = "default_ttl_secs", rename = "ttlSecs")]
    pub ttl_secs: u64,
}

redact_debug!(SessionConfig, redact(secret), cookie_name, ttl_secs,);

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: default_cookie_name(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    pub fn database_path(&self) -> PathBuf {
        crate::utils::expand_home(&self.mailbox.database_path)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), HrmailError> {
        self.validate_gateway()?;
        self.validate_mailbox()?;
        self.validate_session()?;
        Ok(())
    }

    /// Stricter check run before serving: a signing secret must be present.
    pub fn require_session_secret(&self) -> Result<(), HrmailError> {
        if self.session.secret.is_empty() {
            return Err(HrmailError::Config(
                "session.secret must be set (or HRMAIL_SESSION_SECRET) before serving".into(),
            ));
        }
        Ok(())
    }

    fn validate_gateway(&self) -> Result<(), HrmailError> {
        if self.gateway.port == 0 {
            return Err(HrmailError::Config("gateway.port must be > 0".into()));
        }
        if self.gateway.host.trim().is_empty() {
            return Err(HrmailError::Config("gateway.host must not be empty".into()));
        }
        Ok(())
    }

    fn validate_mailbox(&self) -> Result<(), HrmailError> {
        let m = &self.mailbox;
        if m.database_path.trim().is_empty() {
            return Err(HrmailError::Config(
                "mailbox.databasePath must not be empty".into(),
            ));
        }
        if m.list_limit == 0 {
            return Err(HrmailError::Config("mailbox.listLimit must be > 0".into()));
        }
        if m.list_limit > MAX_LIST_LIMIT {
            return Err(HrmailError::Config(format!(
                "mailbox.listLimit is unreasonably large (> {MAX_LIST_LIMIT})"
            )));
        }
        Ok(())
    }

    fn validate_session(&self) -> Result<(), HrmailError> {
        let s = &self.session;
        if s.ttl_secs == 0 {
            return Err(HrmailError::Config("session.ttlSecs must be > 0".into()));
        }
        if s.ttl_secs > MAX_TTL_SECS {
            return Err(HrmailError::Config(format!(
                "session.ttlSecs is unreasonably large (> {MAX_TTL_SECS})"
            )));
        }
        if s.cookie_name.is_empty()
            || !s
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(HrmailError::Config(
                "session.cookieName must be non-empty and use only [A-Za-z0-9_-]".into(),
            ));
        }
        if !s.secret.is_empty() && s.secret.len() < MIN_SECRET_LEN {
            return Err(HrmailError::Config(format!(
                "session.secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        Ok(())
    }
}
