use thiserror::Error;

/// Typed error hierarchy for hrmail.
///
/// Use at module boundaries (config validation, sessions, mailbox access).
/// Internal/leaf functions can continue using `anyhow::Result`; the `Internal` variant
/// allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum HrmailError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Mailbox error: {0}")]
    Storage(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using `HrmailError`.
pub type HrmailResult<T> = std::result::Result<T, HrmailError>;

impl HrmailError {
    /// Whether the caller should be sent back to the login page rather than
    /// shown a failure.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Wrap a mailbox failure, keeping the full cause chain in the message.
    pub fn storage(err: &anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", err))
    }
}
