//! Signed session cookies.
//!
//! A token is `base64url(claims_json) "." hex(hmac_sha256(secret, base64_part))`.
//! Login is handled elsewhere; this module only mints and verifies tokens so
//! the gateway can gate routes by role.
use std::fmt;
use std::str::FromStr;

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::MIN_SECRET_LEN;
use crate::errors::{HrmailError, HrmailResult};

type HmacSha256 = Hmac<Sha256>;

/// Tokens longer than this are rejected before any decoding.
const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Hr,
    Employee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hr => "hr",
            Self::Employee => "employee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HrmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hr" => Ok(Self::Hr),
            "employee" => Ok(Self::Employee),
            other => Err(HrmailError::Config(format!(
                "unknown role '{}', expected hr or employee",
                other
            ))),
        }
    }
}

/// What a session token asserts about its holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub uid: i64,
    pub username: String,
    pub role: Role,
    /// Expiry as unix seconds.
    pub exp: i64,
}

impl SessionClaims {
    pub fn is_hr(&self) -> bool {
        self.role == Role::Hr
    }
}

/// HMAC key used to sign and verify session tokens.
#[derive(Clone)]
pub struct SessionKey {
    secret: Vec<u8>,
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SessionKey {
    pub fn new(secret: &str) -> HrmailResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(HrmailError::Config(format!(
                "session secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
        })
    }

    fn mac(&self, payload: &[u8]) -> HrmailResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| HrmailError::Internal(anyhow::anyhow!("invalid HMAC key: {}", e)))?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn sign(&self, claims: &SessionClaims) -> HrmailResult<String> {
        let json = serde_json::to_vec(claims).map_err(anyhow::Error::from)?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let sig = self.mac(payload.as_bytes())?;
        Ok(format!("{}.{}", payload, sig))
    }

    /// Mint a token for `username` valid for `ttl` from `now`.
    pub fn issue(
        &self,
        uid: i64,
        username: &str,
        role: Role,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> HrmailResult<String> {
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| HrmailError::Config("session ttl out of range".into()))?;
        self.sign(&SessionClaims {
            uid,
            username: username.to_string(),
            role,
            exp: exp.timestamp(),
        })
    }

    /// Check signature and expiry, returning the claims on success.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> HrmailResult<SessionClaims> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(HrmailError::Auth("session token too long".into()));
        }
        let (payload, sig) = token
            .rsplit_once('.')
            .ok_or_else(|| HrmailError::Auth("malformed session token".into()))?;

        let expected = self.mac(payload.as_bytes())?;
        if !bool::from(expected.as_bytes().ct_eq(sig.as_bytes())) {
            return Err(HrmailError::Auth("invalid session signature".into()));
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| HrmailError::Auth("malformed session payload".into()))?;
        let claims: SessionClaims = serde_json::from_slice(&json)
            .map_err(|_| HrmailError::Auth("malformed session claims".into()))?;

        if claims.exp <= now.timestamp() {
            return Err(HrmailError::Auth("session expired".into()));
        }
        Ok(claims)
    }
}

/// Find a cookie by name in the request headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

/// `Set-Cookie` value that installs a session token.
pub fn session_cookie(name: &str, token: &str, max_age_secs: u64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, token, max_age_secs
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}

#[cfg(test)]
mod tests;
