//! Token encoding and expiry decoding
//!
//! Pure functions, no I/O. Catalog tokens are `mock-jwt-` followed by the
//! standard base64 of a JSON claims object whose `exp` is unix milliseconds.
//! Three-part JWTs are also accepted for expiry checks; their `exp` is in
//! seconds and is converted to milliseconds.
//!
//! Decoding does not verify anything. The client only needs the expiry to
//! skip refresh calls that cannot succeed; the backend is the authority.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::constants::TOKEN_PREFIX;
use crate::error::{Error, Result};

/// Which half of a token pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by a catalog token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TokenKind>,
    /// Unique per issued token, so two pairs minted in the same millisecond differ
    #[serde(default)]
    pub jti: String,
    /// Expiry as unix timestamp in milliseconds
    pub exp: u64,
}

impl Claims {
    /// Claims for a token of `kind` expiring `ttl` from now.
    pub fn new(sub: impl Into<String>, kind: TokenKind, ttl: Duration) -> Self {
        Self {
            sub: sub.into(),
            username: None,
            kind: Some(kind),
            jti: uuid::Uuid::new_v4().to_string(),
            exp: now_millis().saturating_add(ttl.as_millis() as u64),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Override the expiry (absolute unix milliseconds).
    pub fn expiring_at(mut self, exp: u64) -> Self {
        self.exp = exp;
        self
    }

    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        self.exp <= now_millis
    }
}

/// Access and refresh tokens as returned by login and refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

impl TokenPair {
    /// Mint a fresh pair for a user.
    pub fn issue(
        sub: &str,
        username: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self> {
        let access = encode(&Claims::new(sub, TokenKind::Access, access_ttl).with_username(username))?;
        let refresh = encode(&Claims::new(sub, TokenKind::Refresh, refresh_ttl))?;
        Ok(Self { access, refresh })
    }
}

/// Encode claims into a catalog token.
pub fn encode(claims: &Claims) -> Result<String> {
    let json = serde_json::to_vec(claims)
        .map_err(|e| Error::TokenDecode(format!("serializing claims: {e}")))?;
    Ok(format!("{TOKEN_PREFIX}{}", STANDARD.encode(json)))
}

/// Decode a token's claims without verifying it.
pub fn decode(token: &str) -> Result<Claims> {
    if let Some(payload) = token.strip_prefix(TOKEN_PREFIX) {
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| Error::TokenDecode(format!("invalid base64: {e}")))?;
        return serde_json::from_slice(&bytes)
            .map_err(|e| Error::TokenDecode(format!("invalid claims: {e}")));
    }

    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::TokenDecode("unrecognized token format".into()));
    };

    #[derive(Deserialize)]
    struct JwtPayload {
        #[serde(default)]
        sub: Option<String>,
        exp: u64,
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::TokenDecode(format!("invalid base64url payload: {e}")))?;
    let jwt: JwtPayload = serde_json::from_slice(&bytes)
        .map_err(|e| Error::TokenDecode(format!("invalid jwt payload: {e}")))?;

    Ok(Claims {
        sub: jwt.sub.unwrap_or_default(),
        username: None,
        kind: None,
        jti: String::new(),
        exp: jwt.exp.saturating_mul(1000),
    })
}

/// Expiry instant of a token in unix milliseconds.
pub fn expires_at(token: &str) -> Result<u64> {
    decode(token).map(|claims| claims.exp)
}

/// Whether a token has expired at `now_millis`.
pub fn is_expired(token: &str, now_millis: u64) -> Result<bool> {
    decode(token).map(|claims| claims.is_expired_at(now_millis))
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
