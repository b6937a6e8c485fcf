//! Catalog API paths, storage keys and token lifetimes
//!
//! The paths are relative to the transport's base URL. Storage keys are the
//! fixed names the token pair is persisted under so a restarted client
//! picks up the previous session.

use std::time::Duration;

/// Credential exchange endpoint
pub const LOGIN_PATH: &str = "/auth/login";

/// Refresh-token exchange endpoint
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Prefix of tokens minted by the catalog backend
pub const TOKEN_PREFIX: &str = "mock-jwt-";

/// Access token lifetime issued by the backend
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Refresh token lifetime issued by the backend
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
