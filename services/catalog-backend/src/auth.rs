//! Login, refresh and bearer verification
//!
//! Tokens are minted with `catalog_auth::TokenPair::issue` and checked by
//! decoding their claims: the backend keeps no session table. A token is
//! accepted as a bearer credential only when it is access-kind and not
//! expired; `/auth/refresh` accepts only unexpired refresh-kind tokens.

use std::time::Duration;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use catalog_auth::{Claims, TokenKind, TokenPair, User};
use common::Secret;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::config::Config;
use crate::error::ApiError;
use crate::metrics;

/// A configured login.
pub struct Account {
    pub user: User,
    password: Secret<String>,
}

/// Accounts and token lifetimes, built once from config.
pub struct Accounts {
    accounts: Vec<Account>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl Accounts {
    /// Account ids are positional, starting at "1".
    pub fn from_config(config: &Config) -> Self {
        let accounts = config
            .users
            .iter()
            .enumerate()
            .map(|(i, u)| Account {
                user: User {
                    id: (i + 1).to_string(),
                    username: u.username.clone(),
                    email: u.email.clone(),
                },
                password: u.password.clone(),
            })
            .collect();
        Self {
            accounts,
            access_ttl: Duration::from_secs(config.auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(config.auth.refresh_ttl_secs),
        }
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.user.username == username && a.password.expose() == password)
    }

    pub fn find(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.user.id == id)
    }

    pub fn issue(&self, account: &Account) -> Result<TokenPair, ApiError> {
        TokenPair::issue(
            &account.user.id,
            &account.user.username,
            self.access_ttl,
            self.refresh_ttl,
        )
        .map_err(|e| ApiError::internal(e.to_string()))
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: Secret<String>,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    refresh_token: Secret<String>,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = payload?;
    let Some(account) = state
        .accounts
        .authenticate(&request.username, request.password.expose())
    else {
        metrics::record_login("rejected");
        warn!(username = %request.username, "login rejected");
        return Err(ApiError::unauthorized("Invalid username or password"));
    };

    let tokens = state.accounts.issue(account)?;
    metrics::record_login("success");
    info!(user_id = %account.user.id, username = %account.user.username, "login");
    Ok(Json(serde_json::json!({
        "user": account.user,
        "tokens": tokens,
    })))
}

pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = payload?;
    let claims = match verify(request.refresh_token.expose(), TokenKind::Refresh) {
        Ok(claims) => claims,
        Err(rejection) => {
            metrics::record_refresh(rejection.label());
            debug!(reason = rejection.label(), "refresh rejected");
            return Err(ApiError::unauthorized(rejection.refresh_message()));
        }
    };
    let Some(account) = state.accounts.find(&claims.sub) else {
        metrics::record_refresh("unknown_user");
        return Err(ApiError::unauthorized("Invalid refresh token"));
    };

    let tokens = state.accounts.issue(account)?;
    metrics::record_refresh("success");
    debug!(user_id = %account.user.id, "token pair refreshed");
    Ok(Json(serde_json::json!({ "tokens": tokens })))
}

/// Middleware: reject requests without a valid access token.
pub async fn require_bearer(request: Request, next: Next) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

    match verify(token, TokenKind::Access) {
        Ok(claims) => {
            debug!(user_id = %claims.sub, path = %request.uri().path(), "bearer accepted");
            Ok(next.run(request).await)
        }
        Err(rejection) => {
            debug!(reason = rejection.label(), "bearer rejected");
            Err(ApiError::unauthorized(rejection.bearer_message()))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Malformed,
    WrongKind,
    Expired,
}

impl Rejection {
    fn label(&self) -> &'static str {
        match self {
            Rejection::Malformed => "malformed",
            Rejection::WrongKind => "wrong_kind",
            Rejection::Expired => "expired",
        }
    }

    fn refresh_message(&self) -> &'static str {
        match self {
            Rejection::Expired => "Refresh token expired",
            _ => "Invalid refresh token",
        }
    }

    fn bearer_message(&self) -> &'static str {
        match self {
            Rejection::Expired => "Access token expired",
            _ => "Unauthorized",
        }
    }
}

fn verify(token: &str, kind: TokenKind) -> Result<Claims, Rejection> {
    let claims = catalog_auth::token::decode(token).map_err(|_| Rejection::Malformed)?;
    if claims.kind != Some(kind) {
        return Err(Rejection::WrongKind);
    }
    if claims.is_expired_at(catalog_auth::token::now_millis()) {
        return Err(Rejection::Expired);
    }
    Ok(claims)
}
