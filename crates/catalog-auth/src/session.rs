//! Authenticated session: login, logout and transparent token refresh
//!
//! `AuthSession::send` is the request pipeline every catalog call goes
//! through. It attaches the stored access token as a bearer credential and
//! handles a 401 as follows:
//!
//! 1. Request already replayed once → final `Unauthorized`, never re-queued
//! 2. Token was superseded by a refresh that already finished → replay with
//!    the current token, no new refresh
//! 3. Refresh running → queue on the `RefreshGate`, replay when it settles
//! 4. Otherwise lead a refresh; on success store the new pair and release the
//!    queue with the new token, on failure clear the tokens, move to
//!    `LoggedOut` and reject the queue with the same error
//!
//! Session state transitions:
//! - LoggedOut → Active (login)
//! - Active → Refreshing (401 while no refresh runs)
//! - Refreshing → Active (refresh succeeded)
//! - Refreshing → LoggedOut (refresh failed)
//! - Active → LoggedOut (logout)
//! - Refreshing → LoggedOut (logout; the in-flight refresh is discarded)

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use transport::{ApiRequest, ApiResponse, Transport};

use crate::constants::{LOGIN_PATH, REFRESH_PATH};
use crate::error::{Error, Result};
use crate::refresh::{RefreshGate, Ticket};
use crate::store::TokenStore;
use crate::token::{self, TokenPair};

/// Observable session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    Active,
    Refreshing,
}

impl SessionState {
    /// Status label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::LoggedOut => "logged_out",
            SessionState::Active => "active",
            SessionState::Refreshing => "refreshing",
        }
    }
}

/// The account returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct LoginResponse {
    user: User,
    tokens: TokenPair,
}

#[derive(Deserialize)]
struct RefreshResponse {
    tokens: TokenPair,
}

struct Inner {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    gate: RefreshGate,
    state: watch::Sender<SessionState>,
    /// Bumped by every logout; a refresh started under an older value is stale.
    epoch: AtomicU64,
}

/// Cheaply cloneable handle to one client session.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<Inner>,
}

impl AuthSession {
    /// Create a session over `transport`, resuming from persisted tokens.
    ///
    /// Starts `Active` when a refresh token or an unexpired access token is
    /// stored, `LoggedOut` otherwise.
    pub async fn new(transport: Arc<dyn Transport>, tokens: Arc<TokenStore>) -> Self {
        let initial = if tokens.refresh_token().await.is_some()
            || access_is_valid(tokens.access_token().await.as_ref())
        {
            SessionState::Active
        } else {
            SessionState::LoggedOut
        };
        info!(transport = transport.id(), state = initial.label(), "session initialized");

        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner {
                transport,
                tokens,
                gate: RefreshGate::new(),
                state,
                epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions; the UI shows its login surface on `LoggedOut`.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.inner.tokens
    }

    /// Requests currently queued behind an in-flight refresh.
    pub fn pending_requests(&self) -> usize {
        self.inner.gate.pending()
    }

    /// Refreshes started since the session was created.
    pub fn refresh_generations(&self) -> u64 {
        self.inner.gate.generations()
    }

    /// Access token present and not expired.
    pub async fn is_authenticated(&self) -> bool {
        access_is_valid(self.inner.tokens.access_token().await.as_ref())
    }

    /// Exchange credentials for a token pair and start the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let request = ApiRequest::post(
            LOGIN_PATH,
            serde_json::json!({ "username": username, "password": password }),
        );
        let response = self.dispatch(&request).await?;

        if response.is_success() {
            let body: LoginResponse = response.json().map_err(|e| Error::Http {
                status: response.status,
                message: e.to_string(),
            })?;
            self.inner.tokens.set_pair(&body.tokens).await?;
            self.set_state(SessionState::Active);
            info!(username = %body.user.username, "logged in");
            return Ok(body.user);
        }

        match response.status {
            400 | 401 | 403 => {
                warn!(username, status = response.status, "login rejected");
                Err(Error::InvalidCredentials(response.message()))
            }
            status => Err(Error::Http {
                status,
                message: response.message(),
            }),
        }
    }

    /// Forget the tokens locally. Idempotent, no network call.
    pub async fn logout(&self) -> Result<()> {
        self.inner.state.send_modify(|state| {
            self.inner.epoch.fetch_add(1, Ordering::AcqRel);
            *state = SessionState::LoggedOut;
        });
        self.inner.tokens.clear().await?;
        info!("logged out");
        Ok(())
    }

    /// Send a request with the current bearer credential, refreshing on 401.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        request.bearer = self.inner.tokens.access_token().await;
        let response = self.dispatch(&request).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        if request.retried {
            warn!(path = %request.path, "request rejected after replay");
            return Err(Error::Unauthorized);
        }

        if !self.inner.gate.is_refreshing() {
            let current = self.inner.tokens.access_token().await;
            if let Some(current) = current.filter(|t| Some(t) != request.bearer.as_ref()) {
                debug!(path = %request.path, "access token superseded, replaying without refresh");
                return self.replay(request, current).await;
            }
        }

        match self.inner.gate.enter() {
            Ticket::Follower(waiter) => {
                debug!(
                    path = %request.path,
                    queued = self.inner.gate.pending(),
                    "refresh in flight, queueing request"
                );
                let token = waiter
                    .await
                    .map_err(|_| Error::RefreshInvalid("refresh abandoned".into()))??;
                self.replay(request, token).await
            }
            Ticket::Leader(lease) => {
                request.retried = true;
                let epoch = self.inner.epoch.load(Ordering::Acquire);
                self.set_state(SessionState::Refreshing);
                let outcome = match self.refresh().await {
                    Ok(pair) => self.adopt(pair, epoch).await,
                    Err(e) => Err(e),
                };

                match &outcome {
                    Ok(_) => {
                        metrics::counter!("catalog_auth_refresh_total", "outcome" => "success")
                            .increment(1);
                    }
                    Err(e) => {
                        metrics::counter!("catalog_auth_refresh_total", "outcome" => "failure")
                            .increment(1);
                        warn!(error = %e, "token refresh failed, ending session");
                        if let Err(clear_err) = self.inner.tokens.clear().await {
                            warn!(error = %clear_err, "failed to clear tokens after refresh failure");
                        }
                        self.set_state(SessionState::LoggedOut);
                    }
                }

                let released = lease.settle(&outcome);
                debug!(released, "refresh settled");
                self.replay(request, outcome?).await
            }
        }
    }

    /// Replay a request exactly once with a fresh credential.
    async fn replay(&self, mut request: ApiRequest, token: Secret<String>) -> Result<ApiResponse> {
        request.retried = true;
        request.bearer = Some(token);
        let response = self.dispatch(&request).await?;
        if response.is_unauthorized() {
            warn!(path = %request.path, "request rejected after replay");
            return Err(Error::Unauthorized);
        }
        Ok(response)
    }

    /// Store a refreshed pair and reactivate, unless a logout happened since
    /// `epoch` was read. Activation and logout both run under the state lock,
    /// so exactly one of them wins.
    async fn adopt(&self, pair: TokenPair, epoch: u64) -> Result<Secret<String>> {
        let ended = || Error::RefreshInvalid("session ended".into());
        if self.inner.epoch.load(Ordering::Acquire) != epoch {
            debug!("session ended during refresh, discarding new tokens");
            return Err(ended());
        }
        self.inner.tokens.set_pair(&pair).await?;

        let activated = self.inner.state.send_if_modified(|state| {
            if self.inner.epoch.load(Ordering::Acquire) != epoch {
                return false;
            }
            *state = SessionState::Active;
            true
        });
        if !activated {
            debug!("session ended during refresh, discarding new tokens");
            return Err(ended());
        }
        debug!(to = SessionState::Active.label(), "session state changed");
        Ok(Secret::new(pair.access))
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// The call carries no bearer: the refresh token travels only in the body.
    async fn refresh(&self) -> Result<TokenPair> {
        let refresh = self
            .inner
            .tokens
            .refresh_token()
            .await
            .ok_or(Error::NoRefreshToken)?;

        match token::decode(refresh.expose()) {
            Ok(claims) if claims.is_expired_at(token::now_millis()) => {
                debug!(expired_at = claims.exp, "stored refresh token already expired");
                return Err(Error::RefreshExpired);
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "refresh token expiry unreadable, deferring to backend"),
        }

        let request = ApiRequest::post(
            REFRESH_PATH,
            serde_json::json!({ "refresh_token": refresh.expose() }),
        );
        let response = self.dispatch(&request).await?;

        if response.is_success() {
            let body: RefreshResponse = response
                .json()
                .map_err(|e| Error::RefreshInvalid(format!("invalid refresh response: {e}")))?;
            info!("access token refreshed");
            return Ok(body.tokens);
        }

        let message = response.message();
        if response.is_unauthorized() && message.to_ascii_lowercase().contains("expired") {
            Err(Error::RefreshExpired)
        } else {
            Err(Error::RefreshInvalid(message))
        }
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.inner.transport.send(request).await.map_err(|e| {
            warn!(path = %request.path, error = %e, "network failure");
            Error::from(e)
        })
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.inner.state.send_replace(next);
        if previous != next {
            debug!(from = previous.label(), to = next.label(), "session state changed");
        }
    }
}

/// Present and not expired; an undecodable token is left to the backend to judge.
fn access_is_valid(token: Option<&Secret<String>>) -> bool {
    match token {
        None => false,
        Some(token) => match token::decode(token.expose()) {
            Ok(claims) => !claims.is_expired_at(token::now_millis()),
            Err(_) => true,
        },
    }
}
