//! Session authentication for the library catalog client
//!
//! Holds the access/refresh token pair, performs login and logout, and runs
//! every API call through `AuthSession::send`, which attaches the bearer
//! credential and transparently refreshes it on a 401. Refreshes are
//! single-flight: requests that fail while a refresh is running are queued
//! on the `RefreshGate` and replayed once it settles.
//!
//! Credential flow:
//! 1. UI calls `AuthSession::login()` → tokens persisted in `TokenStore`
//! 2. API calls go through `AuthSession::send()` with `Authorization: Bearer`
//! 3. Backend answers 401 → one refresh via `POST /auth/refresh`, queued
//!    requests replayed with the new access token
//! 4. Refresh fails → tokens cleared, session state `LoggedOut`
//! 5. UI calls `AuthSession::logout()` → tokens cleared locally

pub mod constants;
pub mod error;
pub mod refresh;
pub mod session;
pub mod store;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use refresh::{RefreshGate, RefreshLease, Ticket};
pub use session::{AuthSession, SessionState, User};
pub use store::TokenStore;
pub use token::{Claims, TokenKind, TokenPair};
