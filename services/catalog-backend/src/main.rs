//! Library catalog backend
//!
//! Single-binary development backend for the catalog client:
//! 1. Issues `mock-jwt-` token pairs on `/auth/login` and `/auth/refresh`
//! 2. Serves the `/books` surface from an in-memory `CollectionStore`
//! 3. Requires an unexpired access token on every `/books` route
//! 4. Exposes `/health` and Prometheus `/metrics`

mod auth;
mod books;
mod config;
mod error;
mod metrics;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use catalog_books::CollectionStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::Accounts;
use crate::config::Config;

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    books: Arc<CollectionStore>,
    accounts: Arc<Accounts>,
    prometheus: PrometheusHandle,
    started_at: Instant,
    response_delay: Duration,
}

impl AppState {
    fn new(config: &Config, prometheus: PrometheusHandle) -> Self {
        let books = if config.catalog.seed {
            CollectionStore::with_books(books::seed())
        } else {
            CollectionStore::new()
        };
        Self {
            books: Arc::new(books),
            accounts: Arc::new(Accounts::from_config(config)),
            prometheus,
            started_at: Instant::now(),
            response_delay: Duration::from_millis(config.server.response_delay_ms),
        }
    }
}

/// Build the axum router with all routes and shared state.
///
/// `/books` routes sit behind the bearer check. Request counting covers the
/// API routes only, keyed by route template.
fn build_router(state: AppState, max_connections: usize) -> Router {
    let books = Router::new()
        .route("/books", get(books::list).post(books::create))
        .route("/books/reorder", post(books::reorder))
        .route(
            "/books/{id}",
            get(books::get).put(books::update).delete(books::delete),
        )
        .route_layer(middleware::from_fn(auth::require_bearer));

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .merge(books)
        .route_layer(middleware::from_fn(track_requests))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(state.clone(), simulate_latency))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting catalog-backend");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder()?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        users = config.users.len(),
        seed = config.catalog.seed,
        access_ttl_secs = config.auth.access_ttl_secs,
        "configuration loaded"
    );

    let listen_addr = config.server.listen_addr;
    let app = build_router(
        AppState::new(&config, prometheus),
        config.server.max_connections,
    );

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: status, book count and uptime.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "books": state.books.len().await,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let response = next.run(request).await;
    metrics::record_request(&route, response.status().as_u16());
    response
}

async fn simulate_latency(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.response_delay.is_zero() {
        tokio::time::sleep(state.response_delay).await;
    }
    next.run(request).await
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use catalog_auth::{AuthSession, Claims, TokenKind, TokenPair, TokenStore};
    use catalog_books::{Catalog, Notifier};
    use tower::ServiceExt;
    use transport::HttpTransport;

    /// Create a PrometheusHandle for tests without installing a global recorder.
    fn test_prometheus_handle() -> PrometheusHandle {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        recorder.handle()
    }

    fn test_config() -> Config {
        Config::parse(
            r#"
[server]
listen_addr = "127.0.0.1:0"

[[users]]
username = "admin"
email = "admin@example.com"
password = "secret"
"#,
        )
        .unwrap()
    }

    fn test_app() -> Router {
        build_router(AppState::new(&test_config(), test_prometheus_handle()), 100)
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        bearer: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn login(app: &Router) -> TokenPair {
        let (status, body) = call(
            app,
            "POST",
            "/auth/login",
            None,
            Some(serde_json::json!({"username": "admin", "password": "secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_value(body["tokens"].clone()).unwrap()
    }

    fn expired_access() -> String {
        catalog_auth::token::encode(
            &Claims::new("1", TokenKind::Access, Duration::ZERO).expiring_at(1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn login_returns_user_and_tokens() {
        let app = test_app();
        let (status, body) = call(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(serde_json::json!({"username": "admin", "password": "secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], "1");
        assert_eq!(body["user"]["email"], "admin@example.com");
        assert!(body["tokens"]["access"].as_str().unwrap().starts_with("mock-jwt-"));
        assert!(body["tokens"]["refresh"].as_str().unwrap().starts_with("mock-jwt-"));
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let app = test_app();
        let (status, body) = call(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(serde_json::json!({"username": "admin", "password": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid username or password");
    }

    #[tokio::test]
    async fn books_require_access_token() {
        let app = test_app();
        let pair = login(&app).await;

        let (status, _) = call(&app, "GET", "/books", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, "GET", "/books", Some(&pair.refresh), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "refresh token is not a bearer credential");

        let (status, body) = call(&app, "GET", "/books", Some(&expired_access()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Access token expired");

        let (status, body) = call(&app, "GET", "/books", Some(&pair.access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);
        assert_eq!(body[0]["title"], "The Great Gatsby");
    }

    #[tokio::test]
    async fn seeding_can_be_disabled() {
        let mut config = test_config();
        config.catalog.seed = false;
        let app = build_router(AppState::new(&config, test_prometheus_handle()), 10);
        let pair = login(&app).await;

        let (_, body) = call(&app, "GET", "/books", Some(&pair.access), None).await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn book_crud() {
        let app = test_app();
        let token = login(&app).await.access;

        let new_book = serde_json::json!({
            "title": "Beloved", "author": "Toni Morrison", "year": 1987, "genre": "Novel",
            "description": "Sethe lives with the memory of slavery in post-war Ohio.",
            "pages": 324, "language": "English"
        });
        let (status, created) = call(&app, "POST", "/books", Some(&token), Some(new_book)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["status"], "available");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, fetched) = call(&app, "GET", &format!("/books/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["title"], "Beloved");

        let (status, updated) = call(
            &app,
            "PUT",
            &format!("/books/{id}"),
            Some(&token),
            Some(serde_json::json!({"id": "other", "status": "borrowed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["id"], id.as_str());
        assert_eq!(updated["status"], "borrowed");

        let (status, _) = call(&app, "DELETE", &format!("/books/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, "GET", &format!("/books/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Book not found");
    }

    #[tokio::test]
    async fn invalid_book_is_bad_request() {
        let app = test_app();
        let token = login(&app).await.access;
        let bad = serde_json::json!({
            "title": "X", "author": "Y", "year": 1999, "genre": "Z",
            "description": "d", "pages": 0, "language": "English"
        });
        let (status, body) = call(&app, "POST", "/books", Some(&token), Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("pages"));
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_request_with_message() {
        let app = test_app();
        let token = login(&app).await.access;

        // Missing required fields
        let (status, body) = call(
            &app,
            "POST",
            "/books",
            Some(&token),
            Some(serde_json::json!({"title": "Only a title"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string(), "got {body}");

        // Wrong shape for bookIds
        let (status, body) = call(
            &app,
            "POST",
            "/books/reorder",
            Some(&token),
            Some(serde_json::json!({"bookIds": "1,2,3"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        let (status, body) = call(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(serde_json::json!({"username": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        // Not JSON at all
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/auth/refresh")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn reorder_requires_permutation() {
        let app = test_app();
        let token = login(&app).await.access;

        let (status, _) = call(
            &app,
            "POST",
            "/books/reorder",
            Some(&token),
            Some(serde_json::json!({"bookIds": ["3", "1", "2"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, "GET", "/books", Some(&token), None).await;
        let ids: Vec<&str> = body.as_array().unwrap().iter().map(|b| b["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);

        let (status, _) = call(
            &app,
            "POST",
            "/books/reorder",
            Some(&token),
            Some(serde_json::json!({"bookIds": ["3", "1"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn refresh_exchanges_only_valid_refresh_tokens() {
        let app = test_app();
        let pair = login(&app).await;

        let (status, body) = call(
            &app,
            "POST",
            "/auth/refresh",
            None,
            Some(serde_json::json!({"refresh_token": pair.refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(body["tokens"]["access"], pair.access.as_str());

        let (status, body) = call(
            &app,
            "POST",
            "/auth/refresh",
            None,
            Some(serde_json::json!({"refresh_token": pair.access})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid refresh token");

        let expired = catalog_auth::token::encode(
            &Claims::new("1", TokenKind::Refresh, Duration::ZERO).expiring_at(1),
        )
        .unwrap();
        let (status, body) = call(
            &app,
            "POST",
            "/auth/refresh",
            None,
            Some(serde_json::json!({"refresh_token": expired})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Refresh token expired");
    }

    #[tokio::test]
    async fn health_and_metrics() {
        let app = test_app();
        let (status, body) = call(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["books"], 3);

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    /// Serve the router on an ephemeral port.
    async fn start_backend() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = test_app();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn end_to_end_login_expiry_and_single_refresh() {
        let base_url = start_backend().await;
        let dir = tempfile::tempdir().unwrap();
        let tokens = Arc::new(
            TokenStore::load(dir.path().join("session.json"))
                .await
                .unwrap(),
        );
        let session = AuthSession::new(Arc::new(HttpTransport::new(base_url)), tokens.clone()).await;

        let user = session.login("admin", "secret").await.unwrap();
        assert_eq!(user.username, "admin");

        let catalog = Catalog::new(session.clone(), Notifier::disabled());
        assert_eq!(catalog.load().await.unwrap(), 3);
        assert_eq!(session.refresh_generations(), 0);

        // Simulate expiry: keep the refresh token, swap in an expired access token
        let refresh = tokens.refresh_token().await.unwrap().expose().clone();
        tokens
            .set_pair(&TokenPair {
                access: expired_access(),
                refresh,
            })
            .await
            .unwrap();

        let mut loads = Vec::new();
        for _ in 0..4 {
            let api = catalog.api().clone();
            loads.push(tokio::spawn(async move { api.list().await }));
        }
        for load in loads {
            assert_eq!(load.await.unwrap().unwrap().len(), 3);
        }
        assert_eq!(session.refresh_generations(), 1, "exactly one refresh");
        assert!(session.is_authenticated().await);

        // Reorder through the real backend, then confirm the server order
        catalog.reorder("1", "3").await.unwrap();
        let ids: Vec<String> = catalog.api().list().await.unwrap().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
        assert_eq!(session.refresh_generations(), 1);
    }

    #[tokio::test]
    async fn end_to_end_expired_refresh_logs_out() {
        let base_url = start_backend().await;
        let tokens = Arc::new(TokenStore::in_memory());
        let session = AuthSession::new(Arc::new(HttpTransport::new(base_url)), tokens.clone()).await;
        session.login("admin", "secret").await.unwrap();

        let expired_refresh = catalog_auth::token::encode(
            &Claims::new("1", TokenKind::Refresh, Duration::ZERO).expiring_at(1),
        )
        .unwrap();
        tokens
            .set_pair(&TokenPair {
                access: expired_access(),
                refresh: expired_refresh,
            })
            .await
            .unwrap();

        let catalog = Catalog::new(session.clone(), Notifier::disabled());
        let err = catalog.load().await.unwrap_err();
        assert_eq!(
            err,
            catalog_books::Error::Auth(catalog_auth::Error::RefreshExpired)
        );
        assert_eq!(session.state(), catalog_auth::SessionState::LoggedOut);
        assert!(tokens.is_empty().await);
    }
}
