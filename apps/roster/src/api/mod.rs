//! # API Module
//!
//! HTTP surface of the roster: REST routes under `/api`, the WebSocket
//! channel at `/api/ws` and an unauthenticated `/health`.
//!
//! ```text
//!  dashboard ──HTTP──► handlers ──spawn_blocking──► Roster ──► MemberStore
//!      ▲                  │
//!      └──── ws ◄──── Hub (broadcast) ◄──── change listener (under the lock)
//! ```

mod auth;
mod error;
mod extract;
mod handlers;
pub mod types;
mod ws;

pub use auth::{AuthUser, Claims, TokenSigner};
pub use error::ApiError;
pub use extract::{ApiJson, ApiPath};

use crate::config::{LIMITER_SWEEP_INTERVAL, MAX_BODY_BYTES, ServerConfig};
use crate::realtime::{Event, Hub};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use roster_core::Roster;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

// =============================================================================
// STATE
// =============================================================================

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub roster: Arc<Roster>,
    pub hub: Hub,
    pub tokens: TokenSigner,
    pub token_ttl: Duration,
    pub login_limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl AppState {
    /// Wire `roster` to a fresh hub: every committed write is published
    /// while the writer lock is still held.
    pub fn new(roster: Roster, config: &ServerConfig) -> Self {
        let per_minute = NonZeroU32::new(config.login_per_minute).unwrap_or(NonZeroU32::MIN);
        let hub = Hub::new(config.hub_capacity);
        let feed = hub.clone();
        let roster = roster.with_listener(move |change| {
            feed.publish(Event::from(change));
        });
        Self {
            roster: Arc::new(roster),
            hub,
            tokens: TokenSigner::new(config.token_secret.clone(), config.token_ttl),
            token_ttl: config.token_ttl,
            login_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
        }
    }

    /// Drop login limiter entries whose quota has fully refilled.
    ///
    /// Returns the number of usernames still tracked.
    pub fn sweep_login_limiter(&self) -> usize {
        self.login_limiter.retain_recent();
        self.login_limiter.shrink_to_fit();
        self.login_limiter.len()
    }

    /// Run a blocking roster call off the async runtime.
    ///
    /// Storage is synchronous redb and password hashing is deliberately slow.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Roster) -> roster_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let roster = Arc::clone(&self.roster);
        tokio::task::spawn_blocking(move || f(&roster))
            .await
            .map_err(|e| ApiError::Internal(format!("roster task failed: {e}")))?
            .map_err(ApiError::from)
    }
}

// =============================================================================
// ROUTER
// =============================================================================

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build the full application router.
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let api = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route(
            "/members",
            get(handlers::list_members).post(handlers::add_member),
        )
        .route("/members/reset", post(handlers::reset_members))
        .route(
            "/members/{id}",
            get(handlers::get_member)
                .put(handlers::edit_member)
                .delete(handlers::delete_member),
        )
        .route("/members/{id}/state", post(handlers::change_state))
        .route("/checkin", post(handlers::checkin))
        // The kiosk page posts with a trailing slash.
        .route("/checkin/", post(handlers::checkin))
        .route("/esp/checkin", post(handlers::card_checkin))
        .route("/stats", get(handlers::stats))
        .route("/interviews", get(handlers::interviews))
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origins))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn run_server(roster: Roster, config: ServerConfig) -> std::io::Result<()> {
    let state = AppState::new(roster, &config);
    tokio::spawn(sweep_login_limiter(state.clone()));
    let app = create_router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "roster server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn sweep_login_limiter(state: AppState) {
    let mut ticker = tokio::time::interval(LIMITER_SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let tracked = state.sweep_login_limiter();
        debug!(tracked, "login limiter swept");
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        // Without a signal handler, run until the process is killed.
        Err(err) => {
            warn!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
