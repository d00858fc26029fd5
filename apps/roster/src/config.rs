//! # Config Module
//!
//! Server settings and logging setup.
//!
//! Settings arrive through clap (flags with `ROSTER_*` env fallbacks, see
//! [`crate::cli`]) and are frozen into a [`ServerConfig`] before the server
//! starts.

use roster_core::CheckinPolicy;
use roster_core::password::random_bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Default bind address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:5000";

/// Default bearer token lifetime (12 hours).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 12 * 60 * 60;

/// Default login attempts allowed per username per minute.
pub const DEFAULT_LOGIN_PER_MINUTE: u32 = 10;

/// Default real-time buffer, in events per subscriber.
pub const DEFAULT_HUB_CAPACITY: usize = 256;

/// How often idle login rate-limit entries are dropped.
pub const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Length of a generated token key.
const GENERATED_SECRET_LEN: usize = 32;

/// Maximum accepted JSON body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

const DEFAULT_LOG_FILTER: &str = "roster=info,roster_core=info,tower_http=info";

/// Everything the HTTP server needs besides the roster itself.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// HMAC key for bearer tokens. Empty until
    /// [`with_token_secret`](Self::with_token_secret) fills it.
    pub token_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub policy: CheckinPolicy,
    /// Allowed CORS origins. Empty or `*` means any origin.
    pub cors_origins: Vec<String>,
    pub login_per_minute: u32,
    pub hub_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            token_secret: Vec::new(),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            policy: CheckinPolicy::default(),
            cors_origins: Vec::new(),
            login_per_minute: DEFAULT_LOGIN_PER_MINUTE,
            hub_capacity: DEFAULT_HUB_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Use `secret` as the token key, or generate one when absent.
    ///
    /// A generated key invalidates every token on restart, so it is logged.
    pub fn with_token_secret(mut self, secret: Option<&str>) -> roster_core::Result<Self> {
        self.token_secret = match secret.map(str::trim).filter(|s| !s.is_empty()) {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                warn!("No token secret configured; generated a random one (tokens will not survive a restart)");
                random_bytes(GENERATED_SECRET_LEN)?
            }
        };
        Ok(self)
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A second init (tests, embedding) is harmless; ignore the error.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
