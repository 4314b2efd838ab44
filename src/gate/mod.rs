//! The request gate.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → route.rs (excluded asset? skip the gate entirely)
//!     → rate_limit.rs (per-client fixed window; 429 ends processing)
//!     → SessionStore (identity, error, refreshed cookies)
//!     → route.rs (classify path)
//!     → ProfileStore (protected/onboarding routes only)
//!     → decision.rs (pure decision table)
//!     → pass through to the renderer, or build a redirect
//!     → refreshed cookies + headers.rs applied to the final response
//! ```
//!
//! # Design Decisions
//! - Every failure resolves into a row of the decision table
//! - The per-request policy is swapped atomically on config reload
//! - No retries; store failures fall back to the more restrictive branch

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use crate::config::{GateConfig, RateLimitConfig};
use crate::session::{Identity, ProfileStore, SessionStore};

pub mod decision;
pub mod headers;
pub mod middleware;
pub mod rate_limit;
pub mod route;

pub use decision::{decide, Action, IdentityState, RedirectPaths, RedirectTarget};
pub use headers::SecurityHeaders;
pub use middleware::gate_middleware;
pub use rate_limit::{client_key, RateLimiter, UNKNOWN_CLIENT};
pub use route::{ExclusionMatcher, RouteClass, RouteTable};

/// The hot-reloadable part of the configuration.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    pub routes: RouteTable,
    pub exclusions: ExclusionMatcher,
    pub redirects: RedirectPaths,
    pub rate_limit: RateLimitConfig,
    pub headers: SecurityHeaders,
}

impl GatePolicy {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            routes: RouteTable::from_config(&config.routes),
            exclusions: ExclusionMatcher::from_config(&config.exclusions),
            redirects: RedirectPaths::from_config(&config.routes),
            rate_limit: config.rate_limit.clone(),
            headers: SecurityHeaders::new(config.security.mode),
        }
    }
}

/// What the gate learned about a request it let through.
///
/// Inserted into the request extensions for in-process renderers.
#[derive(Debug, Clone)]
pub struct GateContext {
    pub identity: Option<Identity>,
    pub route: RouteClass,
}

/// Shared state of the gate middleware.
#[derive(Clone)]
pub struct GateState {
    policy: Arc<ArcSwap<GatePolicy>>,
    limiter: Arc<RateLimiter>,
    sessions: Arc<dyn SessionStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl GateState {
    pub fn new(
        config: &GateConfig,
        sessions: Arc<dyn SessionStore>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self {
            policy: Arc::new(ArcSwap::from_pointee(GatePolicy::from_config(config))),
            limiter: Arc::new(RateLimiter::new()),
            sessions,
            profiles,
        }
    }

    /// Current policy snapshot.
    pub fn policy(&self) -> Arc<GatePolicy> {
        self.policy.load_full()
    }

    /// Swap in the policy from a freshly loaded configuration.
    pub fn reload(&self, config: &GateConfig) {
        let previous = self.policy.swap(Arc::new(GatePolicy::from_config(config)));
        tracing::info!(
            mode = ?config.security.mode,
            rate_limit_enabled = config.rate_limit.enabled,
            max_requests = config.rate_limit.max_requests,
            window_changed = previous.rate_limit.window_ms != config.rate_limit.window_ms,
            "Gate policy reloaded"
        );
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Sweep expired rate-limit windows until shutdown.
    ///
    /// Interval and `enabled` are read from the current policy on every
    /// tick, so reloads apply without a restart.
    pub async fn run_sweeper(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let interval = Duration::from_secs(self.policy().rate_limit.sweep_interval_secs.max(1));
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if !self.policy().rate_limit.enabled {
                        continue;
                    }
                    let removed = self.limiter.sweep(Instant::now());
                    if removed > 0 {
                        tracing::debug!(
                            removed,
                            remaining = self.limiter.tracked_clients(),
                            "Swept rate limit entries"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub(crate) fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    pub(crate) fn profiles(&self) -> &dyn ProfileStore {
        self.profiles.as_ref()
    }
}
