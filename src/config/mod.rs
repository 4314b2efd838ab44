//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + PORTAL_GATE_* environment
//!     → loader.rs (parse, deserialize, apply env overrides)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → GatePolicy shared via ArcSwap with the gate middleware
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → watcher.rs diffs against the running config
//!     → atomic swap of the gate policy (policy sections only)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Only the per-request policy is hot-reloaded; listener and stores are not
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, DeploymentMode, ExclusionConfig, GateConfig, LogFormat, ObservabilityConfig,
    RateLimitConfig, RoutesConfig, SecurityConfig,
};
