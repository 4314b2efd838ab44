//! Request gate for the research portal.
//!
//! Resolves session identity, rate-limits per client, and redirects according
//! to profile completeness before anything reaches the page renderer.

pub mod config;
pub mod error;
pub mod gate;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod session;

pub use config::schema::GateConfig;
pub use gate::{GateState, gate_middleware};
pub use http::GateServer;
pub use lifecycle::Shutdown;
