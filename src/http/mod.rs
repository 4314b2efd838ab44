//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout, body limit)
//!     → gate middleware (pass through or answer directly)
//!     → proxy.rs (forward to the page renderer)
//!     → Send to client
//! ```

pub mod proxy;
pub mod server;

pub use server::GateServer;
