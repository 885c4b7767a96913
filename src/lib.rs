//! Danger Room: a reverse proxy that degrades responses on purpose.
//!
//! Requests under a mounted prefix are forwarded to that mount's origin.
//! The harness attached to the mount decides the status code and how much
//! of the body reaches the client. Mounts are created and reconfigured at
//! runtime by posting documents to the control prefix.

// Core subsystems
pub mod config;
pub mod control;
pub mod harness;
pub mod http;
pub mod proxy;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::DangerRoomConfig;
pub use harness::{Harness, HarnessRegistry};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
