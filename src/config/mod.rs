//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DangerRoomConfig (validated, immutable)
//!     → shared via Arc with the HTTP server and control endpoint
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; runtime changes go through the
//!   control endpoint, never through the file
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ControlConfig, DangerRoomConfig, ListenerConfig, LogFormat, ObservabilityConfig, UpstreamConfig};
pub use validation::{validate_config, ValidationError};
