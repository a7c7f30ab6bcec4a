//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → copied into the client at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a client is built; changes require a new client
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthConfig, AuthScheme, CircuitBreakerConfig, ClientConfig, HealthConfig, RetryConfig,
};
pub use validation::{validate_config, ValidationError};
