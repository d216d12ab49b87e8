//! Unified configuration layer.
//!
//! All environment variable reads go through here; the rest of the workspace
//! consumes structured config instead of calling `std::env::var`.
//!
//! - `loader`: env_or, env_optional, env_bool helpers
//! - `schema`: ObservabilityConfig, BootstrapConfig
//! - `env_keys`: key constants (with legacy aliases)
//! - `paths`: credentials/requirements default resolution

pub mod env_keys;
pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, env_u64};
pub use paths::{resolve_credentials, resolve_requirements, PathArg};
pub use schema::{BootstrapConfig, ObservabilityConfig};
