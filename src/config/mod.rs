//! Declarative configuration: models, file loading, and validation.

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{load_config, load_config_from_env, resolve_config_path};
pub use models::{Backend, Config, Encoding, Endpoint, LogFormat};
pub use validation::{ConfigValidator, ValidationError};
