//! Configuration system for noesis.
//!
//! Provides TOML-based configuration with:
//! - Sections for the store, embedding provider, text generation, search,
//!   graph analysis and recommendation
//! - Config file layering (user config dir + project-local `noesis.toml`)
//! - API key resolution (env var → config file)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, config_dir, data_dir, load_config_file,
    load_config_with_options, save_config, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
