//! Configuration file parsing for RN Demon
//!
//! Supports `.rndemon/config.toml` in the project directory.

pub mod settings;
pub mod types;

pub use settings::{init_config_dir, load_settings, CONFIG_FILENAME, RNDEMON_DIR};
pub use types::*;
