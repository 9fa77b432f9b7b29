//! AQS Sorter Core Library
//!
//! Shared utilities for the sorter binary:
//! - Configuration file discovery and loading (XDG-compliant)
//! - Output path helpers

mod config;
pub mod fs;

pub use config::{find_config_file, load_config, ConfigFileError, ConfigSource};
pub use fs::{ensure_dir_exists, ensure_parent_dir, yearly_file_path};

/// Application name used for XDG paths
pub const APP_NAME: &str = "aqs-sorter";

/// Config filename searched in the working directory and XDG/system locations
pub const CONFIG_FILENAME: &str = "sorter.toml";

/// Environment variable holding an explicit config path
pub const CONFIG_ENV_VAR: &str = "AQS_SORTER_CONFIG";
