//! CLI configuration

use anyhow::{Context, Result};
use buildchain_core::Configuration;
use std::path::PathBuf;

use crate::prompt::InterruptAction;

/// Settings collected from flags and environment
pub struct Config {
    pub config_path: PathBuf,
    pub log_file: PathBuf,
    pub on_interrupt: InterruptAction,
}

impl Config {
    /// Loads and validates the chain configuration file
    pub fn load_configuration(&self) -> Result<Configuration> {
        Configuration::load(&self.config_path).with_context(|| {
            format!(
                "Failed to load configuration from {}",
                self.config_path.display()
            )
        })
    }
}
