//! Config loading (component L): `serde_yaml`-backed structs, the
//! dashboard printer and the conflict validator, grounded on the
//! teacher's original `src/config.rs` (before it was superseded
//! in-tree by a hand-rolled YAML parser) plus `config/{display,validate}.rs`.

pub mod display;
pub mod types;
pub mod validate;

pub use display::display_config;
pub use types::{AppConfig, RouteConfig, ServerConfig, MAX_FD};
pub use validate::validate_configs;

use std::fs;
use std::path::Path;

use crate::error::ServerError;

impl AppConfig {
    pub fn from_str(contents: &str) -> Result<Self, ServerError> {
        let mut config: AppConfig = serde_yaml::from_str(contents)?;
        config.servers = validate_configs(config.servers);
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    pub fn display_config(&self) {
        display_config(&self.servers);
    }
}
