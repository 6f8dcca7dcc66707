//! Declaring models and their static defaults from a settings file.
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [models.Book]
//! defaults.title = { value = "Untitled" }
//! defaults.pages = { value = 1, allows_nil = false }
//!
//! [models.Novel]
//! parent = "Book"
//! defaults.genre = { value = "fiction" }
//! ```
//!
//! Values from the environment (`DEFAULTER__LOGGING__LEVEL=trace`) override the file.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::default::DefaultOptions;
use crate::error::{DefaulterError, Result};
use crate::logging::LoggingSettings;

pub const ENV_PREFIX: &str = "DEFAULTER";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingSettings,
    /// In file order.
    #[serde(default)]
    pub models: IndexMap<String, ModelSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub defaults: IndexMap<String, DefaultOptions>,
}

impl Settings {
    /// Reads `path` (format from its extension) with the environment overlay on top.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let name = path
            .to_str()
            .ok_or_else(|| DefaulterError::Config(format!("Settings path is not UTF-8: {:?}", path)))?;
        let config = Config::builder()
            .add_source(File::with_name(name))
            .add_source(environment())
            .build()?;
        Ok(config.try_deserialize()?)
    }
    /// Reads settings held in memory. The environment is not consulted.
    pub fn from_str(source: &str, format: FileFormat) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(source, format))
            .build()?;
        Ok(config.try_deserialize()?)
    }
    /// Defines every configured model, parents before children, then declares the
    /// configured defaults in file order.
    pub fn apply(&self, catalog: &mut Catalog) -> Result<()> {
        let mut chain = Vec::new();
        for name in self.models.keys() {
            self.define(catalog, name, &mut chain)?;
        }
        for (name, model) in &self.models {
            for (attribute, options) in &model.defaults {
                catalog.default_value_with(name, attribute, options.clone())?;
            }
            debug!(model = %name, defaults = model.defaults.len(), "settings applied");
        }
        Ok(())
    }
    fn define(&self, catalog: &mut Catalog, name: &str, chain: &mut Vec<String>) -> Result<()> {
        if chain.iter().any(|visited| visited == name) {
            return Err(DefaulterError::Config(format!(
                "Cyclic parent chain: {} -> {}",
                chain.join(" -> "),
                name
            )));
        }
        let parent = self.models.get(name).and_then(|m| m.parent.as_deref());
        if let Some(parent) = parent {
            if self.models.contains_key(parent) {
                chain.push(name.to_string());
                self.define(catalog, parent, chain)?;
                chain.pop();
            } else if !catalog.is_defined(parent) {
                return Err(DefaulterError::Config(format!(
                    "Model {} names an undefined parent {}",
                    name, parent
                )));
            }
        }
        catalog.define_model(name, parent)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
