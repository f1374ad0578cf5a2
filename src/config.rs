use std::path::PathBuf;

use ::config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::CatalogError;

pub const DEFAULT_BASE_URL: &str = "https://catalog.unc.edu";

/// Runtime settings. Sources, later wins: built-in defaults, an optional
/// `catalog.toml` in the working directory, `CATALOG_*` environment
/// variables, then command-line overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub out_dir: PathBuf,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub require_leaf: bool,
}

/// Command-line values that take precedence over every other source.
#[derive(Debug, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub out_dir: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl Settings {
    pub fn load(overrides: Overrides) -> Result<Self, CatalogError> {
        let settings: Settings = Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)
            .and_then(|b| b.set_default("out_dir", "data"))
            .and_then(|b| b.set_default("concurrency", 4_i64))
            .and_then(|b| b.set_default("timeout_secs", 30_i64))
            .and_then(|b| {
                b.set_default(
                    "user_agent",
                    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
                )
            })
            .and_then(|b| b.set_default("require_leaf", false))
            .map(|b| {
                b.add_source(File::with_name("catalog").required(false))
                    .add_source(Environment::with_prefix("CATALOG"))
            })
            .and_then(|b| b.set_override_option("base_url", overrides.base_url))
            .and_then(|b| b.set_override_option("out_dir", overrides.out_dir))
            .and_then(|b| {
                b.set_override_option("concurrency", overrides.concurrency.map(|n| n as i64))
            })
            .and_then(|b| {
                b.set_override_option("timeout_secs", overrides.timeout_secs.map(|n| n as i64))
            })
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CatalogError::InvalidConfiguration(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.concurrency == 0 {
            return Err(CatalogError::InvalidConfiguration(
                "concurrency must be at least 1".into(),
            ));
        }
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            CatalogError::InvalidConfiguration(format!("base_url '{}': {}", self.base_url, e))
        })?;
        Ok(())
    }
}
