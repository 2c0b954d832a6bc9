//! Handles settings for the command line. Configuration is read from
//! `config/ledger.toml` (or the file given with `--config`), then from the
//! `LEDGER_*` environment variables.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/ledger.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub level: String,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreSettings {
    /// Directory holding one CSV file per record kind.
    Csv { path: String },
    /// `sea-orm` connection string, e.g. `sqlite:./ledger.db?mode=rwc`.
    Sqlite { url: String },
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            store: StoreSettings::Csv {
                path: "data".to_string(),
            },
        }
    }
}

impl Settings {
    /// `LEDGER_LEVEL=debug`, `LEDGER_STORE__KIND=sqlite`,
    /// `LEDGER_STORE__URL=...` override the file.
    pub fn new(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);
        let settings = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("LEDGER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }
}
