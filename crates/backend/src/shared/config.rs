use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::projections::p900_seller_monthly_kpi::{ConnectionMode, UndeliveredPolicy};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub kpi: KpiConfig,
    #[serde(default)]
    pub import: ImportConfig,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KpiConfig {
    #[serde(default)]
    pub connection_mode: ConnectionMode,
    #[serde(default)]
    pub undelivered_policy: UndeliveredPolicy,
}

/// Olist CSV exports used to fill the raw tables on first start
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ImportConfig {
    pub orders_csv: Option<String>,
    pub order_items_csv: Option<String>,
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[server]
port = 3000

[database]
path = "target/db/olist.db"

[kpi]
connection_mode = "writable"
undelivered_policy = "on_time"
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Current working directory
/// 3. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    let mut candidates = Vec::new();
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.to_path_buf());
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }

    for dir in candidates {
        let config_path = dir.join("config.toml");
        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path)?;
            return parse_config(&contents, dir);
        }
        tracing::debug!("config.toml not found at: {}", config_path.display());
    }

    tracing::info!("Using default embedded configuration");
    parse_config(DEFAULT_CONFIG, std::env::current_dir()?)
}

fn parse_config(contents: &str, base_dir: PathBuf) -> anyhow::Result<Config> {
    let mut config: Config = toml::from_str(contents)?;
    config.base_dir = base_dir;
    Ok(config)
}

impl Config {
    /// Absolute path of the SQLite file
    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database.path)
    }

    /// Both CSV paths, or None when the import is not configured
    pub fn import_paths(&self) -> Option<(PathBuf, PathBuf)> {
        match (&self.import.orders_csv, &self.import.order_items_csv) {
            (Some(orders), Some(items)) => Some((self.resolve(orders), self.resolve(items))),
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "[import] needs both orders_csv and order_items_csv, ignoring partial section"
                );
                None
            }
        }
    }

    fn resolve(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
