//! # Shop Configuration
//!
//! Settings for one shop installation.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FADE_DATABASE_PATH=/srv/fade/fade.db                               │
//! │     FADE_SHOP_NAME="Fade Downtown"                                     │
//! │     FADE_UTC_OFFSET_MINUTES=-180                                       │
//! │     FADE_LOG=debug                                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fade/shop.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.fade.shop/shop.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # shop.toml
//! [database]
//! path = "/srv/fade/fade.db"
//! max_connections = 5
//!
//! [shop]
//! name = "Fade Downtown"
//! opens_at = "09:00"
//! closes_at = "19:00"
//! utc_offset_minutes = -180
//!
//! [logging]
//! filter = "info,fade=debug,sqlx=warn"
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::pool::DbConfig;
use fade_core::schedule::shop_offset;
use fade_core::validation::{parse_clock_time, validate_name, validate_window};

const ENV_DATABASE_PATH: &str = "FADE_DATABASE_PATH";
const ENV_SHOP_NAME: &str = "FADE_SHOP_NAME";
const ENV_UTC_OFFSET: &str = "FADE_UTC_OFFSET_MINUTES";
const ENV_LOG: &str = "FADE_LOG";

// =============================================================================
// Sections
// =============================================================================

/// Where the SQLite file lives and how many connections to keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "fade", "shop")
        .map(|dirs| dirs.data_dir().join("fade.db"))
        .unwrap_or_else(|| PathBuf::from("fade.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// The organization seeded on first run.
///
/// Times are `HH:MM` in shop-local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopSettings {
    #[serde(default = "default_shop_name")]
    pub name: String,

    #[serde(default = "default_opens_at")]
    pub opens_at: String,

    #[serde(default = "default_closes_at")]
    pub closes_at: String,

    /// Offset of shop-local time from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_shop_name() -> String {
    "Fade Barbershop".to_string()
}

fn default_opens_at() -> String {
    "09:00".to_string()
}

fn default_closes_at() -> String {
    "19:00".to_string()
}

impl Default for ShopSettings {
    fn default() -> Self {
        ShopSettings {
            name: default_shop_name(),
            opens_at: default_opens_at(),
            closes_at: default_closes_at(),
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` wins over it.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info,fade=debug,sqlx=warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// ShopConfig
// =============================================================================

/// Complete shop configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShopConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub shop: ShopSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl ShopConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`shop.toml`)
    /// 3. `FADE_*` environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(|| Self::default_path().ok()) {
            if path.exists() {
                info!(?path, "Loading shop config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns the defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load shop config: {}. Using defaults.", e);
            Self::default()
        })
    }

    fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Writes the configuration, creating the parent directory.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<PathBuf> {
        let path = match config_path {
            Some(path) => path,
            None => Self::default_path()?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Shop config saved");
        Ok(path)
    }

    /// `shop.toml` in the platform config directory.
    pub fn default_path() -> ConfigResult<PathBuf> {
        directories::ProjectDirs::from("com", "fade", "shop")
            .map(|dirs| dirs.config_dir().join("shop.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Checks names, hours and offset.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |e: fade_core::ValidationError| ConfigError::Invalid(e.to_string());

        validate_name("shop.name", &self.shop.name).map_err(invalid)?;
        let (opens, closes) = self.opening_hours()?;
        validate_window(opens, closes).map_err(invalid)?;
        shop_offset(self.shop.utc_offset_minutes).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Parsed `(opens_at, closes_at)`.
    pub fn opening_hours(&self) -> ConfigResult<(NaiveTime, NaiveTime)> {
        let parse = |field: &str, value: &str| {
            parse_clock_time(field, value).map_err(|e| ConfigError::Invalid(e.to_string()))
        };
        Ok((
            parse("shop.opens_at", &self.shop.opens_at)?,
            parse("shop.closes_at", &self.shop.closes_at)?,
        ))
    }

    /// Pool settings for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }

    /// Applies `FADE_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(name) = lookup(ENV_SHOP_NAME) {
            self.shop.name = name;
        }

        if let Some(offset) = lookup(ENV_UTC_OFFSET) {
            match offset.trim().parse::<i32>() {
                Ok(minutes) => self.shop.utc_offset_minutes = minutes,
                Err(_) => warn!(value = %offset, "Ignoring non-numeric {}", ENV_UTC_OFFSET),
            }
        }

        if let Some(filter) = lookup(ENV_LOG) {
            self.logging.filter = filter;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = ShopConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.filter, "info,fade=debug,sqlx=warn");
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ShopConfig = toml::from_str(
            r#"
            [shop]
            name = "Fade Downtown"
            utc_offset_minutes = -180
            "#,
        )
        .unwrap();

        assert_eq!(config.shop.name, "Fade Downtown");
        assert_eq!(config.shop.utc_offset_minutes, -180);
        assert_eq!(config.shop.opens_at, "09:00");
        assert_eq!(config.logging, LoggingSettings::default());
    }

    #[test]
    fn test_env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DATABASE_PATH, "/tmp/fade-test.db"),
            (ENV_UTC_OFFSET, "60"),
            (ENV_LOG, "warn"),
        ]);
        let mut config = ShopConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/fade-test.db"));
        assert_eq!(config.shop.utc_offset_minutes, 60);
        assert_eq!(config.logging.filter, "warn");
        assert_eq!(config.shop.name, default_shop_name());
    }

    #[test]
    fn test_bad_offset_override_is_ignored() {
        let mut config = ShopConfig::default();
        config.apply_overrides(|key| (key == ENV_UTC_OFFSET).then(|| "east".to_string()));
        assert_eq!(config.shop.utc_offset_minutes, 0);
    }

    #[test]
    fn test_validation_rejects_bad_hours() {
        let mut config = ShopConfig::default();
        config.shop.opens_at = "19:00".to_string();
        config.shop.closes_at = "09:00".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.shop.opens_at = "nine".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("fade-config-{}.toml", uuid::Uuid::new_v4()));
        let mut config = ShopConfig::default();
        config.shop.name = "Fade Test".to_string();
        config.database.path = PathBuf::from("/tmp/fade.db");

        config.save(Some(path.clone())).unwrap();
        let loaded = ShopConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, config);
    }
}
