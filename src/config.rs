use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_FETCH_RETRIES, DEFAULT_FOLDER, DEFAULT_RETRY_INITIAL_DELAY_MS,
    DEFAULT_RETRY_MAX_DELAY_MS,
};
use crate::reconcile::ViewMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configured mail accounts
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    /// Which account to use by default (index into accounts)
    #[serde(default)]
    pub default_account: Option<usize>,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl AccountConfig {
    /// Get the display name or fall back to email
    pub fn display_name_or_email(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// View mode used when a mailbox is opened
    #[serde(default)]
    pub default_mode: ViewMode,
    #[serde(default = "default_folder")]
    pub default_folder: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_mode: ViewMode::default(),
            default_folder: default_folder(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persist the last server listing and show it until the first fetch lands
    #[serde(default = "default_true")]
    pub listing_cache: bool,
    /// Retries after a failed mailbox listing (transport errors only)
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_cache: true,
            fetch_retries: default_fetch_retries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_folder() -> String {
    DEFAULT_FOLDER.to_string()
}

fn default_fetch_retries() -> u32 {
    DEFAULT_FETCH_RETRIES
}

fn default_retry_initial_delay_ms() -> u64 {
    DEFAULT_RETRY_INITIAL_DELAY_MS
}

fn default_retry_max_delay_ms() -> u64 {
    DEFAULT_RETRY_MAX_DELAY_MS
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("vaultmail");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let dir = dirs::data_local_dir()
            .context("Could not find data directory")?
            .join("vaultmail");
        Ok(dir)
    }

    pub fn database_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("archive.db"))
    }

    /// Get the default account (first account or the one specified by default_account)
    pub fn default_account(&self) -> Option<&AccountConfig> {
        if let Some(idx) = self.default_account {
            self.accounts.get(idx)
        } else {
            self.accounts.first()
        }
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at {}\n\
                 Please create a config file. Example:\n\n\
                 [[accounts]]\n\
                 email = \"you@example.com\"\n\n\
                 [view]\n\
                 default_mode = \"all\"",
                path.display()
            );
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if let Some(idx) = config.default_account
            && idx >= config.accounts.len()
        {
            anyhow::bail!(
                "default_account = {} but only {} account(s) configured",
                idx,
                config.accounts.len()
            );
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let dir = Self::config_dir()?;

        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(Self::config_dir()?)?;
        fs::create_dir_all(Self::data_dir()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            default_account = 1

            [[accounts]]
            email = "test@example.com"

            [[accounts]]
            email = "work@example.com"
            display_name = "Work"

            [view]
            default_mode = "local"
            default_folder = "Archive"

            [cache]
            listing_cache = false
            fetch_retries = 5
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.default_account().unwrap().email, "work@example.com");
        assert_eq!(
            config.default_account().unwrap().display_name_or_email(),
            "Work"
        );
        assert_eq!(config.view.default_mode, ViewMode::Local);
        assert_eq!(config.view.default_folder, "Archive");
        assert!(!config.cache.listing_cache);
        assert_eq!(config.cache.fetch_retries, 5);
        assert_eq!(
            config.cache.retry_initial_delay_ms,
            DEFAULT_RETRY_INITIAL_DELAY_MS
        );
    }

    #[test]
    fn test_defaults_for_minimal_config() {
        let toml = r#"
            [[accounts]]
            email = "solo@example.com"
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.default_account().unwrap().email, "solo@example.com");
        assert_eq!(config.view.default_mode, ViewMode::All);
        assert_eq!(config.view.default_folder, DEFAULT_FOLDER);
        assert!(config.cache.listing_cache);
        assert_eq!(config.cache.fetch_retries, DEFAULT_FETCH_RETRIES);
    }

    #[test]
    fn test_rejects_unknown_view_mode() {
        let toml = r#"
            [view]
            default_mode = "starred"
        "#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_default_account() {
        let toml = r#"
            default_account = 3

            [[accounts]]
            email = "solo@example.com"
        "#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = Config {
            accounts: vec![AccountConfig {
                email: "me@example.com".to_string(),
                display_name: None,
            }],
            default_account: Some(0),
            view: ViewConfig::default(),
            cache: CacheConfig::default(),
        };

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::parse(&text).unwrap();
        assert_eq!(parsed.accounts[0].email, "me@example.com");
        assert_eq!(parsed.view.default_mode, config.view.default_mode);
    }
}
