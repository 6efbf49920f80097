//! # Configuration Loading
//!
//! Handles loading configuration from defaults, a TOML file found on the
//! search path, and `TANDEM_*` environment variables, then validates it.

use crate::{
    config::{schema::TandemConfig, validator::ConfigValidator},
    Error, Result,
};
use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

const CONFIG_NAMES: [&str; 2] = ["tandem.toml", "config.toml"];

/// Configuration loader with support for multiple sources
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
    env_prefix: String,
    env_overrides: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from("."), PathBuf::from("./config")];
        if let Some(dir) = dirs::config_dir() {
            search_paths.push(dir.join("tandem"));
        }
        Self { search_paths, env_prefix: "TANDEM".to_string(), env_overrides: None }
    }

    /// Add a search path for configuration files
    #[must_use]
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Replace the search paths entirely
    #[must_use]
    pub fn with_search_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.search_paths = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        self
    }

    /// Set the environment variable prefix
    #[must_use]
    pub fn with_env_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.as_ref().to_string();
        self
    }

    /// Read overrides from `vars` instead of the process environment
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_overrides = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Load configuration from all available sources
    ///
    /// # Errors
    /// Returns an error if a file cannot be read or parsed, an environment
    /// variable holds a bad value, or the result fails validation.
    pub fn load(&self) -> Result<TandemConfig> {
        info!("Loading configuration");

        let mut config = match self.find_config_file() {
            Some(path) => {
                info!("Loaded configuration file: {}", path.display());
                Self::read_file(&path)?
            },
            None => {
                debug!("No configuration file found in search paths");
                TandemConfig::default()
            },
        };

        self.apply_env_vars(&mut config)?;
        ConfigValidator::validate(&config)?;

        info!(servers = config.servers.len(), "Configuration loaded and validated successfully");
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed or fails validation.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<TandemConfig> {
        let path = path.as_ref();
        info!("Loading configuration from file: {}", path.display());

        let mut config = Self::read_file(path)?;
        self.apply_env_vars(&mut config)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .flat_map(|dir| CONFIG_NAMES.iter().map(move |name| dir.join(name)))
            .find(|path| path.is_file())
    }

    fn read_file(path: &Path) -> Result<TandemConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    fn collect_env_vars(&self) -> HashMap<String, String> {
        let prefix = format!("{}_", self.env_prefix);
        let source: Box<dyn Iterator<Item = (String, String)>> = match &self.env_overrides {
            Some(vars) => Box::new(vars.clone().into_iter()),
            None => Box::new(env::vars()),
        };

        source
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix).map(|rest| (rest.to_lowercase(), value))
            })
            .collect()
    }

    fn apply_env_vars(&self, config: &mut TandemConfig) -> Result<()> {
        let vars = self.collect_env_vars();
        debug!("Collected {} environment variables", vars.len());

        for (key, value) in vars {
            match key.as_str() {
                "servers" => {
                    config.servers = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                },
                "recycle_timeout" => {
                    let ms = value.parse::<u64>().map_err(|e| {
                        Error::Configuration(format!("Invalid recycle_timeout '{value}': {e}"))
                    })?;
                    config.recycle_timeout = Duration::from_millis(ms);
                },
                "log_level" => config.logging.level = value,
                "log_json" => {
                    config.logging.json = value.parse::<bool>().map_err(|e| {
                        Error::Configuration(format!("Invalid log_json '{value}': {e}"))
                    })?;
                },
                other => debug!("Ignoring unknown configuration variable {other}"),
            }
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
