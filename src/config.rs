use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the loot store root.
pub const OUTPUT_ENV: &str = "HARVESTR_OUTPUT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub server: ServerConfig,
    pub jobs: JobsConfig,
    pub loot: LootConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub listen_port: u16,
    pub max_clients: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            listen_port: 9947,
            max_clients: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Per-job deadline in seconds
    pub timeout_seconds: u64,
    /// Worker pool size
    pub concurrency: usize,
    /// Upper bound on resolved targets per invocation
    pub max_targets: usize,
    /// Grace period after a kill before a job is abandoned
    pub kill_grace_seconds: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 600,
            concurrency: 8,
            max_targets: 4096,
            kill_grace_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LootConfig {
    pub output_path: PathBuf,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            output_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("harvestr")
                .join("loot"),
        }
    }
}

impl LootConfig {
    /// Apply the `HARVESTR_OUTPUT` override if set.
    pub fn apply_env(&mut self, value: Option<String>) {
        if let Some(dir) = value {
            if !dir.is_empty() {
                self.output_path = PathBuf::from(dir);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Extraction executable name or path
    pub program: String,
    /// Subcommand passed before per-target arguments
    pub subcommand: String,
    /// Extra arguments appended to every backend invocation
    pub extra_args: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: "donpapi".to_string(),
            subcommand: "collect".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            server: ServerConfig::default(),
            jobs: JobsConfig::default(),
            loot: LootConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_inner(config_path)?;
        config.loot.apply_env(std::env::var(OUTPUT_ENV).ok());
        Ok(config)
    }

    fn load_inner(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
