//! Configuration loading and management

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind, e.g. "127.0.0.1:5000"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Module the application is assembled from
    #[serde(default = "default_entry_module")]
    pub entry_module: String,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_entry_module() -> String {
    "api.app".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            entry_module: default_entry_module(),
        }
    }
}

/// Session issuance settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// Days a new session stays valid
    #[serde(default = "default_lifetime_days")]
    pub lifetime_days: i64,

    /// bcrypt cost used when hashing passwords
    #[serde(default = "default_hash_cost")]
    pub hash_cost: u32,
}

fn default_lifetime_days() -> i64 {
    365
}

fn default_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_days: default_lifetime_days(),
            hash_cost: default_hash_cost(),
        }
    }
}

/// Administrator account created at startup when missing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminConfig {
    pub cpf: String,
    pub password: String,
    pub display_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Cross-origin settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_any_origin: bool,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub admin: Option<AdminConfig>,

    #[serde(default)]
    pub cors: CorsConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load from the file named by `var`, or fall back to defaults when unset
    pub fn from_env_or_default(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(path) => {
                tracing::info!(path = %path, "loading configuration");
                Self::from_yaml_file(&path)
            }
            Err(_) => {
                tracing::info!("{} not set, using default configuration", var);
                Ok(Self::default())
            }
        }
    }
}
