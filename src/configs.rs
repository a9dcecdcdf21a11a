//! Application configuration
//!
//! Selects the deployment environment, the pinned anchor files for each
//! environment and the merchant keystore. Loaded from `acp.toml` by default:
//!
//! ```toml
//! environment = "production"
//!
//! [anchors.production]
//! root = "/etc/acp/root.cer"
//! intermediate = "/etc/acp/middle.cer"
//! encryption = "/etc/acp/enc.cer"
//!
//! [keystore]
//! path = "/etc/acp/merchant.pfx"
//! password = "000000"
//! ```
//!
//! Anchor sets left out fall back to the paths under `certs/`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "acp.toml";

/// Deployment environment selecting which set of pinned anchors is loaded.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Test,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Test => f.write_str("test"),
            Environment::Production => f.write_str("production"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub environment: Environment,
    pub anchors: Anchors,
    pub keystore: KeystoreConfig,
}

/// Certificate file locations for both environments.
#[derive(Debug, Deserialize, Clone)]
pub struct Anchors {
    #[serde(default = "default_test_anchors")]
    pub test: AnchorPaths,
    #[serde(default = "default_production_anchors")]
    pub production: AnchorPaths,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AnchorPaths {
    pub root: PathBuf,
    pub intermediate: PathBuf,
    pub encryption: PathBuf,
}

#[derive(Deserialize, Clone)]
pub struct KeystoreConfig {
    pub path: PathBuf,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
}

impl fmt::Debug for KeystoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreConfig")
            .field("path", &self.path)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn default_test_anchors() -> AnchorPaths {
    AnchorPaths {
        root: PathBuf::from("certs/test/acp_test_root.cer"),
        intermediate: PathBuf::from("certs/test/acp_test_middle.cer"),
        encryption: PathBuf::from("certs/test/acp_test_enc.cer"),
    }
}

fn default_production_anchors() -> AnchorPaths {
    AnchorPaths {
        root: PathBuf::from("certs/prod/acp_prod_root.cer"),
        intermediate: PathBuf::from("certs/prod/acp_prod_middle.cer"),
        encryption: PathBuf::from("certs/prod/acp_prod_enc.cer"),
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    /// * `Result<Self>` - The parsed configuration or an error naming the file
    pub fn from_file(path: &str) -> Result<Self> {
        let config_str =
            fs::read_to_string(path).context(format!("Failed to read config file: {}", path))?;

        Self::from_toml(&config_str)
    }

    /// Parse configuration from TOML text
    ///
    /// # Arguments
    /// * `config_str` - TOML document
    ///
    /// # Returns
    /// * `Result<Self>` - The parsed configuration or a parse error
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(config_str).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration with default path (acp.toml)
    pub fn load() -> Result<Self> {
        Self::from_file(DEFAULT_CONFIG_PATH)
    }

    /// Anchor file set for the configured environment
    pub fn active_anchors(&self) -> &AnchorPaths {
        self.anchors.for_environment(self.environment)
    }
}

impl Anchors {
    pub fn for_environment(&self, environment: Environment) -> &AnchorPaths {
        match environment {
            Environment::Test => &self.test,
            Environment::Production => &self.production,
        }
    }
}
