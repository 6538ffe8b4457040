//! Generator Configuration
//!
//! Defines the structure of `flowstore.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use flowstore_codegen::{Builder, DEFAULT_MARKER, DEFAULT_RUNTIME_PATH};

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Configuration file (flowstore.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowstoreConfig {
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// Generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Crate source directories to scan
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<PathBuf>,
    /// Root directory for generated units
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Path of the runtime crate in generated code
    #[serde(default = "default_runtime_path")]
    pub runtime_path: String,
    /// Name of the store-root marker attribute
    #[serde(default = "default_marker")]
    pub marker: String,
}

fn default_source_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("src")]
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("target/flowstore")
}

fn default_runtime_path() -> String {
    DEFAULT_RUNTIME_PATH.to_string()
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            source_dirs: default_source_dirs(),
            out_dir: default_out_dir(),
            runtime_path: default_runtime_path(),
            marker: default_marker(),
        }
    }
}

impl GeneratorConfig {
    /// Generator over these settings
    pub fn builder(&self) -> Builder {
        self.source_dirs.iter().fold(
            Builder::new()
                .out_dir(&self.out_dir)
                .runtime_path(&self.runtime_path)
                .marker(&self.marker),
            |builder, dir| builder.source_dir(dir),
        )
    }
}

impl FlowstoreConfig {
    /// Parse a configuration document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load a configuration file, or use defaults when it does not exist
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path).await
    }
}
