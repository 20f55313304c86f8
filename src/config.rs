use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LookalikeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding the feature store.
    pub store_path: String,
    /// Dataset root: one subdirectory per category.
    pub dataset_dir: String,
    /// Directory that stored relative paths are resolved against.
    pub asset_root: String,
    /// Public URL prefix under which `asset_root` is served.
    pub asset_url_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    pub model_file: String,
    pub input_name: String,
    pub output_name: String,
    pub input_size: u32,
    pub dimensions: usize,
    pub intra_threads: usize,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let upload_dir = default_lookalike_dir()
            .join("uploads")
            .to_string_lossy()
            .into_owned();
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            log_level: "info".into(),
            upload_dir,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let store_path = default_lookalike_dir()
            .join("features.db")
            .to_string_lossy()
            .into_owned();
        Self {
            store_path,
            dataset_dir: "static/dataset".into(),
            asset_root: "static".into(),
            asset_url_prefix: "/static".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_lookalike_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "mobilenet_v2".into(),
            cache_dir,
            model_file: "mobilenet_v2.onnx".into(),
            input_name: "input".into(),
            output_name: "output".into(),
            input_size: 224,
            dimensions: crate::embedding::EMBEDDING_DIM,
            intra_threads: 4,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    /// Full path of the ONNX model file inside the cache directory.
    pub fn model_path(&self) -> PathBuf {
        expand_tilde(&self.cache_dir).join(&self.model_file)
    }
}

/// Returns `~/.lookalike/`
pub fn default_lookalike_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lookalike")
}

/// Returns the default config file path: `~/.lookalike/config.toml`
pub fn default_config_path() -> PathBuf {
    default_lookalike_dir().join("config.toml")
}

impl LookalikeConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LookalikeConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (LOOKALIKE_STORE, LOOKALIKE_DATASET, LOOKALIKE_LOG_LEVEL, PORT).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LOOKALIKE_STORE") {
            self.storage.store_path = val;
        }
        if let Ok(val) = std::env::var("LOOKALIKE_DATASET") {
            self.storage.dataset_dir = val;
        }
        if let Ok(val) = std::env::var("LOOKALIKE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "ignoring unparseable PORT"),
            }
        }
    }

    /// Resolve the feature store path, expanding `~` if needed.
    pub fn resolved_store_path(&self) -> PathBuf {
        expand_tilde(&self.storage.store_path)
    }

    pub fn resolved_dataset_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.dataset_dir)
    }

    pub fn resolved_asset_root(&self) -> PathBuf {
        expand_tilde(&self.storage.asset_root)
    }

    pub fn resolved_upload_dir(&self) -> PathBuf {
        expand_tilde(&self.server.upload_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
