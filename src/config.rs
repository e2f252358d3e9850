use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{ClientError, Result};

/// Configuration for the ClassCraft client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote service settings
    pub server: ServerConfig,

    /// Upload encoding settings
    pub upload: UploadConfig,

    /// Where downloaded results are written
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the ClassCraft service
    pub base_url: String,

    /// Path of the class sorting endpoint, relative to `base_url`
    pub process_path: String,

    /// Path of the MAP score endpoint, relative to `base_url`
    pub calculate_path: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Connection timeout in seconds
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Size of each body chunk; progress is reported once per chunk
    pub chunk_size: usize,

    /// Mime type sent with the file part
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for downloaded result files
    pub download_dir: PathBuf,

    /// Replace an existing file with the same name
    pub overwrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is not set
    pub level: String,
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Resolve an endpoint path against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = Url::parse(&self.base_url)?;
        // Url::join drops the last segment unless the base ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }
}

impl Config {
    /// Load configuration from the first config file found, then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::search_paths())
    }

    /// Default config file locations, in lookup order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut config_paths = vec![
            PathBuf::from("classcraft.toml"),
            PathBuf::from("config/classcraft.toml"),
        ];
        if let Ok(home) = std::env::var("HOME") {
            config_paths.push(Path::new(&home).join(".config/classcraft/config.toml"));
        }
        config_paths
    }

    /// Load the first of `paths` that exists. A file that exists but does
    /// not parse is an error rather than a silent fall back to defaults.
    pub fn load_from(paths: &[PathBuf]) -> Result<Self> {
        let mut config = Config::default();
        if let Some(path) = paths.iter().find(|path| path.exists()) {
            config = Self::from_file(path)?;
            tracing::info!("📄 Loaded configuration from: {}", path.display());
        }

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        toml::from_str(&config_str)
            .map_err(|e| ClientError::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Override settings with environment variables
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CLASSCRAFT_SERVER_URL") {
            self.server.base_url = url;
        }

        if let Ok(timeout) = std::env::var("CLASSCRAFT_TIMEOUT") {
            match timeout.parse() {
                Ok(seconds) => self.server.timeout_seconds = seconds,
                Err(_) => tracing::warn!("Ignoring invalid CLASSCRAFT_TIMEOUT: {}", timeout),
            }
        }

        if let Ok(output_dir) = std::env::var("CLASSCRAFT_OUTPUT_DIR") {
            self.output.download_dir = PathBuf::from(output_dir);
        }

        if let Ok(log_level) = std::env::var("CLASSCRAFT_LOG_LEVEL") {
            self.logging.level = log_level;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.server.base_url).map_err(|e| {
            ClientError::Configuration(format!("invalid base_url {}: {}", self.server.base_url, e))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "base_url must use http or https, got {}",
                base.scheme()
            )));
        }

        if self.server.timeout_seconds == 0 {
            return Err(ClientError::Configuration(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.upload.chunk_size == 0 {
            return Err(ClientError::Configuration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "ClassCraft Configuration:\n\
            - Server: {}\n\
            - Timeout: {}s\n\
            - Upload chunk size: {} bytes\n\
            - Download directory: {}",
            self.server.base_url,
            self.server.timeout_seconds,
            self.upload.chunk_size,
            self.output.download_dir.display(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                base_url: "http://localhost:8000".to_string(),
                process_path: "process/".to_string(),
                calculate_path: "calculate/".to_string(),
                timeout_seconds: 300,
                connect_timeout_seconds: 10,
            },
            upload: UploadConfig {
                chunk_size: 64 * 1024,
                mime_type: "text/csv".to_string(),
            },
            output: OutputConfig {
                download_dir: PathBuf::from("."),
                overwrite: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.server.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.config.server.timeout_seconds = seconds;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.config.upload.chunk_size = size;
        self
    }

    pub fn with_download_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.download_dir = dir;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.config.output.overwrite = overwrite;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.base_url, "http://localhost:8000");
        assert_eq!(config.upload.mime_type, "text/csv");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_resolution() {
        let config = Config::default();
        assert_eq!(
            config.server.endpoint(&config.server.process_path).unwrap().as_str(),
            "http://localhost:8000/process/"
        );

        let nested = ConfigBuilder::new()
            .with_base_url("http://example.com/api")
            .build();
        assert_eq!(
            nested.server.endpoint("/calculate/").unwrap().as_str(),
            "http://example.com/api/calculate/"
        );
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_base_url("https://classcraft.example")
            .with_timeout(5)
            .with_chunk_size(1024)
            .with_overwrite(true)
            .build();

        assert_eq!(config.server.base_url, "https://classcraft.example");
        assert_eq!(config.server.timeout(), Duration::from_secs(5));
        assert_eq!(config.upload.chunk_size, 1024);
        assert!(config.output.overwrite);
    }

    #[test]
    fn test_config_validation_rejects_bad_values() {
        let config = ConfigBuilder::new().with_base_url("ftp://nowhere").build();
        assert!(config.validate().is_err());

        let config = ConfigBuilder::new().with_timeout(0).build();
        assert!(config.validate().is_err());

        let config = ConfigBuilder::new().with_chunk_size(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_uses_first_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("classcraft.toml");
        ConfigBuilder::new()
            .with_chunk_size(2048)
            .build()
            .save(&present)
            .unwrap();

        let config = Config::load_from(&[missing.clone(), present]).unwrap();
        assert_eq!(config.upload.chunk_size, 2048);

        let config = Config::load_from(&[missing]).unwrap();
        assert_eq!(config.upload.chunk_size, Config::default().upload.chunk_size);
    }

    #[test]
    fn test_load_from_rejects_malformed_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let broken = dir.path().join("classcraft.toml");
        let fallback = dir.path().join("fallback.toml");
        std::fs::write(&broken, "this is = = not toml").unwrap();
        Config::default().save(&fallback).unwrap();

        let err = Config::load_from(&[broken, fallback]).unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
        assert!(err.to_string().contains("classcraft.toml"));
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("classcraft.toml");

        let config = ConfigBuilder::new()
            .with_base_url("http://10.0.0.5:8000")
            .build();
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.server.base_url, "http://10.0.0.5:8000");
        assert_eq!(loaded.server.process_path, "process/");
    }
}
