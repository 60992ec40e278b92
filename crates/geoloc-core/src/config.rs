//! geoloc Configuration Management
//!
//! Handles configuration from environment variables and TOML files,
//! with defaults matching the layout of the bundled `data/` directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Model artifacts and tagger hyperparameters
    pub models: ModelConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        self.validate()?;
        Ok(self)
    }

    /// Load the file named by `GEOLOC_CONFIG` if set, otherwise env only
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("GEOLOC_CONFIG") {
            Ok(path) => Self::from_file(path)?.with_env_override(),
            Err(_) => Self::from_env(),
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            self.server.port = parse_var("API_PORT", port)?;
        }

        // CORS origins from environment variable (comma-separated)
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Models
        if let Ok(dir) = std::env::var("GEOLOC_DATA_DIR") {
            self.models.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("TOOLKIT_MODEL_DIR") {
            self.models.toolkit_model_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("BILSTM_MODEL_DIR") {
            self.models.bilstm_dir = PathBuf::from(dir);
        }
        if let Ok(len) = std::env::var("BILSTM_MAX_SEQ_LEN") {
            self.models.max_seq_len = parse_var("BILSTM_MAX_SEQ_LEN", len)?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.json_format = match format.to_lowercase().as_str() {
                "json" => true,
                "text" | "pretty" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "LOG_FORMAT".to_string(),
                        value: format,
                    })
                }
            };
        }

        Ok(())
    }

    /// Reject settings that can never produce a working tagger
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.max_seq_len == 0 {
            return Err(ConfigError::InvalidValue {
                key: "models.max_seq_len".to_string(),
                value: "0".to_string(),
            });
        }
        if self.models.pad_idx == self.models.unk_idx {
            return Err(ConfigError::InvalidValue {
                key: "models.unk_idx".to_string(),
                value: self.models.unk_idx.to_string(),
            });
        }
        if self.models.pad_token == self.models.unk_token {
            return Err(ConfigError::InvalidValue {
                key: "models.unk_token".to_string(),
                value: self.models.unk_token.clone(),
            });
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins for CORS; `*` allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_body_size: 1024 * 1024, // 1MB
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Model artifact locations and BiLSTM-CRF hyperparameters
///
/// Relative artifact paths are resolved against `data_dir`; the BiLSTM
/// files are resolved against `data_dir/bilstm_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Root directory holding all model artifacts
    pub data_dir: PathBuf,

    /// Directory-based toolkit model
    pub toolkit_model_dir: PathBuf,

    /// Directory holding the tagger artifacts
    pub bilstm_dir: PathBuf,

    /// Token -> id mapping (JSON object)
    pub word2idx_file: PathBuf,

    /// Tag label -> id mapping (JSON object)
    pub tag2idx_file: PathBuf,

    /// Tagger weights (safetensors)
    pub weights_file: PathBuf,

    /// Word embedding dimension
    pub embed_dim: usize,

    /// Hidden units per LSTM direction
    pub lstm_units: usize,

    /// Stacked BiLSTM layers
    pub num_layers: usize,

    /// Dropout used during training (inert at inference)
    pub dropout: f32,

    /// Fixed encoded sequence length
    pub max_seq_len: usize,

    /// Padding token
    pub pad_token: String,

    /// Out-of-vocabulary token
    pub unk_token: String,

    /// Id reserved for the padding token
    pub pad_idx: u32,

    /// Id reserved for the out-of-vocabulary token
    pub unk_idx: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            toolkit_model_dir: PathBuf::from("ner_model_spacy"),
            bilstm_dir: PathBuf::from("BILSTM"),
            word2idx_file: PathBuf::from("ner_word2idx.json"),
            tag2idx_file: PathBuf::from("ner_tag2idx.json"),
            weights_file: PathBuf::from("best_bilstm_crf_location_ner_model.safetensors"),
            embed_dim: 150,
            lstm_units: 128,
            num_layers: 2,
            dropout: 0.35,
            max_seq_len: 100,
            pad_token: "<PAD>".to_string(),
            unk_token: "<UNK>".to_string(),
            pad_idx: 0,
            unk_idx: 1,
        }
    }
}

impl ModelConfig {
    /// Resolved toolkit model directory
    pub fn toolkit_model_path(&self) -> PathBuf {
        self.data_dir.join(&self.toolkit_model_dir)
    }

    /// Resolved tagger artifact directory
    pub fn bilstm_path(&self) -> PathBuf {
        self.data_dir.join(&self.bilstm_dir)
    }

    pub fn word2idx_path(&self) -> PathBuf {
        self.bilstm_path().join(&self.word2idx_file)
    }

    pub fn tag2idx_path(&self) -> PathBuf {
        self.bilstm_path().join(&self.tag2idx_file)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.bilstm_path().join(&self.weights_file)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.models.embed_dim, 150);
        assert_eq!(config.models.lstm_units, 128);
        assert_eq!(config.models.num_layers, 2);
        assert_eq!(config.models.max_seq_len, 100);
        assert_eq!(config.server.cors_origins, vec!["*".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_artifact_paths() {
        let models = ModelConfig::default();
        assert_eq!(
            models.word2idx_path(),
            PathBuf::from("data/BILSTM/ner_word2idx.json")
        );
        assert_eq!(
            models.toolkit_model_path(),
            PathBuf::from("data/ner_model_spacy")
        );
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 9100\n\n[models]\ndata_dir = \"/srv/models\"\nmax_seq_len = 64\n"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.models.max_seq_len, 64);
        assert_eq!(config.models.embed_dim, 150);
        assert_eq!(
            config.models.weights_path(),
            PathBuf::from("/srv/models/BILSTM/best_bilstm_crf_location_ner_model.safetensors")
        );
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/nonexistent/geoloc.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_length() {
        let mut config = AppConfig::default();
        config.models.max_seq_len = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_shared_reserved_ids() {
        let mut config = AppConfig::default();
        config.models.unk_idx = config.models.pad_idx;
        assert!(config.validate().is_err());
    }
}
