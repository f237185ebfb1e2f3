use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, WayfarerError};

/// Top-level configuration for the Wayfarer service.
///
/// Loaded from `~/.wayfarer/config.toml` by default. Each section corresponds
/// to one subsystem; missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WayfarerConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl WayfarerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WayfarerConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| WayfarerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the offer catalog database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.wayfarer/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Conversational search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum prompt length in characters.
    pub max_message_length: usize,
    /// Offers returned when the caller does not pass a limit.
    pub default_limit: usize,
    /// Largest accepted limit.
    pub max_limit: usize,
    /// Idle minutes before a conversation is forgotten.
    pub session_ttl_minutes: u64,
    /// Seconds between sweeps of idle conversations.
    pub sweep_interval_secs: u64,
    /// Number of most recent offers mined for destination vocabulary.
    pub vocabulary_size: usize,
    /// Minimum similarity for a fuzzy destination match (0.0 to 1.0).
    pub fuzzy_threshold: f64,
    /// Multiplier applied to the budget ceiling when relaxing.
    pub budget_relax_factor: f64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            default_limit: 10,
            max_limit: 50,
            session_ttl_minutes: 30,
            sweep_interval_secs: 60,
            vocabulary_size: 500,
            fuzzy_threshold: 0.6,
            budget_relax_factor: 1.5,
        }
    }
}

/// Language-understanding service settings (OpenAI-compatible chat API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// When false, every turn uses the heuristic extractor.
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable that holds the API key.
    pub api_key_env: String,
    pub timeout_ms: u64,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout_ms: 3000,
            temperature: 0.2,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable.
    ///
    /// Empty values count as missing.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// Offer catalog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Upper bound for a single catalog query.
    pub query_timeout_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = WayfarerConfig::default();
        assert_eq!(config.general.data_dir, "~/.wayfarer/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.chat.default_limit, 10);
        assert_eq!(config.chat.max_limit, 50);
        assert_eq!(config.chat.vocabulary_size, 500);
        assert!((config.chat.fuzzy_threshold - 0.6).abs() < f64::EPSILON);
        assert!((config.chat.budget_relax_factor - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.llm.model, "llama-3.1-8b-instant");
        assert_eq!(config.catalog.query_timeout_ms, 5000);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"

[server]
host = "0.0.0.0"
port = 8080

[chat]
default_limit = 5
session_ttl_minutes = 10

[llm]
enabled = false
model = "llama-3.3-70b-versatile"
"#;
        let file = create_temp_config(content);
        let config = WayfarerConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.chat.default_limit, 5);
        assert_eq!(config.chat.session_ttl_minutes, 10);
        // Unspecified keys in a present section still default
        assert_eq!(config.chat.max_limit, 50);
        assert!(!config.llm.enabled);
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(config.llm.api_key_env, "GROQ_API_KEY");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = WayfarerConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.catalog.query_timeout_ms, 5000);
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[chat\nmax_limit = ");
        let err = WayfarerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, WayfarerError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = WayfarerConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.wayfarer/data");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = WayfarerConfig::default();
        config.server.port = 4100;
        config.chat.budget_relax_factor = 2.0;
        config.save(&path).unwrap();

        let reloaded = WayfarerConfig::load(&path).unwrap();
        assert_eq!(reloaded.server.port, 4100);
        assert!((reloaded.chat.budget_relax_factor - 2.0).abs() < f64::EPSILON);
        assert_eq!(reloaded.llm.base_url, config.llm.base_url);
    }

    #[test]
    fn test_api_key_missing_env() {
        let llm = LlmConfig {
            api_key_env: "WAYFARER_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        assert!(llm.api_key().is_none());
    }
}
