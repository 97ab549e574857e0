//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable consulted when `admin.password_hash` is unset
pub const ADMIN_PASSWORD_HASH_ENV: &str = "ADMIN_PASSWORD_HASH";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub enhancement: EnhancementConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Admin login configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    /// Hex encoded SHA-256 of the shared admin password
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_session_ttl() -> u64 {
    24 * 60 * 60
}

fn default_cookie_name() -> String {
    "studio_session".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            password_hash: None,
            session_ttl_secs: default_session_ttl(),
            cookie_name: default_cookie_name(),
        }
    }
}

/// Usage counter storage
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_path")]
    pub file_path: String,
}

fn default_stats_path() -> String {
    "stats.json".to_string()
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            file_path: default_stats_path(),
        }
    }
}

/// Remote image generation API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,
    #[serde(default = "default_generation_api_key")]
    pub api_key: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_edit_model")]
    pub edit_model: String,
    #[serde(default = "default_max_per_request")]
    pub max_per_request: u32,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Base URL of the usage counter service; usage is not reported when unset
    #[serde(default)]
    pub usage_base_url: Option<String>,
}

fn default_generation_base_url() -> String {
    "https://api.whomeai.com/v1".to_string()
}

fn default_generation_api_key() -> String {
    "sk-demo".to_string()
}

fn default_text_model() -> String {
    "nano-banana".to_string()
}

fn default_edit_model() -> String {
    "nano-banana-r2i".to_string()
}

fn default_max_per_request() -> u32 {
    4
}

fn default_batch_delay_ms() -> u64 {
    5000
}

fn default_timeout() -> u64 {
    120_000
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_base_url(),
            api_key: default_generation_api_key(),
            text_model: default_text_model(),
            edit_model: default_edit_model(),
            max_per_request: default_max_per_request(),
            batch_delay_ms: default_batch_delay_ms(),
            timeout_ms: default_timeout(),
            usage_base_url: None,
        }
    }
}

/// Prompt enhancement API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnhancementConfig {
    #[serde(default = "default_enhancement_base_url")]
    pub base_url: String,
    #[serde(default = "default_enhancement_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Backend endpoint handing out the key (e.g. `http://localhost:3000/api/gemini-key`)
    #[serde(default)]
    pub key_endpoint: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_enhancement_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_enhancement_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            base_url: default_enhancement_base_url(),
            model: default_enhancement_model(),
            temperature: default_temperature(),
            api_key_env: default_api_key_env(),
            key_endpoint: None,
            timeout_ms: default_timeout(),
        }
    }
}

impl EnhancementConfig {
    /// Read the enhancement key from the configured environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/studio.yaml")
    }

    /// Load settings from a YAML or TOML file (optional) plus environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let format = if path
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml")
        {
            FileFormat::Yaml
        } else {
            FileFormat::Toml
        };

        let mut config_builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("stats.file_path", default_stats_path())?
            .set_default("generation.base_url", default_generation_base_url())?
            .set_default("generation.max_per_request", i64::from(default_max_per_request()))?
            .set_default("generation.batch_delay_ms", default_batch_delay_ms() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?;

        if path.exists() {
            config_builder = config_builder.add_source(File::from(path).format(format));
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("IMAGE_STUDIO")
                .separator("__")
                .try_parsing(true),
        );

        let config = config_builder.build()?;
        let mut settings: Settings = config.try_deserialize()?;

        if settings.admin.password_hash.is_none() {
            settings.admin.password_hash = std::env::var(ADMIN_PASSWORD_HASH_ENV).ok();
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Failed to parse settings: {}",
                e
            )))
        })
    }

    /// Render the effective settings as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Failed to serialize settings: {}",
                e
            )))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.generation.base_url.trim().is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "Generation base URL cannot be empty".to_string(),
            )));
        }

        if self.generation.max_per_request == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Images per request must be at least 1".to_string(),
            )));
        }

        if !(0.0..=2.0).contains(&self.enhancement.temperature) {
            return Err(AppError::Config(config::ConfigError::Message(format!(
                "Enhancement temperature {} is out of range",
                self.enhancement.temperature
            ))));
        }

        Ok(())
    }
}
