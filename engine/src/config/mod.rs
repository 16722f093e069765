//! Configuration management
//!
//! This module handles loading, validation, and management of the nudge configuration.
//! Configuration is stored in TOML format at ~/.nudge/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, user timezone, data directory
//! - **llm**: Extraction provider settings (Gemini)
//! - **whatsapp**: Cloud API endpoint and phone number id
//! - **calendar**: Google Calendar endpoints and limits
//! - **server**: Webhook listener address and admin surface
//! - **conversation**: Conversation policy knobs
//! - **network**: Outbound HTTP timeouts
//!
//! Secrets (API keys, tokens) never live in this file; see [`crate::secrets`].
//!
//! # Examples
//!
//! ```no_run
//! use nudge_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Timezone: {}", config.core.timezone);
//! println!("Model: {}", config.llm.gemini.model);
//! # Ok(())
//! # }
//! ```

use chrono_tz::Tz;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// WhatsApp Cloud API configuration
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Calendar backend configuration
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Conversation policy
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Outbound network settings
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// IANA timezone all date math is performed in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Provider used for extraction (gemini)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Gemini provider settings
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL for Gemini API
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling mass
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Output cap for reminder extraction
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Output cap for edit-intent extraction
    #[serde(default = "default_edit_max_output_tokens")]
    pub edit_max_output_tokens: u32,
    // Note: API key stored in keychain or NUDGE_GEMINI_API_KEY, not in config
}

/// WhatsApp Cloud API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Graph API base URL including version
    #[serde(default = "default_whatsapp_base_url")]
    pub api_base_url: String,

    /// Business phone number id messages are sent from
    #[serde(default)]
    pub phone_number_id: String,
    // Note: access and verify tokens stored in keychain, not in config
}

/// Calendar backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Enable calendar-backed features
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Calendar REST base URL
    #[serde(default = "default_calendar_base_url")]
    pub base_url: String,

    /// OAuth2 token endpoint used for refresh
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Calendar to operate on
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// Upper bound on events fetched by any single listing query
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Expose the /admin routes. Off unless asked for; a non-loopback bind
    /// also needs an admin token.
    #[serde(default)]
    pub admin_enabled: bool,
}

/// Conversation policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// How far ahead "delete all reminders" reaches
    #[serde(default = "default_delete_all_window_days")]
    pub delete_all_window_days: u32,
}

/// Outbound network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Timeout applied to every outbound HTTP request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl NetworkConfig {
    /// Timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_timezone() -> String {
    "Asia/Karachi".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.nudge")
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.95
}

fn default_max_output_tokens() -> u32 {
    500
}

fn default_edit_max_output_tokens() -> u32 {
    300
}

fn default_whatsapp_base_url() -> String {
    "https://graph.facebook.com/v22.0".to_string()
}

fn default_calendar_base_url() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_max_results() -> u32 {
    100
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_delete_all_window_days() -> u32 {
    30
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
            edit_max_output_tokens: default_edit_max_output_tokens(),
        }
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_whatsapp_base_url(),
            phone_number_id: String::new(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_calendar_base_url(),
            token_url: default_token_url(),
            calendar_id: default_calendar_id(),
            max_results: default_max_results(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            admin_enabled: false,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            delete_all_window_days: default_delete_all_window_days(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.nudge/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails (unknown timezone, invalid log level)
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.nudge/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".nudge").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                timezone: default_timezone(),
                data_dir: default_data_dir(),
            },
            llm: LLMConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            calendar: CalendarConfig::default(),
            server: ServerConfig::default(),
            conversation: ConversationConfig::default(),
            network: NetworkConfig::default(),
        }
    }

    /// Parsed user timezone
    ///
    /// Validated on load, so this only fails for hand-built configs.
    pub fn timezone(&self) -> Result<Tz, EngineError> {
        parse_timezone(&self.core.timezone)
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level, provider and timezone
    /// - Validates numeric limits
    /// - Expands ~ in the data directory and creates it
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["gemini"];
        if !valid_providers.contains(&self.llm.provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid provider '{}'. Must be one of: {}",
                self.llm.provider,
                valid_providers.join(", ")
            )));
        }

        parse_timezone(&self.core.timezone)?;

        if !(0.0..=2.0).contains(&self.llm.gemini.temperature) {
            return Err(EngineError::Config(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.llm.gemini.top_p) {
            return Err(EngineError::Config(
                "top_p must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.conversation.delete_all_window_days == 0 {
            return Err(EngineError::Config(
                "delete_all_window_days must be at least 1".to_string(),
            ));
        }
        if self.network.timeout_secs == 0 {
            return Err(EngineError::Config(
                "timeout_secs must be at least 1".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, EngineError> {
    name.parse::<Tz>()
        .map_err(|_| EngineError::InvalidTimezone(name.to_string()))
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
