//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. Environment variables
//! 2. `inbox-gateway.toml`
//! 3. Defaults
//!
//! `${VAR_NAME}` placeholders inside the TOML file are replaced with the
//! value of the environment variable (or an empty string when unset).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::adapter::ChannelCredentials;
use crate::types::Channel;
use crate::{Error, Result};

/// Default config file name looked up by [`Config::load`]
pub const CONFIG_FILE: &str = "inbox-gateway.toml";

/// Main configuration for inbox-gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub http: HttpConfig,

    /// WhatsApp via Twilio (disabled when absent)
    pub whatsapp: Option<WhatsAppConfig>,

    /// Instagram via Meta Graph API (disabled when absent)
    pub instagram: Option<InstagramConfig>,

    /// Static tenant mapping
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,

    /// Per-tenant channel credentials
    #[serde(default)]
    pub channel_configs: Vec<ChannelConfigEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Outbound HTTP client settings shared by the adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: String,

    /// Business WhatsApp number, used for direction inference
    #[serde(default)]
    pub phone_number: Option<String>,

    #[serde(default = "default_twilio_base_url")]
    pub api_base_url: String,

    /// Check `X-Twilio-Signature` on incoming webhooks
    #[serde(default)]
    pub validate_signature: bool,

    /// Public URL Twilio posts to (needed for signature validation)
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default)]
    pub verify_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstagramConfig {
    pub access_token: String,

    /// Business IG account id, used for direction inference
    #[serde(default)]
    pub business_account_id: Option<String>,

    /// Token for the GET subscription handshake
    #[serde(default)]
    pub verify_token: Option<String>,

    /// App secret for `X-Hub-Signature-256` validation
    #[serde(default)]
    pub app_secret: Option<String>,

    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    #[serde(default = "default_graph_api_version")]
    pub api_version: String,
}

/// One row of the static tenant mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub channel: Channel,
    /// Business account id, page id, or contact identifier
    pub identifier: String,
    pub clinic_id: String,
    #[serde(default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub channel_config_id: Option<String>,
}

/// Credentials registered under a channel config id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfigEntry {
    pub id: String,
    #[serde(flatten)]
    pub credentials: ChannelCredentials,
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "data/inbox-gateway.db".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

pub fn default_twilio_base_url() -> String {
    "https://api.twilio.com".to_string()
}

pub fn default_graph_base_url() -> String {
    "https://graph.instagram.com".to_string()
}

pub fn default_graph_api_version() -> String {
    "v21.0".to_string()
}

impl Config {
    /// Replace `${VAR_NAME}` with the environment variable's value
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml_str(&toml_content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load from `./inbox-gateway.toml` when present, otherwise from the environment
    pub fn load() -> Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override settings with environment variables
    fn apply_env_overrides(&mut self) {
        if let Some(port) = env_var("SERVER_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = env_var("DB_PATH") {
            self.storage.db_path = path;
        }
        if let Some(secs) = env_var("HTTP_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.http.timeout_secs = secs;
        }

        // WhatsApp: env credentials enable the channel even without a TOML section
        if self.whatsapp.is_none() {
            if let (Some(account_sid), Some(auth_token)) =
                (env_var("TWILIO_ACCOUNT_SID"), env_var("TWILIO_AUTH_TOKEN"))
            {
                self.whatsapp = Some(WhatsAppConfig {
                    account_sid,
                    auth_token,
                    phone_number: None,
                    api_base_url: default_twilio_base_url(),
                    validate_signature: false,
                    webhook_url: None,
                    verify_token: None,
                });
            }
        }
        if let Some(whatsapp) = self.whatsapp.as_mut() {
            if let Some(sid) = env_var("TWILIO_ACCOUNT_SID") {
                whatsapp.account_sid = sid;
            }
            if let Some(token) = env_var("TWILIO_AUTH_TOKEN") {
                whatsapp.auth_token = token;
            }
            if let Some(number) = env_var("TWILIO_WHATSAPP_NUMBER") {
                whatsapp.phone_number = Some(number);
            }
            if let Some(url) = env_var("TWILIO_API_BASE_URL") {
                whatsapp.api_base_url = url;
            }
            if let Some(url) = env_var("TWILIO_WEBHOOK_URL") {
                whatsapp.webhook_url = Some(url);
            }
            if let Some(flag) = env_var("TWILIO_VALIDATE_SIGNATURE") {
                whatsapp.validate_signature = flag.to_lowercase() != "false";
            }
        }

        if self.instagram.is_none() {
            if let Some(access_token) = env_var("INSTAGRAM_ACCESS_TOKEN") {
                self.instagram = Some(InstagramConfig {
                    access_token,
                    business_account_id: None,
                    verify_token: None,
                    app_secret: None,
                    graph_base_url: default_graph_base_url(),
                    api_version: default_graph_api_version(),
                });
            }
        }
        if let Some(instagram) = self.instagram.as_mut() {
            if let Some(token) = env_var("INSTAGRAM_ACCESS_TOKEN") {
                instagram.access_token = token;
            }
            if let Some(id) = env_var("INSTAGRAM_BUSINESS_ACCOUNT_ID") {
                instagram.business_account_id = Some(id);
            }
            if let Some(token) = env_var("INSTAGRAM_VERIFY_TOKEN") {
                instagram.verify_token = Some(token);
            }
            if let Some(secret) = env_var("INSTAGRAM_APP_SECRET") {
                instagram.app_secret = Some(secret);
            }
            if let Some(url) = env_var("INSTAGRAM_GRAPH_BASE_URL") {
                instagram.graph_base_url = url;
            }
        }
    }

    /// Reject configurations that cannot work at runtime
    pub fn validate(&self) -> Result<()> {
        if let Some(whatsapp) = &self.whatsapp {
            if whatsapp.validate_signature && whatsapp.webhook_url.is_none() {
                return Err(Error::Config(
                    "whatsapp.validate_signature requires whatsapp.webhook_url".to_string(),
                ));
            }
        }

        for tenant in &self.tenants {
            if let Some(cfg_id) = &tenant.channel_config_id {
                if !self.channel_configs.iter().any(|c| &c.id == cfg_id) {
                    return Err(Error::Config(format!(
                        "tenant {} references unknown channel config {}",
                        tenant.clinic_id, cfg_id
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
