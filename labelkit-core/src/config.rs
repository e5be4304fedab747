//! Configuration management for labelkit

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LabelError, Result};
use crate::poller::PollPolicy;

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    #[serde(default)]
    pub global_settings: HashMap<String, serde_json::Value>,
}

impl Config {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            server: ServerConfig::default(),
            polling: PollingConfig::default(),
            render: RenderConfig::default(),
            plugins: Vec::new(),
            global_settings: HashMap::new(),
        }
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("labelkit").join("config.json"))
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LabelError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| LabelError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| LabelError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)
            .map_err(|e| LabelError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration, failing on the first hard error
    pub fn validate(&self) -> Result<()> {
        let result = self.validate_comprehensive();
        match result.errors.first() {
            Some(first) => Err(LabelError::Config(format!(
                "{}: {}",
                first.field_path, first.message
            ))),
            None => Ok(()),
        }
    }

    /// Validate every section and collect all findings
    pub fn validate_comprehensive(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        let url_pattern = regex::Regex::new(r"^https?://[^\s/]+").ok();
        let url_ok = url_pattern
            .map(|re| re.is_match(&self.server.base_url))
            .unwrap_or(false);
        if !url_ok {
            result.errors.push(ValidationError {
                field_path: "server.base_url".to_string(),
                message: format!(
                    "'{}' is not an http(s) URL",
                    self.server.base_url
                ),
            });
        }

        if !self.server.api_prefix.is_empty() && !self.server.api_prefix.starts_with('/') {
            result.errors.push(ValidationError {
                field_path: "server.api_prefix".to_string(),
                message: "API prefix must start with '/'".to_string(),
            });
        }

        if self.server.request_timeout_secs == 0 {
            result.errors.push(ValidationError {
                field_path: "server.request_timeout_secs".to_string(),
                message: "Request timeout must be greater than zero".to_string(),
            });
        }

        if self.polling.interval_ms == 0 {
            result.errors.push(ValidationError {
                field_path: "polling.interval_ms".to_string(),
                message: "Polling interval must be greater than zero".to_string(),
            });
        } else if self.polling.interval_ms < 100 {
            result.warnings.push(ValidationWarning {
                field_path: "polling.interval_ms".to_string(),
                message: format!(
                    "Polling every {}ms may hit server rate limits",
                    self.polling.interval_ms
                ),
            });
        }

        if self.polling.max_attempts == Some(0) {
            result.errors.push(ValidationError {
                field_path: "polling.max_attempts".to_string(),
                message: "Attempt cap must be greater than zero when set".to_string(),
            });
        }

        if self.render.trigger_timeout_secs == 0 {
            result.errors.push(ValidationError {
                field_path: "render.trigger_timeout_secs".to_string(),
                message: "Render timeout must be greater than zero".to_string(),
            });
        }

        if self.render.plugin_init_timeout_secs == 0 {
            result.errors.push(ValidationError {
                field_path: "render.plugin_init_timeout_secs".to_string(),
                message: "Plugin initialisation timeout must be greater than zero".to_string(),
            });
        }

        for plugin in &self.plugins {
            if let Err(e) = plugin.validate() {
                result.errors.push(ValidationError {
                    field_path: format!("plugins.{}", plugin.name),
                    message: e.to_string(),
                });
            }
        }

        let names: std::collections::HashSet<_> = self.plugins.iter().map(|p| &p.name).collect();
        for plugin in &self.plugins {
            for dep in &plugin.dependencies {
                if !names.contains(dep) {
                    result.errors.push(ValidationError {
                        field_path: format!("plugins.{}.dependencies", plugin.name),
                        message: format!(
                            "Plugin '{}' depends on missing plugin '{}'",
                            plugin.name, dep
                        ),
                    });
                }
            }
        }

        result.is_valid = result.errors.is_empty();
        result
    }

    /// Apply environment variable overrides
    pub fn apply_environment_overrides(&mut self, env: &HashMap<String, String>) -> Result<()> {
        for (key, value) in env {
            match key.as_str() {
                "LABELKIT_SERVER_URL" => self.server.base_url = value.clone(),
                "LABELKIT_API_PREFIX" => self.server.api_prefix = value.clone(),
                "LABELKIT_API_TOKEN" => self.server.token = Some(value.clone()),
                "LABELKIT_POLL_INTERVAL_MS" => {
                    self.polling.interval_ms = value.parse().map_err(|_| {
                        LabelError::Config(format!(
                            "Invalid polling interval in environment variable: {}",
                            value
                        ))
                    })?;
                }
                "LABELKIT_POLL_MAX_ATTEMPTS" => {
                    self.polling.max_attempts = if value.is_empty() || value == "none" {
                        None
                    } else {
                        Some(value.parse().map_err(|_| {
                            LabelError::Config(format!(
                                "Invalid attempt cap in environment variable: {}",
                                value
                            ))
                        })?)
                    };
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_process_environment(&mut self) -> Result<()> {
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("LABELKIT_"))
            .collect();
        self.apply_environment_overrides(&env)
    }

    /// Apply CLI argument overrides
    pub fn apply_cli_overrides(
        &mut self,
        overrides: &HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        for (key, value) in overrides {
            match (key.as_str(), value) {
                ("server.base_url", serde_json::Value::String(url)) => {
                    self.server.base_url = url.clone();
                }
                ("server.token", serde_json::Value::String(token)) => {
                    self.server.token = Some(token.clone());
                }
                ("polling.interval_ms", serde_json::Value::Number(n)) => {
                    if let Some(ms) = n.as_u64() {
                        self.polling.interval_ms = ms;
                    }
                }
                ("render.default_editor", serde_json::Value::String(key)) => {
                    self.render.default_editor = key.clone();
                }
                ("render.default_preview", serde_json::Value::String(key)) => {
                    self.render.default_preview = key.clone();
                }
                (key, value) if key.starts_with("global.") => {
                    let setting = key.trim_start_matches("global.");
                    self.global_settings
                        .insert(setting.to_string(), value.clone());
                }
                _ => {
                    tracing::debug!("Ignoring unknown CLI override: {}", key);
                }
            }
        }
        Ok(())
    }

    /// Get plugin configuration by name
    pub fn get_plugin_config(&self, name: &str) -> Option<&PluginConfig> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Get enabled plugins
    pub fn get_enabled_plugins(&self) -> Vec<&PluginConfig> {
        self.plugins.iter().filter(|p| p.enabled).collect()
    }

    /// Whether a plugin may be loaded; unlisted plugins are enabled
    pub fn is_plugin_enabled(&self, name: &str) -> bool {
        self.get_plugin_config(name).map(|p| p.enabled).unwrap_or(true)
    }

    /// Get a typed global setting
    pub fn get_global_setting<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.global_settings
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Poll policy for the standalone job poller
    pub fn watch_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.polling.interval_ms),
            max_attempts: None,
        }
    }

    /// Poll policy for the inline wait inside a preview run
    pub fn inline_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.polling.interval_ms),
            max_attempts: self.polling.max_attempts,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection settings for the REST server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
    pub api_prefix: String,
    pub token: Option<String>,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_prefix: "/api".to_string(),
            token: None,
            request_timeout_secs: 60,
        }
    }
}

/// Data output polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Cap for the inline wait of a preview run; `None` polls until the
    /// server reports a terminal state.
    pub max_attempts: Option<u32>,
    pub dismiss_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_attempts: Some(120),
            dismiss_delay_ms: 2000,
        }
    }
}

/// Preview rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub trigger_timeout_secs: u64,
    pub default_editor: String,
    pub default_preview: String,
    /// Time a bridged plugin panel gets to register its handlers
    #[serde(default = "default_plugin_init_timeout_secs")]
    pub plugin_init_timeout_secs: u64,
}

fn default_plugin_init_timeout_secs() -> u64 {
    30
}

impl RenderConfig {
    pub fn trigger_timeout(&self) -> Duration {
        Duration::from_secs(self.trigger_timeout_secs)
    }

    pub fn plugin_init_timeout(&self) -> Duration {
        Duration::from_secs(self.plugin_init_timeout_secs)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            trigger_timeout_secs: 30,
            default_editor: "code".to_string(),
            default_preview: "pdf-preview".to_string(),
            plugin_init_timeout_secs: default_plugin_init_timeout_secs(),
        }
    }
}

/// Plugin-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl PluginConfig {
    /// Create an enabled plugin configuration
    pub fn new(name: String) -> Self {
        Self {
            name,
            enabled: true,
            dependencies: Vec::new(),
            config: HashMap::new(),
        }
    }

    /// Get a typed plugin setting
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Validate plugin configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LabelError::Config("Plugin name cannot be empty".to_string()));
        }
        if self.dependencies.contains(&self.name) {
            return Err(LabelError::Config(format!(
                "Plugin '{}' cannot depend on itself",
                self.name
            )));
        }
        Ok(())
    }
}

/// Outcome of a comprehensive validation pass
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field_path: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field_path: String,
    pub message: String,
}
