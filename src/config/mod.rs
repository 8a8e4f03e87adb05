#[cfg(feature = "cli")]
pub mod cli;

use crate::utils::error::{RelayError, Result};
use crate::utils::validation::{
    validate_one_of, validate_positive_number, validate_range, validate_secret,
    validate_socket_addr, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const LOG_FORMATS: [&str; 2] = ["compact", "json"];
pub const LOG_SINKS: [&str; 2] = ["stdout", "stderr"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logger: LoggerConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_sink")]
    pub sink: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 對內監聽位址
    pub url: String,
    pub auth_token: String,
    /// 下游服務 URL
    pub server_url: String,
    pub forward_timeout_seconds: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub batch_deadline_seconds: Option<u64>,
    pub max_body_bytes: Option<usize>,
    pub cors_origins: Option<Vec<String>>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_log_sink() -> String {
    "stdout".to_string()
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            sink: default_log_sink(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("auth_token", &"<redacted>")
            .field("server_url", &self.server_url)
            .field("forward_timeout_seconds", &self.forward_timeout_seconds)
            .field("max_concurrency", &self.max_concurrency)
            .field("batch_deadline_seconds", &self.batch_deadline_seconds)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl ServerConfig {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_seconds.unwrap_or(10))
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or(64)
    }

    pub fn batch_deadline(&self) -> Duration {
        Duration::from_secs(self.batch_deadline_seconds.unwrap_or(30))
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes.unwrap_or(10 * 1024 * 1024)
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origins
            .clone()
            .unwrap_or_else(|| vec!["*".to_string()])
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RelayError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| RelayError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RELAY_AUTH_TOKEN})，找不到的變數保留原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let re = PLACEHOLDER.get_or_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_one_of("logger.format", &self.logger.format, &LOG_FORMATS)?;
        validate_one_of("logger.sink", &self.logger.sink, &LOG_SINKS)?;

        let server = &self.server;
        validate_socket_addr("server.url", &server.url)?;
        validate_url("server.server_url", &server.server_url)?;
        validate_secret("server.auth_token", &server.auth_token)?;

        validate_range(
            "server.max_concurrency",
            server.max_concurrency(),
            1,
            10_000,
        )?;
        validate_positive_number(
            "server.forward_timeout_seconds",
            server.forward_timeout().as_secs(),
            1,
        )?;
        validate_positive_number(
            "server.batch_deadline_seconds",
            server.batch_deadline().as_secs(),
            1,
        )?;
        validate_positive_number("server.max_body_bytes", server.max_body_bytes() as u64, 1)?;

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
