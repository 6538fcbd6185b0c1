use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pacing::PacingPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub wassenger: WassengerConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WassengerConfig {
    pub api_token: SecretString,
    pub base_url: String,
    /// Group WID the handover notifications broadcast to.
    pub group_id: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub webhook_port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Hard cap on the turns any downstream decision may see.
    pub history_window: usize,
    /// Shorter rolling window given to the intent classifier.
    pub classifier_window: usize,
    pub max_chunks: usize,
    pub inter_chunk_delay_ms: u64,
    pub fetch_retry_delay_ms: u64,
    pub fetch_max_attempts: u32,
    pub min_analysis_reply_chars: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub wassenger_api_token: Option<String>,
    pub wassenger_group_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://coco.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            wassenger: WassengerConfig {
                api_token: String::new().into(),
                base_url: "https://api.wassenger.com".to_string(),
                group_id: String::new(),
            },
            llm: LlmConfig {
                provider: LlmProvider::Anthropic,
                api_key: None,
                base_url: None,
                model: "claude-3-7-sonnet-20250219".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                webhook_port: 5000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            pipeline: PipelineConfig {
                history_window: 10,
                classifier_window: 5,
                max_chunks: 3,
                inter_chunk_delay_ms: 1500,
                fetch_retry_delay_ms: 2000,
                fetch_max_attempts: 2,
                min_analysis_reply_chars: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl PipelineConfig {
    pub fn pacing_policy(&self) -> PacingPolicy {
        PacingPolicy {
            max_chunks: self.max_chunks,
            inter_chunk_delay: Duration::from_millis(self.inter_chunk_delay_ms),
            fetch_retry_delay: Duration::from_millis(self.fetch_retry_delay_ms),
            fetch_max_attempts: self.fetch_max_attempts,
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected anthropic|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("coco.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(wassenger) = patch.wassenger {
            if let Some(api_token_value) = wassenger.api_token {
                self.wassenger.api_token = secret_value(api_token_value);
            }
            if let Some(base_url) = wassenger.base_url {
                self.wassenger.base_url = base_url;
            }
            if let Some(group_id) = wassenger.group_id {
                self.wassenger.group_id = group_id;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(webhook_port) = server.webhook_port {
                self.server.webhook_port = webhook_port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(history_window) = pipeline.history_window {
                self.pipeline.history_window = history_window;
            }
            if let Some(classifier_window) = pipeline.classifier_window {
                self.pipeline.classifier_window = classifier_window;
            }
            if let Some(max_chunks) = pipeline.max_chunks {
                self.pipeline.max_chunks = max_chunks;
            }
            if let Some(inter_chunk_delay_ms) = pipeline.inter_chunk_delay_ms {
                self.pipeline.inter_chunk_delay_ms = inter_chunk_delay_ms;
            }
            if let Some(fetch_retry_delay_ms) = pipeline.fetch_retry_delay_ms {
                self.pipeline.fetch_retry_delay_ms = fetch_retry_delay_ms;
            }
            if let Some(fetch_max_attempts) = pipeline.fetch_max_attempts {
                self.pipeline.fetch_max_attempts = fetch_max_attempts;
            }
            if let Some(min_analysis_reply_chars) = pipeline.min_analysis_reply_chars {
                self.pipeline.min_analysis_reply_chars = min_analysis_reply_chars;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COCO_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("COCO_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("COCO_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COCO_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("COCO_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COCO_WASSENGER_API_TOKEN") {
            self.wassenger.api_token = secret_value(value);
        }
        if let Some(value) = read_env("COCO_WASSENGER_BASE_URL") {
            self.wassenger.base_url = value;
        }
        if let Some(value) = read_env("COCO_WASSENGER_GROUP_ID") {
            self.wassenger.group_id = value;
        }

        if let Some(value) = read_env("COCO_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("COCO_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("COCO_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("COCO_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("COCO_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("COCO_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("COCO_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("COCO_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("COCO_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("COCO_SERVER_WEBHOOK_PORT") {
            self.server.webhook_port = parse_u16("COCO_SERVER_WEBHOOK_PORT", &value)?;
        }
        if let Some(value) = read_env("COCO_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("COCO_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("COCO_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("COCO_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("COCO_PIPELINE_HISTORY_WINDOW") {
            self.pipeline.history_window =
                parse_u32("COCO_PIPELINE_HISTORY_WINDOW", &value)? as usize;
        }
        if let Some(value) = read_env("COCO_PIPELINE_MAX_CHUNKS") {
            self.pipeline.max_chunks = parse_u32("COCO_PIPELINE_MAX_CHUNKS", &value)? as usize;
        }
        if let Some(value) = read_env("COCO_PIPELINE_INTER_CHUNK_DELAY_MS") {
            self.pipeline.inter_chunk_delay_ms =
                parse_u64("COCO_PIPELINE_INTER_CHUNK_DELAY_MS", &value)?;
        }

        let log_level = read_env("COCO_LOGGING_LEVEL").or_else(|| read_env("COCO_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("COCO_LOGGING_FORMAT").or_else(|| read_env("COCO_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(api_token) = overrides.wassenger_api_token {
            self.wassenger.api_token = secret_value(api_token);
        }
        if let Some(group_id) = overrides.wassenger_group_id {
            self.wassenger.group_id = group_id;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_wassenger(&self.wassenger)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_pipeline(&self.pipeline)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("coco.toml"), PathBuf::from("config/coco.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_wassenger(wassenger: &WassengerConfig) -> Result<(), ConfigError> {
    if wassenger.api_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "wassenger.api_token is required. Get it from your Wassenger dashboard".to_string(),
        ));
    }

    if wassenger.group_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "wassenger.group_id is required (the team group WID handover notifications go to)"
                .to_string(),
        ));
    }

    if !wassenger.base_url.starts_with("http://") && !wassenger.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "wassenger.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::Anthropic | LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for anthropic/openai providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.webhook_port == 0 {
        return Err(ConfigError::Validation(
            "server.webhook_port must be greater than zero".to_string(),
        ));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.webhook_port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.webhook_port and server.health_check_port must differ".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if pipeline.history_window == 0 || pipeline.history_window > 50 {
        return Err(ConfigError::Validation(
            "pipeline.history_window must be in range 1..=50".to_string(),
        ));
    }

    if pipeline.classifier_window == 0 || pipeline.classifier_window > pipeline.history_window {
        return Err(ConfigError::Validation(
            "pipeline.classifier_window must be in range 1..=history_window".to_string(),
        ));
    }

    if pipeline.max_chunks == 0 {
        return Err(ConfigError::Validation(
            "pipeline.max_chunks must be greater than zero".to_string(),
        ));
    }

    if pipeline.fetch_max_attempts == 0 {
        return Err(ConfigError::Validation(
            "pipeline.fetch_max_attempts must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    wassenger: Option<WassengerPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    pipeline: Option<PipelinePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WassengerPatch {
    api_token: Option<String>,
    base_url: Option<String>,
    group_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    webhook_port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    history_window: Option<usize>,
    classifier_window: Option<usize>,
    max_chunks: Option<usize>,
    inter_chunk_delay_ms: Option<u64>,
    fetch_retry_delay_ms: Option<u64>,
    fetch_max_attempts: Option<u32>,
    min_analysis_reply_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
