use crate::types::{AppError, AppResult};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub stream: StreamConfig,
    pub agents: AgentServiceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamBackend {
    Redis,
    Memory,
}

impl FromStr for StreamBackend {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StreamBackend::Redis),
            "memory" | "in-memory" => Ok(StreamBackend::Memory),
            other => Err(AppError::Configuration(format!(
                "STREAM_BACKEND must be 'redis' or 'memory', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    pub backend: StreamBackend,
    pub connection_string: Option<String>,
    pub stream_name: Option<String>,
    pub consumer_group: String,
    pub consumer_name: String,
    pub block_ms: u64,
    /// Pending entries idle this long are reclaimed from other consumers.
    pub claim_idle_ms: u64,
    pub producer_interval_secs: u64,
}

impl StreamConfig {
    /// Checks that the selected backend has everything it needs to connect.
    pub fn validate(&self) -> AppResult<()> {
        if self.backend == StreamBackend::Memory {
            return Ok(());
        }
        if self.connection_string.as_deref().map_or(true, str::is_empty) {
            return Err(AppError::Configuration(
                "EVENT_STREAM_CONNECTION_STRING is missing".to_string(),
            ));
        }
        if self.stream_name.as_deref().map_or(true, str::is_empty) {
            return Err(AppError::Configuration(
                "EVENT_STREAM_NAME is missing".to_string(),
            ));
        }
        Ok(())
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_millis(self.block_ms)
    }

    pub fn claim_idle(&self) -> Duration {
        Duration::from_millis(self.claim_idle_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentBackend {
    Chat,
    Assistants,
}

impl FromStr for AgentBackend {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(AgentBackend::Chat),
            "assistants" | "agents" => Ok(AgentBackend::Assistants),
            other => Err(AppError::Configuration(format!(
                "AGENT_BACKEND must be 'chat' or 'assistants', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentServiceConfig {
    pub backend: AgentBackend,
    pub provider: String,
    pub api_base: Option<String>,
    pub api_key: String,
    pub api_version: Option<String>,
    pub model: String,
    pub search_connection_id: Option<String>,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    pub team_leader_review: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    pub log_dir: Option<String>,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            server: ServerConfig {
                port: parse_var("PORT", or("PORT", "8003"))?,
                host: or("HOST", "0.0.0.0"),
                cors_allowed_origins: or("ALLOWED_ORIGINS", "http://localhost:3000")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            stream: StreamConfig {
                backend: or("STREAM_BACKEND", "redis").parse()?,
                connection_string: var("EVENT_STREAM_CONNECTION_STRING"),
                stream_name: var("EVENT_STREAM_NAME"),
                consumer_group: or("CONSUMER_GROUP", "$Default"),
                consumer_name: var("CONSUMER_NAME").unwrap_or_else(|| {
                    format!("consumer-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
                }),
                block_ms: parse_var("STREAM_BLOCK_MS", or("STREAM_BLOCK_MS", "5000"))?,
                claim_idle_ms: parse_var("STREAM_CLAIM_IDLE_MS", or("STREAM_CLAIM_IDLE_MS", "30000"))?,
                producer_interval_secs: parse_var(
                    "PRODUCER_INTERVAL_SECS",
                    or("PRODUCER_INTERVAL_SECS", "5"),
                )?,
            },
            agents: AgentServiceConfig {
                backend: or("AGENT_BACKEND", "chat").parse()?,
                provider: or("LLM_PROVIDER", "openai"),
                api_base: var("AGENT_API_BASE"),
                api_key: var("AGENT_API_KEY")
                    .or_else(|| var("OPENAI_API_KEY"))
                    .unwrap_or_default(),
                api_version: var("AGENT_API_VERSION"),
                model: or("MODEL_DEPLOYMENT_NAME", "gpt-4o"),
                search_connection_id: var("WEB_SEARCH_CONNECTION_ID"),
                poll_interval_ms: parse_var(
                    "AGENT_POLL_INTERVAL_MS",
                    or("AGENT_POLL_INTERVAL_MS", "1000"),
                )?,
                max_polls: parse_var("AGENT_MAX_POLLS", or("AGENT_MAX_POLLS", "60"))?,
                team_leader_review: parse_var(
                    "TEAM_LEADER_REVIEW",
                    or("TEAM_LEADER_REVIEW", "false"),
                )?,
            },
            logging: LoggingConfig {
                filter: var("RUST_LOG")
                    .or_else(|| var("LOG_LEVEL"))
                    .unwrap_or_else(|| "oxidized_pharma=info,tower_http=info".to_string()),
                log_dir: var("LOG_DIR"),
            },
        })
    }
}

fn parse_var<T>(key: &str, raw: String) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Configuration(format!("{} has invalid value '{}': {}", key, raw, e)))
}
