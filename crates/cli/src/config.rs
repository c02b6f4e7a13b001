//! Configuration file layout.

use std::{fmt, path::PathBuf};

use clap::ValueEnum;
use clmock_execution::{EngineApiEndpoint, ExecutionConfig, engine_api::jwt::parse_secret};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

pub use clmock_consensus::MockerConfig;
pub use crate::file::load_config;
use crate::{args::relative_to, error::Error};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub mocker: MockerConfig,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
}

impl Config {
    /// Apply environment variable overrides for the mocker settings.
    ///
    /// Supported variables:
    /// - CLMOCK_TERMINAL_TOTAL_DIFFICULTY
    /// - CLMOCK_BLOCK_PRODUCTION_PERIOD_MS
    /// - CLMOCK_SEED
    pub fn apply_env_overrides(&mut self) {
        fn get(key: &str) -> Option<String> {
            std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        if let Some(v) = get("CLMOCK_TERMINAL_TOTAL_DIFFICULTY") {
            match v.parse() {
                Ok(ttd) => self.mocker.terminal_total_difficulty = ttd,
                Err(_) => warn!(value = %v, "Invalid CLMOCK_TERMINAL_TOTAL_DIFFICULTY, ignoring"),
            }
        }
        if let Some(v) = get("CLMOCK_BLOCK_PRODUCTION_PERIOD_MS") {
            match v.parse::<u64>() {
                Ok(ms) => self.mocker.block_production_period_ms = ms.max(1),
                Err(_) => warn!(value = %v, "Invalid CLMOCK_BLOCK_PRODUCTION_PERIOD_MS, ignoring"),
            }
        }
        if let Some(v) = get("CLMOCK_SEED") {
            match v.parse::<u64>() {
                Ok(seed) => self.mocker.seed = Some(seed),
                Err(_) => warn!(value = %v, "Invalid CLMOCK_SEED, ignoring"),
            }
        }
    }
}

/// One execution client to drive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub name: String,
    /// Engine API over HTTP, e.g. http://localhost:8551
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_http_url: Option<Url>,
    /// Engine API over IPC, e.g. /path/to/geth.ipc. With both set the client alternates
    /// between them after every block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_ipc_path: Option<PathBuf>,
    /// Eth1 JSON-RPC URL for non-engine RPCs, e.g. http://localhost:8545
    pub eth1_rpc_url: Url,
    /// Hex-encoded JWT secret for the HTTP Engine API, relative to the configuration file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Resolves file paths against `config_file` and reads the JWT secret.
    pub fn to_execution_config(&self, config_file: &std::path::Path) -> Result<ExecutionConfig, Error> {
        let mut endpoints = Vec::with_capacity(2);
        if let Some(url) = &self.engine_http_url {
            endpoints.push(EngineApiEndpoint::Http(url.clone()));
        }
        if let Some(path) = &self.engine_ipc_path {
            endpoints.push(EngineApiEndpoint::Ipc(relative_to(config_file, path)));
        }
        if endpoints.is_empty() {
            return Err(Error::NoEngineEndpoint(self.name.clone()));
        }

        let jwt_secret = match &self.jwt_secret_path {
            Some(path) => {
                let path = relative_to(config_file, path);
                let contents =
                    std::fs::read_to_string(&path).map_err(|_| Error::OpenFile(path.clone()))?;
                parse_secret(&contents)
                    .map_err(|e| Error::JwtSecret { path, reason: e.to_string() })?
            }
            None if self.engine_http_url.is_some() => {
                return Err(Error::MissingJwtSecret(self.name.clone()));
            }
            // IPC is not authenticated.
            None => [0u8; 32],
        };

        Ok(ExecutionConfig {
            name: self.name.clone(),
            engine_api_endpoints: endpoints,
            eth1_rpc_url: self.eth1_rpc_url.clone(),
            jwt_secret,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plaintext,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Plaintext => write!(f, "plaintext"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Tokio runtime flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "snake_case")]
pub enum RuntimeConfig {
    SingleThreaded,
    /// `worker_threads = 0` uses one worker per core.
    MultiThreaded { worker_threads: usize },
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig::MultiThreaded { worker_threads: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipc_only_client_needs_no_secret() {
        let client = ClientConfig {
            name: "geth".into(),
            engine_http_url: None,
            engine_ipc_path: Some("geth.ipc".into()),
            eth1_rpc_url: "http://localhost:8545".parse().unwrap(),
            jwt_secret_path: None,
        };

        let config = client.to_execution_config(std::path::Path::new("/data/config.toml")).unwrap();
        assert_eq!(
            config.engine_api_endpoints,
            vec![EngineApiEndpoint::Ipc("/data/geth.ipc".into())]
        );
    }

    #[test]
    fn http_client_without_secret_is_rejected() {
        let client = ClientConfig {
            name: "reth".into(),
            engine_http_url: Some("http://localhost:8551".parse().unwrap()),
            engine_ipc_path: None,
            eth1_rpc_url: "http://localhost:8545".parse().unwrap(),
            jwt_secret_path: None,
        };

        let err = client.to_execution_config(std::path::Path::new("config.toml")).unwrap_err();
        assert!(matches!(err, Error::MissingJwtSecret(name) if name == "reth"));
    }

    #[test]
    fn client_without_engine_endpoint_is_rejected() {
        let client = ClientConfig {
            name: "none".into(),
            engine_http_url: None,
            engine_ipc_path: None,
            eth1_rpc_url: "http://localhost:8545".parse().unwrap(),
            jwt_secret_path: None,
        };

        assert!(matches!(
            client.to_execution_config(std::path::Path::new("config.toml")),
            Err(Error::NoEngineEndpoint(_))
        ));
    }
}
