use std::path::Path;

use clap::Parser;
use tracing::info;
use url::Url;

use crate::{
    config::{ClientConfig, Config, LoggingConfig},
    error::Error,
    file::{save_config, save_jwt_secret},
};

const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:8551";
const DEFAULT_ETH1_RPC_URL: &str = "http://127.0.0.1:8545";

#[derive(Parser, Debug, Clone, Default, PartialEq)]
pub struct InitCmd {
    /// Overwrite an existing configuration and JWT secret
    #[clap(long)]
    pub overwrite: bool,
}

impl InitCmd {
    /// Writes a fresh JWT secret and a configuration with one local client using it.
    pub fn run(
        &self,
        config_file: &Path,
        jwt_secret_file: &Path,
        logging: LoggingConfig,
    ) -> Result<(), Error> {
        for file in [config_file, jwt_secret_file] {
            if file.exists() && !self.overwrite {
                return Err(Error::FileExists(file.to_path_buf()));
            }
        }

        let secret: [u8; 32] = rand::random();
        save_jwt_secret(jwt_secret_file, &secret)?;
        info!(file = %jwt_secret_file.display(), "Saved JWT secret");

        let config = default_config(jwt_secret_file, logging)?;
        save_config(config_file, &config)?;
        info!(file = %config_file.display(), "Saved configuration");

        Ok(())
    }
}

/// A configuration driving a single execution client on the default local ports.
pub fn default_config(jwt_secret_file: &Path, logging: LoggingConfig) -> Result<Config, Error> {
    let parse = |url: &str| Url::parse(url).map_err(|e| Error::Parse(e.to_string()));

    Ok(Config {
        logging,
        clients: vec![ClientConfig {
            name: "execution-client".to_string(),
            engine_http_url: Some(parse(DEFAULT_ENGINE_URL)?),
            engine_ipc_path: None,
            eth1_rpc_url: parse(DEFAULT_ETH1_RPC_URL)?,
            jwt_secret_path: Some(jwt_secret_file.to_path_buf()),
        }],
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::load_config;

    #[test]
    fn init_writes_a_usable_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("config/config.toml");
        let jwt_file = dir.path().join("config/jwt.hex");

        InitCmd::default().run(&config_file, &jwt_file, LoggingConfig::default()).unwrap();

        let config = load_config(&config_file).unwrap();
        assert_eq!(config.clients.len(), 1);
        let execution = config.clients[0].to_execution_config(&config_file).unwrap();
        assert_eq!(execution.engine_api_endpoints.len(), 1);
        assert_ne!(execution.jwt_secret, [0u8; 32]);
    }

    #[test]
    fn init_keeps_existing_files_unless_asked() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("config.toml");
        let jwt_file = dir.path().join("jwt.hex");
        InitCmd::default().run(&config_file, &jwt_file, LoggingConfig::default()).unwrap();
        let first = std::fs::read_to_string(&jwt_file).unwrap();

        let err =
            InitCmd::default().run(&config_file, &jwt_file, LoggingConfig::default()).unwrap_err();
        assert!(matches!(err, Error::FileExists(_)));
        assert_eq!(std::fs::read_to_string(&jwt_file).unwrap(), first);

        InitCmd { overwrite: true }
            .run(&config_file, &jwt_file, LoggingConfig::default())
            .unwrap();
        assert_ne!(std::fs::read_to_string(&jwt_file).unwrap(), first);
    }
}
