//! Command-line interface.
//!
//! Global flags select the home directory, the configuration file and override the logging
//! settings of the configuration file.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::{
    cmd::{init::InitCmd, start::StartCmd},
    config::{LogFormat, LogLevel},
    error::Error,
};

const APP_FOLDER: &str = ".clmock";
const CONFIG_FILE: &str = "config.toml";
const JWT_SECRET_FILE: &str = "jwt.hex";

#[derive(Parser, Clone, Debug, Default)]
#[command(name = "clmock", version, about = "Consensus-layer mock driving execution clients")]
pub struct Args {
    /// Home directory (default: `./.clmock`)
    #[arg(long, global = true, value_name = "HOME_DIR")]
    pub home: Option<PathBuf>,

    /// Configuration file (default: `<HOME_DIR>/config/config.toml`)
    #[arg(long, global = true, value_name = "CONFIG_FILE", env = "CLMOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (default: `info`)
    #[arg(long, global = true, value_name = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Log format (default: `plaintext`)
    #[arg(long, global = true, value_name = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Commands {
    /// Write a default configuration and JWT secret
    Init(InitCmd),

    /// Start producing blocks on the configured execution clients
    Start(StartCmd),
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Start(StartCmd::default())
    }
}

impl Args {
    pub fn new() -> Self {
        Args::parse()
    }

    /// The home directory, relative to the working directory unless given explicitly.
    pub fn get_home_dir(&self) -> Result<PathBuf, Error> {
        match &self.home {
            Some(home) => Ok(home.clone()),
            None => Ok(std::env::current_dir().map_err(|_| Error::DirPath)?.join(APP_FOLDER)),
        }
    }

    fn get_config_dir(&self) -> Result<PathBuf, Error> {
        Ok(self.get_home_dir()?.join("config"))
    }

    pub fn get_config_file_path(&self) -> Result<PathBuf, Error> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(self.get_config_dir()?.join(CONFIG_FILE)),
        }
    }

    pub fn get_jwt_secret_file_path(&self) -> Result<PathBuf, Error> {
        Ok(self.get_config_dir()?.join(JWT_SECRET_FILE))
    }
}

/// Resolves `path` against the directory containing the configuration file.
pub fn relative_to(config_file: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    config_file.parent().map(|dir| dir.join(path)).unwrap_or_else(|| path.to_path_buf())
}
