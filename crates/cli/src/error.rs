use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while handling configuration and key files.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not determine home directory path")]
    DirPath,

    #[error("could not open file: {}", .0.display())]
    OpenFile(PathBuf),

    #[error("could not write file: {}", .0.display())]
    WriteFile(PathBuf),

    #[error("could not create parent directory: {}", .0.display())]
    ParentDir(PathBuf),

    #[error("refusing to overwrite existing file: {}", .0.display())]
    FileExists(PathBuf),

    #[error("could not parse configuration: {0}")]
    Parse(String),

    #[error("could not serialize configuration: {0}")]
    Serialize(String),

    #[error("client {0} has neither an Engine API URL nor an IPC path")]
    NoEngineEndpoint(String),

    #[error("client {0} uses the HTTP Engine API but has no JWT secret file")]
    MissingJwtSecret(String),

    #[error("invalid JWT secret in {}: {reason}", .path.display())]
    JwtSecret { path: PathBuf, reason: String },
}
