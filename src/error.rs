use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error(
        "External command failed: {command} (exit code {code:?})\nstdout: {stdout}\nstderr: {stderr}"
    )]
    ExternalProcess {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Expected artifact missing after external command: {path}")]
    ArtifactMissing { path: PathBuf },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Metadata error: {0}")]
    Metadata(String),
}

pub type Result<T> = std::result::Result<T, SubflowError>;
