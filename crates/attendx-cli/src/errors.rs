use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

use attendx_config::ConfigError;
use attendx_core::errors::AppError;
use attendx_core::response::ErrorCode;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] AppError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read sample file {path}: {source}")]
    SampleRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("store fault: {0}")]
    Store(String),

    #[error("output error: {0}")]
    Output(#[from] io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Core(err) => match ErrorCode::from(err).status_hint() {
                400 | 404 => ExitCode::from(2),
                401 | 403 => ExitCode::from(3),
                429 => ExitCode::from(4),
                503 => ExitCode::from(5),
                _ => ExitCode::from(1),
            },
            CliError::Config(_) => ExitCode::from(2),
            CliError::SampleRead { .. } => ExitCode::from(2),
            CliError::Store(_) => ExitCode::from(1),
            CliError::Output(_) => ExitCode::from(1),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
