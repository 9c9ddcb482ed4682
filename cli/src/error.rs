//! CLI error taxonomy. Distinct from [`populace_core::error::Error`] so
//! `main` can map each kind to a specific exit code (spec.md §6/§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{file}: {source}")]
    Yaml {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{0}")]
    Validation(#[from] populace_core::error::Error),

    #[error("postgres connection failed: {0}")]
    Connect(#[from] populace_postgres::ConnectError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Exit code per spec.md §6: 0 success, 1 validation/YAML, 2
    /// generation, 3 backend.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Yaml { .. } => 1,
            CliError::Validation(err) => match err {
                populace_core::error::Error::Validation { .. } => 1,
                populace_core::error::Error::Yaml(_) => 1,
                populace_core::error::Error::Generation { .. } => 2,
                populace_core::error::Error::Backend(_) => 3,
            },
            CliError::Connect(_) => 3,
            CliError::Io(_) => 1,
        }
    }
}
