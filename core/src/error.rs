//! Error taxonomy for the seeding engine, mirroring `drizzle-core`'s
//! `DrizzleError`: message-carrying variants plus `#[from]` conversions
//! for the handful of underlying error types the engine actually touches.

use thiserror::Error;

/// The four kinds of failure the engine can produce: a malformed blueprint,
/// a YAML document that doesn't parse, a failure while generating rows, and
/// a failure reported by the backend.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error{}{}: {message}",
        item.as_deref().map(|i| format!(" in item `{i}`")).unwrap_or_default(),
        field.as_deref().map(|f| format!(" field `{f}`")).unwrap_or_default())]
    Validation {
        message: String,
        item: Option<String>,
        field: Option<String>,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("generation error{}: {message}", item.as_deref().map(|i| format!(" in item `{i}`")).unwrap_or_default())]
    Generation {
        message: String,
        item: Option<String>,
    },

    #[error("backend error: {0}")]
    Backend(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            item: None,
            field: None,
        }
    }

    pub fn validation_in(item: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            item: Some(item.into()),
            field: None,
        }
    }

    pub fn validation_field(
        item: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Validation {
            message: message.into(),
            item: Some(item.into()),
            field: Some(field.into()),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Error::Generation {
            message: message.into(),
            item: None,
        }
    }

    pub fn generation_in(item: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Generation {
            message: message.into(),
            item: Some(item.into()),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend(message.into())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
