use thiserror::Error;

/// Failure to establish a connection, kept distinct from
/// [`populace_core::error::Error`] since it can happen before there's a
/// backend to report through.
#[derive(Debug, Error)]
#[error("failed to connect to postgres: {0}")]
pub struct ConnectError(#[from] tokio_postgres::Error);
