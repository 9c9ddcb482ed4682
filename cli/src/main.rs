//! `populace` - CLI entry point for the declarative database-seeding engine.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use populace_cli::error::CliError;
use populace_cli::loader;
use populace_postgres::PostgresBackend;

/// populace - declarative, dependency-ordered database seeding
#[derive(Parser, Debug)]
#[command(name = "populace")]
#[command(author, version, about = "Declarative database seeding", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the built-in generator catalog
    Generators,

    /// Run one or more blueprint files against a backend
    Run {
        #[command(subcommand)]
        backend: RunBackend,
    },
}

#[derive(Subcommand, Debug)]
enum RunBackend {
    /// Seed a PostgreSQL database
    Postgres {
        #[arg(long, env = "PGHOST", default_value = "localhost")]
        host: String,

        #[arg(long, env = "PGPORT", default_value_t = 5432)]
        port: u16,

        #[arg(long, env = "PGDATABASE")]
        db: String,

        #[arg(long, env = "PGUSER")]
        user: String,

        #[arg(long, env = "PGPASSWORD")]
        password: String,

        /// Random seed driving every generator in the run
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Blueprint YAML files, merged in order (later items/vars override
        /// earlier ones of the same name)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

const GENERATOR_CATALOG: &[(&str, &str)] = &[
    ("Value", "same value each call; expression re-evaluated"),
    ("Boolean", "true with probability `ratio` (default 0.5)"),
    ("Integer", "uniform integer in [min, max]"),
    ("Float", "uniform float in [min, max]"),
    ("Choices", "uniform random element of `choices`"),
    ("Text", "random string of length in [min_length, max_length]"),
    ("Lorem", "`words` lorem-ipsum words joined with spaces"),
    ("DateTime", "uniform timestamp in the resolved window"),
    ("Date", "uniform date in the resolved window"),
    ("Time", "uniform time of day"),
    ("UUID", "random v4 UUID"),
    ("Email", "synthetic email address"),
    ("Name", "`First Last`, optionally by gender"),
    ("FirstName", "given name, optionally by gender"),
    ("LastName", "surname"),
    ("IP", "dotted IPv4 address"),
    ("URL", "synthetic https:// URL"),
    ("Select", "draws a value from an existing row in another table"),
    ("Store", "fresh empty list other items can append into"),
    ("Yaml", "parses `value` as YAML"),
];

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "populace run failed");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Generators => {
            for (name, doc) in GENERATOR_CATALOG {
                println!("{name:<10} {doc}");
            }
            Ok(())
        }
        Command::Run {
            backend: RunBackend::Postgres { host, port, db, user, password, seed, files },
        } => {
            let mut blueprint = loader::load_files(seed, &files)?;

            let conninfo = format!(
                "host={host} port={port} dbname={db} user={user} password={password}"
            );
            let mut backend = PostgresBackend::connect(&conninfo).await?;

            blueprint.preload_existing(&mut backend).await.map_err(CliError::Validation)?;
            blueprint.generate(&mut backend).await.map_err(CliError::Validation)?;
            backend.close().await.map_err(CliError::Validation)?;

            Ok(())
        }
    }
}
