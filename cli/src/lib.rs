//! `populace-cli`: loads blueprint YAML files into a [`populace_core::Blueprint`]
//! and drives a run against a backend. The binary entry point is `main.rs`;
//! this crate holds the parts worth unit testing directly.

pub mod error;
pub mod loader;

pub use error::CliError;
