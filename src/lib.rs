//! `populace`: a declarative, dependency-ordered database seeding engine.
//!
//! This crate is a thin facade over [`populace_core`] (blueprints, items,
//! generators, the generation pass) and [`populace_postgres`] (the
//! PostgreSQL backend). The `populace` binary in `cli/` is the primary way
//! to drive a seeding run from a blueprint YAML file; this crate exists for
//! programs that want to build and run blueprints in-process instead.

pub use populace_core::*;

pub mod postgres {
    pub use populace_postgres::*;
}
