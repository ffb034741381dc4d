//! Subcommand implementations.

pub mod config;
pub mod route;
pub mod submit;
pub mod workflow;
