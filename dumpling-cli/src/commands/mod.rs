//! CLI command implementations.

pub mod config;
pub mod env;
pub mod parse;
pub mod version;
