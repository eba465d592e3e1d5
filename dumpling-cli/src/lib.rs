//! Dumpling CLI - inspect connection strings and backup configuration.
//!
//! This crate provides the `dumpling` binary. The commands only read: they
//! parse DSNs, resolve them from the environment and validate configuration
//! files, without touching any database.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
