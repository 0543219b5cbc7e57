//! # CLI Commands
//!
//! Command implementations for the `insight` CLI.

pub mod batch;
pub mod cache;
pub mod config_cmd;
pub mod serve;
