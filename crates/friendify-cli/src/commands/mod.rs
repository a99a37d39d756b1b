//! CLI command handlers

pub mod common;
pub mod config;
pub mod simulate;
