//! The `wajs` command: build, inspect and run bridged modules.

pub mod args;
pub mod commands;
pub mod config;
