//! ValutaTrade Hub CLI
//!
//! Command parsing, configuration and text rendering for the `valutatrade`
//! binary. Every command runs once and exits, except `schedule`, which keeps
//! refreshing rates in the background until interrupted.

pub mod commands;
pub mod config;
pub mod logging;
pub mod render;

pub use commands::{execute, Cli, Command};
pub use config::{AppConfig, LogFormat};
