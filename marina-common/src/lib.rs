//! Marina Common - shared plumbing for the Marina assistant services.
//!
//! This crate provides:
//! - Configuration types, file loading, and environment overrides
//! - The error taxonomy shared by the relay bot and the CLI
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    AnthropicConfig, BackendConfig, Config, ObservabilityConfig, SessionsConfig, TelegramConfig,
};
pub use error::{Error, Result, ResultExt};
pub use logging::init_logging;
