//! Configuration module for the voice document assistant.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the remote
//! service, host speech programs and the terminal surface, `AppPaths` for
//! cross-platform directories, and TOML persistence via `AppConfig::load` /
//! `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, CommandSpec, ServerConfig, SpeechConfig, UiConfig};
