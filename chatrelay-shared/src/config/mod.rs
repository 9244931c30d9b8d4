//! Application configuration: defaults, optional TOML file, env overrides.

pub mod server;

pub use server::{
    Config, ConfigError, DatabaseConfig, LogFormat, LoggingConfig, ServerConfig, StreamConfig,
};
