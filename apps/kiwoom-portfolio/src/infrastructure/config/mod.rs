//! Configuration Module
//!
//! Configuration loading for the portfolio service.

mod settings;

pub use settings::{
    AppConfig, ConfigError, Credentials, KiwoomEnvironment, RestSettings, ServerSettings,
    StreamSettings,
};
