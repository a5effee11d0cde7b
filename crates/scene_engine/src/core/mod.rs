//! # Core Engine Module
//!
//! Shared configuration used by the resource caches, the camera and the
//! logging setup.

pub mod config;

// Re-export commonly used config types
pub use config::{
    AssetConfig,
    CameraConfig,
    Config,
    ConfigError,
    EngineConfig,
    LoggingConfig,
};
