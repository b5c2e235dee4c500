//! Shared types, error model, and configuration for contentgen.
//!
//! This crate is the foundation depended on by all other contentgen crates.
//! It provides:
//! - [`ContentGenError`], the unified error type
//! - Domain types ([`ProductModel`], [`Price`], [`JobId`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackoffKind, GenerationConfig, JobsConfig, OllamaConfig, OpenRouterConfig,
    OutputConfig, PipelineConfig, Provider, RetryConfig, StagesConfig, ValidationConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{ContentGenError, Result};
pub use types::{Currency, JobId, Price, ProductModel, format_amount};
