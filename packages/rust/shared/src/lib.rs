//! Shared types, error model, and configuration for Prospector.
//!
//! This crate is the foundation depended on by all other Prospector crates.
//! It provides:
//! - [`ProspectorError`]: the unified error type
//! - Domain types ([`TargetRecord`], [`Field`], [`Stage`], [`RecordState`])
//! - Configuration ([`AppConfig`], runtime views, secret resolution)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompletionConfig, ExhaustedPolicy, FetchConfig, PipelineConfig,
    PipelineOptions, RetryPolicy, Secrets, SheetConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_secrets, resolve_secrets_with,
};
pub use error::{ProspectorError, Result};
pub use types::{CONTENT_COLUMN, Field, RecordState, Stage, TargetRecord, UNRESOLVED_MARKER};
