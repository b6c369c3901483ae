//! Orgi - keep an org-mode issue log in sync with TODO comments in source code.
//!
//! This library provides the synchronization engine behind the `orgi` CLI:
//! - [`org`] parses and writes the org document (issues with properties drawers)
//! - [`source`] discovers source files, extracts TODO comments and patches lines in place
//! - [`sync`] links the two by `(file, line)` identity (gather, sync, validate)

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod org;
pub mod source;
pub mod sync;
mod textfile;

use std::path::PathBuf;

pub use org::ParseError;


/// Library-level error type for Orgi operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Issue not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Orgi operations.
pub type Result<T> = std::result::Result<T, Error>;
