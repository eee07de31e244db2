use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum NichesError {
    #[error("invalid input: {0}")]
    #[diagnostic(help("pass at least one category, e.g. `--categories 1-19`"))]
    InvalidInput(String),

    #[error("invalid category identifier: {0}")]
    InvalidCategory(String),

    #[error("missing config file {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client setup failed: {0}")]
    Http(String),

    #[error("failed to parse spreadsheet: {0}")]
    Sheet(#[from] crate::sheet::ParseError),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
