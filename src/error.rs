//! Error handling for the textbake application.
//! Defines custom error types and results used throughout the application.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for textbake operations.
///
/// Most of these never leave the pipeline: per-file failures are logged and
/// degraded to safe defaults, per-recipe failures abort only the current recipe.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// Represents errors that occur during configuration parsing or validation
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    /// Errors raised by the MiniJinja engine while loading or rendering
    #[error("Template rendering error: {0}.")]
    MinijinjaError(#[from] minijinja::Error),

    /// The recipe template folder is missing or is not a directory
    #[error("Template folder error: '{}' {reason}.", folder.display())]
    TemplateFolderError { folder: PathBuf, reason: String },

    /// The input path is neither a regular file nor a directory
    #[error("Input path error: '{}' is neither a file nor a directory.", path.display())]
    InputPathError { path: PathBuf },

    /// Text could not be decoded from, or encoded to, the configured encoding
    #[error("Encoding error: {0}.")]
    EncodingError(String),

    /// Represents errors in TextFSM templates or while running them
    #[error("TextFSM error: {0}.")]
    TextFsmError(String),
}

/// Convenience type alias for Results with [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Arguments
/// * `err` - The Error to handle
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{}", err);
    std::process::exit(1);
}
