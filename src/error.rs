//! Rich diagnostic error types for redline.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Anchoring misses are not errors: every
//! locator tier reports "not found" as `None`, and only genuinely exceptional
//! conditions (I/O, bad input, failed transforms) end up here.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for redline.
#[derive(Debug, Error, Diagnostic)]
pub enum RedlineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Range(#[from] RangeError),
}

/// Error type a caller-supplied mutation transform may return.
///
/// String literals convert directly: `return Err("annotation not found".into())`.
pub type TransformError = Box<dyn std::error::Error + Send + Sync>;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(redline::store::io),
        help(
            "A filesystem operation failed. Check that the store directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(redline::store::serde),
        help("The annotation record could not be encoded as JSON. This is a bug; please report it.")
    )]
    Serialization { message: String },

    #[error("mutation rejected: {source}")]
    #[diagnostic(
        code(redline::store::transform_failed),
        help(
            "The mutation transform returned an error, so nothing was written. \
             The record on disk is unchanged and later mutations are unaffected."
        )
    )]
    TransformFailed {
        #[source]
        source: TransformError,
    },

    #[error("mutation transform panicked")]
    #[diagnostic(
        code(redline::store::transform_panicked),
        help(
            "The mutation transform panicked, so nothing was written. \
             The record on disk is unchanged and later mutations are unaffected."
        )
    )]
    TransformPanicked,

    #[error("mutation queue is closed")]
    #[diagnostic(
        code(redline::store::queue_closed),
        help(
            "The store's background writer has stopped, usually because the tokio \
             runtime is shutting down. Reopen the store from a live runtime."
        )
    )]
    QueueClosed,

    #[error("no tokio runtime available to drive the mutation queue")]
    #[diagnostic(
        code(redline::store::no_runtime),
        help("Open the store from inside a tokio runtime (e.g. within `#[tokio::main]`).")
    )]
    NoRuntime,
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(redline::config::read),
        help("Ensure the config file is readable, or remove it to use defaults.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(redline::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Range errors
// ---------------------------------------------------------------------------

/// Invalid selections handed to the range codec.
#[derive(Debug, Error, Diagnostic)]
pub enum RangeError {
    #[error("range boundary is not a text node in this document")]
    #[diagnostic(
        code(redline::range::not_text),
        help("Both ends of a selection must sit inside text nodes of the same document.")
    )]
    NotText,

    #[error("offset {offset} is past the end of a {len}-character text node")]
    #[diagnostic(
        code(redline::range::offset),
        help("Offsets count characters within the boundary text node.")
    )]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("range end precedes range start")]
    #[diagnostic(
        code(redline::range::inverted),
        help("Swap the boundaries so the start comes first in document order.")
    )]
    Inverted,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
pub type RangeResult<T> = std::result::Result<T, RangeError>;
