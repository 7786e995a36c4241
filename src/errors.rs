//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`UmbraError`] covers the failure modes that can occur
//! while a frame graph is being *built*:
//! - Shader program compilation failures
//! - Graph resolution errors (missing imports, unknown slots, cycles)
//! - Framebuffer attachment mismatches
//! - Configuration parsing errors
//!
//! Per-frame operations never return errors. Once a graph is compiled, every
//! frame is a deterministic, synchronous submission.
//!
//! # Usage
//!
//! ```rust,ignore
//! use umbra::errors::{UmbraError, Result};
//!
//! fn build() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the crate.
#[derive(Error, Debug)]
pub enum UmbraError {
    // ========================================================================
    // GPU & Shader Errors
    // ========================================================================
    /// A shader program failed to compile or link. There is no fallback
    /// program, so this is fatal for the operator being constructed.
    #[error("Shader compilation failed ({vertex} / {fragment}): {message}")]
    ShaderCompilation {
        vertex: String,
        fragment: String,
        message: String,
    },

    /// Attachments bound to one framebuffer do not share the same size.
    #[error(
        "Framebuffer attachment size mismatch: expected {expected_width}x{expected_height}, \
         got {width}x{height} for '{attachment}'"
    )]
    AttachmentSizeMismatch {
        attachment: String,
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    /// The device could not create a GPU object.
    #[error("Device error: {0}")]
    Device(String),

    // ========================================================================
    // Graph Resolution Errors
    // ========================================================================
    /// A pass consumes a buffer that no pass produces and that was not imported.
    #[error("Render buffer '{name}' has no producer and was not imported")]
    MissingImport { name: String },

    /// An operator asked for a slot its declaration does not have.
    #[error("Pass '{pass}' has no slot named '{slot}'")]
    UnknownSlot { pass: String, slot: String },

    /// The declared passes form a dependency cycle.
    #[error("Render pass dependency cycle between: {passes:?}")]
    DependencyCycle { passes: Vec<String> },

    /// A requested final output is produced by no pass.
    #[error("Requested output '{name}' is produced by no pass")]
    MissingProducer { name: String },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Renderer settings contain an invalid value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Alias for `Result<T, UmbraError>`.
pub type Result<T> = std::result::Result<T, UmbraError>;
