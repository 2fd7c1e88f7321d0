//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`RenderError`] covers every failure mode of the
//! frame pipeline:
//! - Configuration errors (malformed descriptors, unknown temporal slots)
//! - Resource exhaustion (pool cap reached, device out of memory)
//! - Device errors (backend failures, diagnostic readback)
//! - Pass failures
//! - Settings loading errors
//!
//! None of these are retried. A frame that hits one is aborted and the error
//! is returned to the caller.
//!
//! ```rust,ignore
//! use vesper_core::errors::{RenderError, Result};
//!
//! fn acquire_all() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Coarse classification of a [`RenderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed setup: bad descriptor, unknown or duplicate temporal slot.
    Configuration,
    /// A pool or the device could not satisfy an allocation.
    ResourceExhaustion,
    /// The GPU backend failed.
    Device,
    /// An opaque pass collaborator reported a failure.
    Pass,
    /// Settings could not be read or parsed.
    Settings,
}

/// The main error type for the renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A surface descriptor has zero dimensions, a bad surface count or an
    /// unsupported format.
    #[error("Invalid surface descriptor: {0}")]
    InvalidDescriptor(String),

    /// A temporal slot was looked up before being initialized.
    #[error("Temporal slot not initialized: {0}")]
    UnknownTemporalSlot(String),

    /// A temporal slot name was initialized twice.
    #[error("Temporal slot already initialized: {0}")]
    DuplicateTemporalSlot(String),

    /// A debug visualisation mode name is not one of `RGB`, `A`, `FRAC`.
    #[error("Unknown debug mode: {0}")]
    UnknownDebugMode(String),

    // ========================================================================
    // Resource Exhaustion
    // ========================================================================
    /// The surface pool reached its configured cap with no idle match.
    #[error("Surface pool exhausted: {limit} sets allocated")]
    PoolExhausted {
        /// Configured maximum number of pooled sets
        limit: usize,
    },

    /// The device could not allocate the requested memory.
    #[error("Out of GPU memory: {0}")]
    OutOfMemory(String),

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// Backend failure (adapter, device, submission).
    #[error("Render device error: {0}")]
    Device(String),

    /// The diagnostic log could not be read back.
    #[error("Diagnostic readback failed: {0}")]
    DiagnosticReadback(String),

    // ========================================================================
    // Pass Errors
    // ========================================================================
    /// A pass collaborator failed.
    #[error("Pass '{pass}' failed: {reason}")]
    PassFailed {
        /// Name of the failing pass
        pass: &'static str,
        /// Description reported by the pass
        reason: String,
    },

    // ========================================================================
    // Settings Errors
    // ========================================================================
    /// Settings JSON could not be parsed.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),

    /// Settings file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDescriptor(_)
            | Self::UnknownTemporalSlot(_)
            | Self::DuplicateTemporalSlot(_)
            | Self::UnknownDebugMode(_) => ErrorKind::Configuration,
            Self::PoolExhausted { .. } | Self::OutOfMemory(_) => ErrorKind::ResourceExhaustion,
            Self::Device(_) | Self::DiagnosticReadback(_) => ErrorKind::Device,
            Self::PassFailed { .. } => ErrorKind::Pass,
            Self::Settings(_) | Self::Io(_) => ErrorKind::Settings,
        }
    }

    /// Shorthand for [`ErrorKind::Configuration`] errors.
    #[must_use]
    #[inline]
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Builds a [`RenderError::PassFailed`].
    pub fn pass(pass: &'static str, reason: impl Into<String>) -> Self {
        Self::PassFailed {
            pass,
            reason: reason.into(),
        }
    }
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;
