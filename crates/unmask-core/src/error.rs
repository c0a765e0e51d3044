//! Unified error type and exit-code mapping.
//!
//! Per-unit problems are diagnostics, not errors (see [`crate::report`]);
//! only whole-input failures surface here and abort the run.

use std::fmt;

use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Stable CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Invalid arguments from caller.
    InvalidArguments = 2,
    /// Whole-input error (unreadable mapping file, missing input root).
    InputError = 3,
    /// Failed to write output.
    OutputError = 4,
    /// Internal error (bug, unexpected state).
    InternalError = 10,
}

impl ExitCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the CLI front door.
#[derive(Debug, Error)]
pub enum UnmaskError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The explicit mapping file could not be read.
    #[error("cannot read mapping file {path}: {message}")]
    MappingFile { path: String, message: String },

    /// The signature database could not be read or parsed.
    #[error("cannot load signature database {path}: {message}")]
    SignatureDb { path: String, message: String },

    /// The input root does not exist or is not readable.
    #[error("input root not readable: {path}")]
    InputRoot { path: String },

    /// Failed to write an output file.
    #[error("cannot write {path}: {message}")]
    OutputWrite { path: String, message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl UnmaskError {
    /// Create an invalid-arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        UnmaskError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        UnmaskError::Internal {
            message: message.into(),
        }
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            UnmaskError::InvalidArguments { .. } => ExitCode::InvalidArguments,
            UnmaskError::MappingFile { .. }
            | UnmaskError::SignatureDb { .. }
            | UnmaskError::InputRoot { .. } => ExitCode::InputError,
            UnmaskError::OutputWrite { .. } => ExitCode::OutputError,
            UnmaskError::Internal { .. } => ExitCode::InternalError,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
