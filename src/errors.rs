//! Application error types and user-facing error formatting.
//!
//! Provides structured error types for the extraction pipeline:
//! - [`ExtractError`] for failures of the core (locate, collect, load)
//! - [`ScopeError`] as the unified top-level error type of the binary
//!
//! The [`ScopeError`] type carries contextual hints and exit codes so that
//! `main()` can present human-readable diagnostics on stderr without ever
//! exposing raw panics or debug formatting.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// Process exit codes.
///
/// * `0` - success
/// * `1` - general runtime error
/// * `2` - usage / argument error (bad CLI invocation or bad position)
/// * `3` - no declaration at the requested position
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_NOT_FOUND: i32 = 3;

// ---------------------------------------------------------------------------
// Core error type
// ---------------------------------------------------------------------------

/// Errors that the extraction core propagates to its caller.
///
/// Unresolvable identifiers inside a scanned body are *not* errors: they
/// are logged and dropped so that partial context is still produced.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The module root, file or position arguments are unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested source file is not part of the loaded program.
    #[error("file not found in loaded packages: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Line or column lies outside the file.
    #[error("invalid position: line {line}, column {column}")]
    InvalidPosition { line: usize, column: usize },

    /// No declaration encloses the requested position.
    #[error("no symbol found at {}:{line}:{column}", file.display())]
    SymbolNotFound {
        file: PathBuf,
        line: usize,
        column: usize,
    },

    /// The target symbol could not be mapped back into the program model.
    #[error("failed to resolve {0} in the loaded program")]
    Resolution(String),

    /// The program model could not be loaded at all.
    #[error("failed to load module: {0}")]
    Load(String),
}

impl ExtractError {
    /// Whether the caller can recover by retrying with another position.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExtractError::SymbolNotFound { .. } | ExtractError::InvalidPosition { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Unified application error
// ---------------------------------------------------------------------------

/// Unified error type for the entire application.
///
/// Allows callers to propagate any layer's error through a single `Result`
/// type while still enabling pattern matching on the specific variant.
#[derive(Error, Debug)]
pub enum ScopeError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A usage / argument error (exit code 2).
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScopeError {
    /// Return the appropriate process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ScopeError::Usage(_) => EXIT_USAGE,
            ScopeError::Extract(ExtractError::InvalidInput(_))
            | ScopeError::Extract(ExtractError::InvalidPosition { .. }) => EXIT_USAGE,
            ScopeError::Extract(ExtractError::SymbolNotFound { .. }) => EXIT_NOT_FOUND,
            _ => EXIT_ERROR,
        }
    }

    /// Return an optional human-readable hint that may help the user fix
    /// the problem.  Returns `None` when no specific guidance applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ScopeError::Extract(ExtractError::SymbolNotFound { .. }) => {
                Some("point --line at a function, method, type, const or var declaration")
            }
            ScopeError::Extract(ExtractError::InvalidPosition { .. }) => {
                Some("line and column are 1-based and must lie inside the file")
            }
            ScopeError::Extract(ExtractError::FileNotFound(_)) => {
                Some("check that the file lives under --root and is not a _test.go file")
            }
            ScopeError::Extract(ExtractError::Load(_)) => {
                Some("run from the module root or pass --root <dir containing go.mod>")
            }
            ScopeError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Some("verify the file or directory exists")
            }
            ScopeError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Some("check file permissions")
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
