//! Typed domain error enums and the exit-code taxonomy.
//!
//! This module does no I/O of its own. All error types implement
//! `thiserror::Error` and convert to `anyhow::Error` via the `?` operator;
//! [`exit_code`] recovers the taxonomy from an `anyhow` chain at the
//! process boundary.

use std::path::PathBuf;

use thiserror::Error;

// ── Exit codes ────────────────────────────────────────────────────────────────

/// Process exit codes, one per fatal error kind.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const MALFORMED_DESCRIPTOR: i32 = 2;
    pub const UNKNOWN_STAGE_REFERENCE: i32 = 3;
    pub const MATERIALIZATION_FAILURE: i32 = 4;
}

/// Map an error chain to its taxonomy exit code.
///
/// Walks the chain so wrapping with `.context(..)` never hides the kind.
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if cause.downcast_ref::<DescriptorError>().is_some() {
            return exit::MALFORMED_DESCRIPTOR;
        }
        if cause.downcast_ref::<RecipeError>().is_some() {
            return exit::UNKNOWN_STAGE_REFERENCE;
        }
        if cause.downcast_ref::<MaterializeError>().is_some() {
            return exit::MATERIALIZATION_FAILURE;
        }
    }
    exit::FAILURE
}

// ── Descriptor errors ─────────────────────────────────────────────────────────

/// Errors raised while parsing or validating an image descriptor.
///
/// All of these abort the build before any filesystem write.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("malformed descriptor: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("malformed descriptor: duplicate command name '{0}'")]
    DuplicateCommand(String),

    #[error("malformed descriptor: duplicate file name '{0}'")]
    DuplicateFile(String),

    #[error("malformed descriptor: command '{name}': '{field}' must not be empty")]
    EmptyField { name: String, field: &'static str },

    #[error(
        "malformed descriptor: unsafe file name '{0}': must be a relative path without '..' segments"
    )]
    UnsafeFilename(String),
}

// ── Recipe errors ─────────────────────────────────────────────────────────────

/// Errors raised while composing the multi-stage build recipe.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error(
        "merge stage references unknown build stage '{reference}' (stages declared by the build blob: {declared})"
    )]
    UnknownStageReference { reference: String, declared: String },
}

// ── Materialization errors ────────────────────────────────────────────────────

/// I/O failures while placing artifacts on disk.
///
/// By the time one of these surfaces, files placed earlier in the same run
/// have already been rolled back.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("finalizing {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── Configuration errors ──────────────────────────────────────────────────────

/// Errors in the pipeline configuration layer (embedded defaults plus
/// environment overrides).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid file mode '{mode}' for '{filename}': expected octal digits")]
    InvalidMode { filename: String, mode: String },
}
