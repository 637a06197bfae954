//! Image descriptor schema, parsing, and validation.
//!
//! The descriptor is a flat, immutable configuration tree: parsed once at
//! image-build time, never mutated afterwards. `shell`, `content`, and the
//! `build`/`merge` blobs are opaque strings; the consuming shell, init
//! system, and build engine own their interpretation, so nothing here
//! escapes or templates them.

use std::collections::HashSet;
use std::path::{Component, Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::DescriptorError;

// ── Schema ────────────────────────────────────────────────────────────────────

/// Supervision mode of a command, in the init system's own vocabulary.
///
/// Unrecognized values fail parsing; they are never silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitAction {
    /// One-shot startup gate: runs to completion, in document order, before
    /// anything later starts. Non-zero exit is fatal to the supervised
    /// system.
    Sysinit,
    /// Like `sysinit`, but sequenced after all `sysinit` entries.
    Wait,
    /// Runs once after the gates clear; not restarted on exit.
    Once,
    /// Long-running: restarted by the supervisor whenever it exits.
    Respawn,
}

impl InitAction {
    /// Whether this action is a synchronous startup gate.
    #[must_use]
    pub fn is_gate(self) -> bool {
        matches!(self, Self::Sysinit | Self::Wait)
    }

    /// The action keyword as it appears in the supervision table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sysinit => "sysinit",
            Self::Wait => "wait",
            Self::Once => "once",
            Self::Respawn => "respawn",
        }
    }
}

/// A named command supervised inside the image.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Command {
    /// Unique name within the descriptor.
    pub name: String,
    /// User the command runs as.
    pub user: String,
    pub sysv_init_action: InitAction,
    /// Opaque shell line, passed through verbatim.
    pub shell: String,
}

/// A config file materialized verbatim into the image build context.
///
/// Carries a filename only; destination path, mode, and ownership are
/// attached by the pipeline configuration, not the descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSpec {
    pub filename: String,
    /// Literal content, newline-preserving.
    pub content: String,
}

/// The root descriptor document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImageDescriptor {
    #[serde(default)]
    pub commands: Vec<Command>,
    /// Script run exactly once on supervised shutdown, after the `respawn`
    /// processes have been signalled to stop.
    #[serde(default)]
    pub shutdown_hook: Option<String>,
    #[serde(default)]
    pub files: Vec<FileSpec>,
    /// Opaque blob declaring the intermediate build stages.
    pub build: String,
    /// Opaque blob spliced into the final stage.
    pub merge: String,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

impl ImageDescriptor {
    /// Parse and validate a descriptor from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] identifying the offending field on any
    /// schema or uniqueness violation.
    pub fn from_yaml(text: &str) -> Result<Self, DescriptorError> {
        let descriptor: Self = serde_yaml::from_str(text)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Read and parse a descriptor document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Self::from_yaml(&text)?)
    }

    fn validate(&self) -> Result<(), DescriptorError> {
        let mut names = HashSet::new();
        for command in &self.commands {
            if command.name.is_empty() {
                return Err(DescriptorError::EmptyField {
                    name: "<unnamed>".to_string(),
                    field: "name",
                });
            }
            for (field, value) in [("user", &command.user), ("shell", &command.shell)] {
                if value.is_empty() {
                    return Err(DescriptorError::EmptyField {
                        name: command.name.clone(),
                        field,
                    });
                }
            }
            if !names.insert(command.name.as_str()) {
                return Err(DescriptorError::DuplicateCommand(command.name.clone()));
            }
        }

        let mut filenames = HashSet::new();
        for file in &self.files {
            validate_filename(&file.filename)?;
            if !filenames.insert(file.filename.as_str()) {
                return Err(DescriptorError::DuplicateFile(file.filename.clone()));
            }
        }
        Ok(())
    }
}

/// Reject absolute paths and any non-plain path segment (`..`, `.`, prefixes).
fn validate_filename(filename: &str) -> Result<(), DescriptorError> {
    if filename.is_empty() {
        return Err(DescriptorError::UnsafeFilename(filename.to_string()));
    }
    let path = Path::new(filename);
    if path.is_absolute() {
        return Err(DescriptorError::UnsafeFilename(filename.to_string()));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => return Err(DescriptorError::UnsafeFilename(filename.to_string())),
        }
    }
    Ok(())
}
