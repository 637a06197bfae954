//! Build manifest emitted alongside the artifacts.
//!
//! Records what a build produced (tool version, timestamp, the digest of
//! the descriptor it was produced from, and a digest per artifact) so a
//! downstream pipeline can verify the output set without re-running the
//! build.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::materialize::{Artifact, materialize};

pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Integrity record for one build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    pub tool_version: String,
    pub built_at: DateTime<Utc>,
    pub descriptor_sha256: String,
    pub artifacts: Vec<ArtifactEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub sha256: String,
    pub size: u64,
}

impl BuildManifest {
    /// Describe a finished artifact set.
    #[must_use]
    pub fn new(descriptor_text: &str, artifacts: &[Artifact]) -> Self {
        Self {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            built_at: Utc::now(),
            descriptor_sha256: sha256_hex(descriptor_text.as_bytes()),
            artifacts: artifacts
                .iter()
                .map(|a| ArtifactEntry {
                    path: a.rel_path.clone(),
                    sha256: sha256_hex(&a.content),
                    size: a.content.len() as u64,
                })
                .collect(),
        }
    }
}

/// Write the manifest into the output directory, atomically.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write(root: &Path, manifest: &BuildManifest) -> Result<()> {
    let mut content = serde_json::to_string_pretty(manifest).context("serializing manifest")?;
    content.push('\n');
    materialize(root, &[Artifact::new(MANIFEST_FILENAME, content, 0o644)])?;
    Ok(())
}

/// Hex-encoded SHA-256 of a byte slice.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}
