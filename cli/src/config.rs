//! Pipeline configuration — the knobs the descriptor deliberately omits.
//!
//! The descriptor names files but not destinations, permissions, base image,
//! or supervisor policy. Those belong to the consuming pipeline and live
//! here: defaults are parsed from the embedded `default-config.yaml`, then
//! individual knobs can be overridden through `VMIMAGE_*` environment
//! variables. A malformed override is a hard error, not a silent fallback.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment override for [`BuildConfig::base_image`].
pub const ENV_BASE_IMAGE: &str = "VMIMAGE_BASE_IMAGE";
/// Environment override for [`SupervisorPolicy::shutdown_timeout_secs`].
pub const ENV_SHUTDOWN_TIMEOUT: &str = "VMIMAGE_SHUTDOWN_TIMEOUT_SECS";

// ── Schema ────────────────────────────────────────────────────────────────────

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildConfig {
    /// Base image of the final stage.
    pub base_image: String,
    /// Directory inside the image that materialized files are copied to.
    pub file_dest_dir: String,
    /// Mode bits applied to files with no per-file override, as an octal
    /// string (e.g. `"0644"`).
    pub default_file_mode: String,
    /// Per-filename attribute overrides, keyed by descriptor filename.
    #[serde(default)]
    pub file_attrs: HashMap<String, FileAttrs>,
    #[serde(default)]
    pub supervisor: SupervisorPolicy,
}

/// Per-file attribute overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileAttrs {
    /// Octal mode string; falls back to the config-wide default.
    #[serde(default)]
    pub mode: Option<String>,
    /// `user[:group]` owner emitted into the recipe; files are copied
    /// root-owned when unset.
    #[serde(default)]
    pub owner: Option<String>,
}

/// Supervisor policy knobs rendered into the supervision table.
///
/// Restart pacing for `respawn` commands is deliberately an `Option`: when
/// unset, the table encodes no throttle and pacing is the consuming init
/// system's affair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SupervisorPolicy {
    /// Seconds the shutdown hook may run before it is killed and shutdown
    /// proceeds without it.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Seconds to pause before a `respawn` command is restarted.
    #[serde(default)]
    pub respawn_delay_secs: Option<u64>,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            respawn_delay_secs: None,
        }
    }
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// Attributes resolved for one materialized file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttrs {
    /// Mode as parsed bits, for the on-disk copy.
    pub mode_bits: u32,
    /// Mode as the original octal string, for the recipe's `--chmod`.
    pub chmod: String,
    pub owner: Option<String>,
}

impl BuildConfig {
    /// Load the embedded defaults and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded defaults are missing or an
    /// environment override is malformed.
    pub fn load() -> Result<Self> {
        let text = crate::assets::get_asset_str("default-config.yaml")?;
        let mut config: Self =
            serde_yaml::from_str(text).context("parsing embedded default-config.yaml")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var(ENV_BASE_IMAGE) {
            self.base_image = value;
        }
        if let Ok(value) = std::env::var(ENV_SHUTDOWN_TIMEOUT) {
            self.supervisor.shutdown_timeout_secs =
                value.parse().map_err(|_| ConfigError::InvalidEnv {
                    var: ENV_SHUTDOWN_TIMEOUT,
                    value: value.clone(),
                    reason: "expected a whole number of seconds".to_string(),
                })?;
        }
        Ok(())
    }

    /// Resolve the attributes attached to a descriptor filename.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured mode string is not octal.
    pub fn attrs_for(&self, filename: &str) -> Result<ResolvedAttrs, ConfigError> {
        let overrides = self.file_attrs.get(filename);
        let chmod = overrides
            .and_then(|a| a.mode.clone())
            .unwrap_or_else(|| self.default_file_mode.clone());
        let mode_bits = u32::from_str_radix(&chmod, 8).map_err(|_| ConfigError::InvalidMode {
            filename: filename.to_string(),
            mode: chmod.clone(),
        })?;
        Ok(ResolvedAttrs {
            mode_bits,
            chmod,
            owner: overrides.and_then(|a| a.owner.clone()),
        })
    }
}
