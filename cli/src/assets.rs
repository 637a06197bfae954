//! Embedded assets — the static files compiled into the binary.
//!
//! At compile time, `include_dir!` embeds everything under `assets/`:
//!   - `recipe-preamble.dockerfile` — fixed header of every generated recipe
//!   - `default-config.yaml`        — pipeline defaults (base image, modes,
//!     supervisor policy)

use anyhow::Result;
use include_dir::{Dir, include_dir};

static EMBEDDED_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets");

/// Return the raw bytes of a single embedded asset.
///
/// # Errors
///
/// Returns an error if no asset with the given `name` exists.
pub fn get_asset(name: &str) -> Result<&'static [u8]> {
    EMBEDDED_ASSETS
        .get_file(name)
        .map(include_dir::File::contents)
        .ok_or_else(|| anyhow::anyhow!("embedded asset not found: {name}"))
}

/// Return an embedded asset as UTF-8 text.
///
/// # Errors
///
/// Returns an error if the asset is missing or not valid UTF-8.
pub fn get_asset_str(name: &str) -> Result<&'static str> {
    std::str::from_utf8(get_asset(name)?)
        .map_err(|_| anyhow::anyhow!("embedded asset is not UTF-8: {name}"))
}
