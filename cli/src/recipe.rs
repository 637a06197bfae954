//! Multi-stage build recipe composition.
//!
//! The `build` and `merge` blobs are opaque: this module never interprets
//! their contents beyond two line-level scans, stage declarations
//! (`FROM .. AS name`) in the build blob and stage references
//! (`--from=name`) in the merge blob. Every reference must resolve to a
//! declared stage before any recipe text is emitted.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::config::BuildConfig;
use crate::descriptor::ImageDescriptor;
use crate::error::RecipeError;
use crate::supervisor::{HOOK_INSTALL_PATH, SHUTDOWN_HOOK_PATH, SupervisionTable};

/// Where the recipe lands in the output directory.
pub const RECIPE_PATH: &str = "Dockerfile";

/// Stage names are case-insensitive in the build engine; everything is
/// compared lowercased.
static STAGE_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*FROM\s+\S+\s+AS\s+(\S+)").expect("valid regex")
});

static STAGE_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)--from=(\S+)").expect("valid regex"));

/// Stage names declared by `FROM .. AS <name>` lines in the build blob.
#[must_use]
pub fn declared_stages(build: &str) -> BTreeSet<String> {
    STAGE_DECL_RE
        .captures_iter(build)
        .map(|c| c[1].to_lowercase())
        .collect()
}

/// Fail fast if the merge blob references a stage the build blob never
/// declares.
///
/// # Errors
///
/// Returns [`RecipeError::UnknownStageReference`] naming the first
/// unresolved reference.
pub fn check_stage_references(build: &str, merge: &str) -> Result<(), RecipeError> {
    let declared = declared_stages(build);
    for capture in STAGE_REF_RE.captures_iter(merge) {
        let reference = capture[1].to_lowercase();
        if !declared.contains(&reference) {
            let names: Vec<&str> = declared.iter().map(String::as_str).collect();
            return Err(RecipeError::UnknownStageReference {
                reference,
                declared: if names.is_empty() {
                    "none".to_string()
                } else {
                    names.join(", ")
                },
            });
        }
    }
    Ok(())
}

/// Compose the full multi-stage recipe.
///
/// Layout: embedded preamble, the build blob verbatim, then a final stage
/// that copies the supervision artifacts and materialized files into place
/// before the merge blob runs verbatim.
///
/// # Errors
///
/// Returns an error on an unresolved stage reference, an unreadable
/// embedded preamble, or an invalid configured file mode.
pub fn compose(
    descriptor: &ImageDescriptor,
    table: &SupervisionTable,
    config: &BuildConfig,
) -> Result<String> {
    check_stage_references(&descriptor.build, &descriptor.merge)?;

    let mut recipe = String::from(crate::assets::get_asset_str("recipe-preamble.dockerfile")?);
    recipe.push('\n');
    recipe.push_str(&descriptor.build);
    if !descriptor.build.ends_with('\n') {
        recipe.push('\n');
    }

    recipe.push('\n');
    recipe.push_str(&format!("FROM {} AS final\n", config.base_image));
    recipe.push_str("COPY --chmod=0644 etc/inittab /etc/inittab\n");
    if table.shutdown_hook.is_some() {
        recipe.push_str(&format!(
            "COPY --chmod=0755 {SHUTDOWN_HOOK_PATH} {HOOK_INSTALL_PATH}\n"
        ));
    }
    for file in &descriptor.files {
        let attrs = config.attrs_for(&file.filename)?;
        let mut copy = String::from("COPY ");
        if let Some(owner) = &attrs.owner {
            copy.push_str(&format!("--chown={owner} "));
        }
        copy.push_str(&format!(
            "--chmod={} files/{} {}/{}\n",
            attrs.chmod, file.filename, config.file_dest_dir, file.filename
        ));
        recipe.push_str(&copy);
    }
    recipe.push_str(&descriptor.merge);
    if !descriptor.merge.is_empty() && !descriptor.merge.ends_with('\n') {
        recipe.push('\n');
    }
    Ok(recipe)
}
