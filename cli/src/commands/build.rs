//! `build-image` — turn a descriptor into a supervisor table, config files,
//! and a multi-stage build recipe.
//!
//! Ordering is part of the contract: validation and stage-reference
//! checking finish before the first filesystem write, so a rejected
//! descriptor leaves zero artifacts behind.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::BuildConfig;
use crate::descriptor::ImageDescriptor;
use crate::manifest::BuildManifest;
use crate::materialize::Artifact;
use crate::output::OutputContext;
use crate::supervisor::{INITTAB_PATH, SHUTDOWN_HOOK_PATH};
use crate::{manifest, materialize, recipe, supervisor};

/// Run a full image build.
///
/// # Errors
///
/// Returns an error on a malformed descriptor, an unknown stage reference,
/// or a materialization failure; nothing is written unless the whole
/// artifact set can be produced.
pub fn run(ctx: &OutputContext, descriptor_path: &Path, output_dir: &Path) -> Result<()> {
    let config = BuildConfig::load()?;

    let text = std::fs::read_to_string(descriptor_path)
        .with_context(|| format!("reading {}", descriptor_path.display()))?;
    let descriptor = ImageDescriptor::from_yaml(&text)?;
    ctx.info(&format!(
        "Descriptor: {} ({} commands, {} files)",
        descriptor_path.display(),
        descriptor.commands.len(),
        descriptor.files.len()
    ));

    let table = supervisor::build_table(&descriptor, &config.supervisor);
    let recipe_text = recipe::compose(&descriptor, &table, &config)?;

    let mut artifacts = vec![Artifact::new(INITTAB_PATH, table.inittab.clone(), 0o644)];
    if let Some(hook) = &table.shutdown_hook {
        artifacts.push(Artifact::new(SHUTDOWN_HOOK_PATH, hook.clone(), 0o755));
    }
    for file in &descriptor.files {
        let attrs = config.attrs_for(&file.filename)?;
        artifacts.push(Artifact::new(
            format!("files/{}", file.filename),
            file.content.clone(),
            attrs.mode_bits,
        ));
    }
    artifacts.push(Artifact::new(recipe::RECIPE_PATH, recipe_text, 0o644));

    materialize::materialize(output_dir, &artifacts)?;
    manifest::write(output_dir, &BuildManifest::new(&text, &artifacts))?;

    ctx.success(&format!(
        "Image artifacts written to {}",
        output_dir.display()
    ));
    ctx.kv("Supervisor", INITTAB_PATH);
    ctx.kv("Recipe", recipe::RECIPE_PATH);
    ctx.kv("Manifest", manifest::MANIFEST_FILENAME);
    Ok(())
}
