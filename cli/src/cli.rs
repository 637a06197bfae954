//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::commands;
use crate::output::OutputContext;

/// Build a VM compute image from a declarative descriptor
#[derive(Parser)]
#[command(name = "build-image", version, arg_required_else_help = true)]
pub struct Cli {
    /// Path to the image descriptor document
    pub descriptor: PathBuf,

    /// Directory receiving the generated artifacts
    pub output_dir: PathBuf,
}

impl Cli {
    /// Execute the build.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is invalid or the artifacts
    /// cannot be produced.
    pub fn run(self) -> Result<()> {
        let ctx = OutputContext::new(false, false);
        commands::build::run(&ctx, &self.descriptor, &self.output_dir)
    }
}
