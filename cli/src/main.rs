//! build-image — turn a declarative image descriptor into a supervisor
//! table, config files, and a multi-stage build recipe.

use clap::Parser;

use vmimage_cli::cli::Cli;
use vmimage_cli::error;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run() {
        eprintln!("Error: {e:#}");
        std::process::exit(error::exit_code(&e));
    }
}
