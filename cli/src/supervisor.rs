//! Supervision table rendering.
//!
//! Turns the descriptor's ordered command list into an init-system table
//! (busybox `inittab` format) plus, when a shutdown hook is declared, an
//! executable hook script. Entries keep document order: the consuming init
//! system runs `sysinit`/`wait` entries to completion in that order before
//! `once`/`respawn` entries start, so position in the document is the
//! gating contract. There is no explicit dependency field; if ordering ever
//! needs to become explicit, this is the one place that renders it.

use crate::config::SupervisorPolicy;
use crate::descriptor::{ImageDescriptor, InitAction};

/// Where the table lands in the output directory.
pub const INITTAB_PATH: &str = "etc/inittab";
/// Where the hook script lands in the output directory.
pub const SHUTDOWN_HOOK_PATH: &str = "bin/shutdown-hook";
/// Where the recipe installs the hook inside the image.
pub const HOOK_INSTALL_PATH: &str = "/usr/local/bin/shutdown-hook";

const INITTAB_BANNER: &str = "# Generated by build-image. Do not edit.\n";

/// The rendered supervision artifacts.
#[derive(Debug, Clone)]
pub struct SupervisionTable {
    /// `inittab` text, one entry per command in document order.
    pub inittab: String,
    /// Hook script content, present iff the descriptor declares a hook.
    pub shutdown_hook: Option<String>,
}

/// Render the supervision table for a descriptor.
#[must_use]
pub fn build_table(descriptor: &ImageDescriptor, policy: &SupervisorPolicy) -> SupervisionTable {
    let mut inittab = String::from(INITTAB_BANNER);

    for command in &descriptor.commands {
        let mut process = run_as(&command.user, &command.shell);
        if command.sysv_init_action == InitAction::Respawn {
            if let Some(delay) = policy.respawn_delay_secs {
                // The process field contains shell metacharacters, so init
                // hands the whole line to `sh -c`; a plain suffix delays the
                // restart without re-quoting the opaque command line.
                process = format!("{process}; sleep {delay}");
            }
        }
        inittab.push_str(&format!(
            "::{}:{}\n",
            command.sysv_init_action.as_str(),
            process
        ));
    }

    let shutdown_hook = descriptor.shutdown_hook.as_deref().map(render_hook);
    if shutdown_hook.is_some() {
        // The hook runs exactly once, after the respawn processes have been
        // told to stop. A hung hook is killed after the timeout and shutdown
        // proceeds without it.
        inittab.push_str(&format!(
            "::shutdown:timeout {} {}\n",
            policy.shutdown_timeout_secs, HOOK_INSTALL_PATH
        ));
    }

    SupervisionTable {
        inittab,
        shutdown_hook,
    }
}

/// Wrap a shell line so it runs as `user`. Root commands run as-is; the
/// shell line is embedded verbatim either way.
fn run_as(user: &str, shell: &str) -> String {
    if user == "root" {
        shell.to_string()
    } else {
        format!("su -p {user} -c '{shell}'")
    }
}

fn render_hook(hook: &str) -> String {
    let mut script = String::from("#!/bin/sh\n");
    script.push_str(hook);
    if !hook.ends_with('\n') {
        script.push('\n');
    }
    script
}
