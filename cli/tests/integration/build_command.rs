//! End-to-end build tests: artifact layout, exit-code taxonomy, rollback.

#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn build_image() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("build-image"));
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Write a descriptor into a fresh temp dir; returns (guard, descriptor, out).
fn setup(yaml: &str) -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let descriptor = dir.path().join("image.yaml");
    std::fs::write(&descriptor, yaml).expect("write descriptor");
    let out = dir.path().join("out");
    (dir, descriptor, out)
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}

const FULL: &str = "\
commands:
  - name: cgconfig
    user: root
    sysvInitAction: sysinit
    shell: 'cgconfigparser -l /etc/cgconfig.conf -s 1664'
  - name: pgbouncer
    user: postgres
    sysvInitAction: respawn
    shell: '/usr/local/bin/pgbouncer /etc/pgbouncer.ini'
shutdownHook: |
  su -p postgres --session-command 'pg_ctl stop -m fast'
files:
  - filename: pgbouncer.ini
    content: \"[databases]\\n*=host=localhost port=5432\\n\"
build: |
  FROM debian:bookworm-slim AS pgbouncer
  RUN apt-get update && apt-get install -y pgbouncer
merge: |
  COPY --from=pgbouncer /usr/sbin/pgbouncer /usr/local/bin/pgbouncer
";

#[test]
fn valid_descriptor_produces_the_full_artifact_set() {
    let (_guard, descriptor, out) = setup(FULL);
    build_image().arg(&descriptor).arg(&out).assert().success();

    assert!(out.join("etc/inittab").is_file());
    assert!(out.join("bin/shutdown-hook").is_file());
    assert!(out.join("files/pgbouncer.ini").is_file());
    assert!(out.join("Dockerfile").is_file());
    assert!(out.join("manifest.json").is_file());
}

#[test]
fn inittab_keeps_document_order_and_wraps_users() {
    let (_guard, descriptor, out) = setup(FULL);
    build_image().arg(&descriptor).arg(&out).assert().success();

    let inittab = read(&out.join("etc/inittab"));
    let sysinit = inittab.find("::sysinit:cgconfigparser").expect("sysinit entry");
    let respawn = inittab
        .find("::respawn:su -p postgres -c '/usr/local/bin/pgbouncer /etc/pgbouncer.ini'")
        .expect("respawn entry");
    let shutdown = inittab
        .find("::shutdown:timeout 10 /usr/local/bin/shutdown-hook")
        .expect("shutdown entry");
    assert!(sysinit < respawn && respawn < shutdown);
}

#[test]
fn materialized_file_roundtrips_byte_for_byte() {
    let yaml = "\
files:
  - filename: a.conf
    content: \"x=1\\n\"
build: ''
merge: ''
";
    let (_guard, descriptor, out) = setup(yaml);
    build_image().arg(&descriptor).arg(&out).assert().success();
    let bytes = std::fs::read(out.join("files/a.conf")).expect("read back");
    assert_eq!(bytes, b"x=1\n");
}

#[test]
fn recipe_splices_build_and_merge_around_the_final_stage() {
    let (_guard, descriptor, out) = setup(FULL);
    build_image().arg(&descriptor).arg(&out).assert().success();

    let recipe = read(&out.join("Dockerfile"));
    let build = recipe.find("AS pgbouncer").expect("build blob");
    let final_stage = recipe.find("AS final").expect("final stage");
    let copy = recipe
        .find("COPY --chmod=0644 files/pgbouncer.ini /etc/pgbouncer.ini")
        .expect("file copy");
    let merge = recipe.find("--from=pgbouncer").expect("merge blob");
    assert!(build < final_stage && final_stage < copy && copy < merge);
}

#[test]
fn manifest_lists_every_artifact_with_digests() {
    let (_guard, descriptor, out) = setup(FULL);
    build_image().arg(&descriptor).arg(&out).assert().success();

    let manifest: serde_json::Value =
        serde_json::from_str(&read(&out.join("manifest.json"))).expect("valid json");
    let paths: Vec<&str> = manifest["artifacts"]
        .as_array()
        .expect("artifact list")
        .iter()
        .map(|a| a["path"].as_str().expect("path"))
        .collect();
    for expected in [
        "etc/inittab",
        "bin/shutdown-hook",
        "files/pgbouncer.ini",
        "Dockerfile",
    ] {
        assert!(paths.contains(&expected), "missing {expected} in {paths:?}");
    }
    assert_eq!(manifest["descriptor_sha256"].as_str().expect("digest").len(), 64);
}

#[test]
fn duplicate_command_name_exits_2_and_writes_nothing() {
    let yaml = "\
commands:
  - { name: a, user: root, sysvInitAction: respawn, shell: 'true' }
  - { name: a, user: root, sysvInitAction: respawn, shell: 'false' }
build: ''
merge: ''
";
    let (_guard, descriptor, out) = setup(yaml);
    build_image()
        .arg(&descriptor)
        .arg(&out)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("duplicate command name 'a'"));
    assert!(!out.exists(), "no artifacts may be written");
}

#[test]
fn duplicate_filename_exits_2() {
    let yaml = "\
files:
  - { filename: a.conf, content: 'x' }
  - { filename: a.conf, content: 'y' }
build: ''
merge: ''
";
    let (_guard, descriptor, out) = setup(yaml);
    build_image()
        .arg(&descriptor)
        .arg(&out)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("duplicate file name 'a.conf'"));
    assert!(!out.exists());
}

#[test]
fn unknown_stage_reference_exits_3_and_emits_no_recipe() {
    let yaml = "\
build: |
  FROM debian:bookworm-slim AS tools
merge: |
  COPY --from=ghost /bin/tool /bin/tool
";
    let (_guard, descriptor, out) = setup(yaml);
    build_image()
        .arg(&descriptor)
        .arg(&out)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unknown build stage 'ghost'"));
    assert!(!out.exists(), "no recipe may be emitted");
}

#[test]
fn rerun_is_idempotent_for_all_build_artifacts() {
    let (_guard, descriptor, out) = setup(FULL);
    build_image().arg(&descriptor).arg(&out).assert().success();

    let artifacts = [
        "etc/inittab",
        "bin/shutdown-hook",
        "files/pgbouncer.ini",
        "Dockerfile",
    ];
    let first: Vec<Vec<u8>> = artifacts
        .iter()
        .map(|p| std::fs::read(out.join(p)).expect("read"))
        .collect();

    build_image().arg(&descriptor).arg(&out).assert().success();
    for (path, before) in artifacts.iter().zip(&first) {
        let after = std::fs::read(out.join(path)).expect("read");
        assert_eq!(&after, before, "{path} changed across reruns");
    }
}

// The scenario from the supervision contract: one gate, one service, one hook.
#[test]
fn gate_service_hook_scenario_renders_the_expected_table() {
    let yaml = "\
commands:
  - { name: prepare, user: root, sysvInitAction: sysinit, shell: 'exit 0' }
  - { name: service, user: root, sysvInitAction: respawn, shell: 'sleep infinity' }
shutdownHook: 'echo done'
build: ''
merge: ''
";
    let (_guard, descriptor, out) = setup(yaml);
    build_image().arg(&descriptor).arg(&out).assert().success();

    let inittab = read(&out.join("etc/inittab"));
    let entries: Vec<&str> = inittab.lines().filter(|l| l.starts_with("::")).collect();
    assert_eq!(
        entries,
        [
            "::sysinit:exit 0",
            "::respawn:sleep infinity",
            "::shutdown:timeout 10 /usr/local/bin/shutdown-hook",
        ]
    );
    assert_eq!(read(&out.join("bin/shutdown-hook")), "#!/bin/sh\necho done\n");
}

#[test]
fn shutdown_timeout_env_override_is_honored() {
    let yaml = "shutdownHook: 'echo done'\nbuild: ''\nmerge: ''\n";
    let (_guard, descriptor, out) = setup(yaml);
    build_image()
        .env("VMIMAGE_SHUTDOWN_TIMEOUT_SECS", "42")
        .arg(&descriptor)
        .arg(&out)
        .assert()
        .success();
    assert!(read(&out.join("etc/inittab")).contains("::shutdown:timeout 42 "));
}

#[test]
fn malformed_env_override_fails_instead_of_falling_back() {
    let yaml = "build: ''\nmerge: ''\n";
    let (_guard, descriptor, out) = setup(yaml);
    build_image()
        .env("VMIMAGE_SHUTDOWN_TIMEOUT_SECS", "soon")
        .arg(&descriptor)
        .arg(&out)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("VMIMAGE_SHUTDOWN_TIMEOUT_SECS"));
    assert!(!out.exists());
}

#[test]
fn base_image_env_override_reaches_the_recipe() {
    let yaml = "build: ''\nmerge: ''\n";
    let (_guard, descriptor, out) = setup(yaml);
    build_image()
        .env("VMIMAGE_BASE_IMAGE", "alpine:3.20")
        .arg(&descriptor)
        .arg(&out)
        .assert()
        .success();
    assert!(read(&out.join("Dockerfile")).contains("FROM alpine:3.20 AS final"));
}
