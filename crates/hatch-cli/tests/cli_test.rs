//! Drives the `hatch` binary end to end.
//!
//! Runs keep the jail as a plain directory and skip the PID namespace so
//! they work without privileges.

#![allow(clippy::expect_used, clippy::unwrap_used)]

#[path = "../../hatch-image/tests/support/mod.rs"]
mod support;

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use support::FixtureRegistry;

struct Env {
    dir: tempfile::TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let etc = dir.path().join("etc");
        fs::create_dir_all(&etc).expect("mkdir etc");
        fs::write(etc.join("hostname"), "cli-test\n").expect("write");
        fs::create_dir_all(dir.path().join("jails")).expect("mkdir jails");
        Self { dir }
    }

    fn jails(&self) -> PathBuf {
        self.dir.path().join("jails")
    }

    fn hatch(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_hatch"));
        let _ = cmd
            .env_remove("HATCH_CONFIG")
            .env_remove("HATCH_REGISTRY")
            .env_remove("HATCH_AUTH_URL")
            .env("RUST_LOG", "warn")
            .env("HATCH_TEMP_ROOT", self.jails())
            .env("HATCH_ETC_SOURCE", self.dir.path().join("etc"));
        cmd
    }

    fn run(&self, extra: &[&str], command: &[&str]) -> Output {
        self.hatch()
            .arg("run")
            .args(["--no-root-switch", "--no-pid-namespace"])
            .args(extra)
            .args(command)
            .output()
            .expect("spawn hatch")
    }

    fn jail_count(&self) -> usize {
        fs::read_dir(self.jails()).expect("read_dir").count()
    }
}

#[test]
fn exit_code_of_the_child_is_the_exit_code_of_hatch() {
    let env = Env::new();
    let output = env.run(&[], &["/bin/sh", "-c", "exit 42"]);
    assert_eq!(output.status.code(), Some(42));
    assert_eq!(env.jail_count(), 0);
}

#[test]
fn child_stdout_passes_through_untouched() {
    let env = Env::new();
    let output = env.run(&[], &["echo", "hello from the jail"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello from the jail\n");
}

#[test]
fn child_sees_seeded_etc() {
    let env = Env::new();
    let output = env.run(&[], &["cat", "etc/hostname"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "cli-test\n");
}

#[test]
fn unknown_command_is_a_fatal_error() {
    let env = Env::new();
    let output = env.run(&[], &["hatch-no-such-command"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to run hatch-no-such-command"), "{stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn image_contents_replace_the_jail_view() {
    let layers = vec![
        support::layer(&[("etc/motd", b"base\n")]),
        support::layer(&[("etc/motd", b"welcome\n")]),
    ];
    let registry = FixtureRegistry::start(support::image_routes("alpine", &layers));
    let env = Env::new();

    let output = env
        .hatch()
        .args(["--registry", registry.url(), "--auth-url", registry.url()])
        .args(["run", "--no-root-switch", "--no-pid-namespace", "--image", "alpine"])
        .args(["cat", "etc/motd"])
        .output()
        .expect("spawn hatch");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "welcome\n");
    assert_eq!(env.jail_count(), 0);
}

#[test]
fn inspect_lists_layers_in_order() {
    let layers = vec![
        support::layer(&[("a", b"1")]),
        support::layer(&[("b", b"2")]),
    ];
    let registry = FixtureRegistry::start(support::image_routes("alpine", &layers));
    let env = Env::new();

    let output = env
        .hatch()
        .env("HATCH_REGISTRY", registry.url())
        .env("HATCH_AUTH_URL", registry.url())
        .args(["inspect", "alpine"])
        .output()
        .expect("spawn hatch");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout
        .find(&support::digest_of(&layers[0]).to_string())
        .expect("first layer listed");
    let second = stdout
        .find(&support::digest_of(&layers[1]).to_string())
        .expect("second layer listed");
    assert!(first < second);
    assert!(stdout.starts_with("library/alpine:latest\n"));
    assert!(stdout.contains("2 layers"));
}

#[test]
fn invalid_image_reference_is_a_usage_error() {
    let env = Env::new();
    let output = env.run(&["--image", "UPPER"], &["true"]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(env.jail_count(), 0);
}
