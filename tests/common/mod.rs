//! Shared helpers for the CLI tests: spawn the built `zq` binary, feed it
//! stdin, and capture everything it writes.
#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

pub struct Run {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl Run {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<Output> for Run {
    fn from(output: Output) -> Self {
        Run {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        }
    }
}

/// A `zq` command with the environment scrubbed of settings that would
/// change routing or logging.
pub fn zq_command() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_zq"));
    cmd.env_remove("ZQ_WRAPPER").env_remove("ZQ_LOG");
    cmd
}

/// Run `cmd` with `input` on stdin.
pub fn run_with_input(mut cmd: Command, input: &[u8]) -> Run {
    let output = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            // The child may exit without reading everything.
            let _ = child.stdin.take().unwrap().write_all(input);
            child.wait_with_output()
        })
        .expect("failed to run zq");
    output.into()
}

/// `zq <args...>` with `input` on stdin.
pub fn zq(args: &[&str], input: &str) -> Run {
    let mut cmd = zq_command();
    cmd.args(args);
    run_with_input(cmd, input.as_bytes())
}

/// Run `zq` and require a zero exit, returning stdout.
pub fn zq_ok(args: &[&str], input: &str) -> String {
    let run = zq(args, input);
    assert!(
        run.success(),
        "zq {args:?} exited with {:?}: stderr={}",
        run.code,
        run.stderr
    );
    run.stdout
}

/// Write an executable shell script into `dir` and return its path.
#[cfg(unix)]
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn jq_available() -> bool {
    Command::new("jq")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
