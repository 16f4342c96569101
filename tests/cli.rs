//! CLI surface tests: routing flags, wrapper delegation, exit codes, logging
//! and pipe handling. Wrapper tests use a stub shell script in place of jq.
mod common;

use common::{run_with_input, zq, zq_command};

#[test]
fn wrapper_and_native_conflict() {
    let run = zq(&["--wrapper", "--native", "."], "1\n");
    // clap usage errors exit 2
    assert_eq!(run.code, Some(2));
    assert!(run.stderr.contains("--native"), "stderr={}", run.stderr);
}

#[test]
fn expression_is_required() {
    let run = zq(&[], "1\n");
    assert!(!run.success());
    assert_eq!(run.stdout, "");
}

#[test]
fn missing_wrapper_binary_exits_2() {
    let run = zq(
        &["--wrapper-bin", "/nonexistent/zq-test-wrapper", ".. | numbers"],
        "1\n",
    );
    assert_eq!(run.code, Some(2));
    assert!(run.stderr.starts_with("zq: error:"), "stderr={}", run.stderr);
    assert!(run.stderr.contains("/nonexistent/zq-test-wrapper"));
}

#[test]
fn native_expressions_never_touch_the_wrapper() {
    let run = zq(&["--wrapper-bin", "/nonexistent/zq-test-wrapper", ".a"], "{\"a\":1}\n");
    assert!(run.success(), "stderr={}", run.stderr);
    assert_eq!(run.stdout, "1\n");
}

#[test]
fn debug_logging_reports_route_and_summary() {
    let mut cmd = zq_command();
    cmd.env("ZQ_LOG", "debug").arg(".a");
    let run = run_with_input(cmd, b"{\"a\":1}\nbad\n");
    assert!(run.success());
    assert_eq!(run.stdout, "1\n");
    assert!(run.stderr.contains("routing decision"), "stderr={}", run.stderr);
    assert!(run.stderr.contains("end of stream"), "stderr={}", run.stderr);
    assert!(run.stderr.contains("skipped=1"), "stderr={}", run.stderr);
}

#[test]
fn default_logging_is_quiet() {
    let run = zq(&[".a"], "{\"a\":1}\nbad\n{\"a\":\"x\"}\n");
    assert!(run.success());
    assert_eq!(run.stderr, "");
}

#[cfg(unix)]
mod wrapper {
    use super::common::{jq_available, run_with_input, script, zq_command};
    use std::process::Command;

    /// Stub that prints each argument on its own line.
    fn echo_args(dir: &std::path::Path) -> std::path::PathBuf {
        script(dir, "echo-args", "cat > /dev/null\nprintf '%s\\n' \"$@\"")
    }

    fn zq_with(wrapper: &std::path::Path, args: &[&str], input: &str) -> super::common::Run {
        let mut cmd = zq_command();
        cmd.arg("--wrapper-bin").arg(wrapper).args(args);
        run_with_input(cmd, input.as_bytes())
    }

    #[test]
    fn unsupported_expression_is_delegated() {
        let dir = tempfile::tempdir().unwrap();
        let stub = echo_args(dir.path());
        let run = zq_with(&stub, &["reduce .[] as $x (0; . + $x)"], "[1,2]\n");
        assert!(run.success(), "stderr={}", run.stderr);
        assert_eq!(run.stdout, "-c\nreduce .[] as $x (0; . + $x)\n");
    }

    #[test]
    fn flags_are_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let stub = echo_args(dir.path());
        let run = zq_with(&stub, &["-s", "-r", "--wrapper", ".a"], "{}\n");
        assert!(run.success(), "stderr={}", run.stderr);
        assert_eq!(run.stdout, "-c\n-s\n-r\n.a\n");
    }

    #[test]
    fn expression_text_is_passed_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let stub = echo_args(dir.path());
        let expr = r#".[] |   test("a b")  "#;
        let run = zq_with(&stub, &[expr], "[]\n");
        assert_eq!(run.stdout, format!("-c\n{expr}\n"));
    }

    #[test]
    fn leading_hyphen_expression_is_not_an_option() {
        let dir = tempfile::tempdir().unwrap();
        let stub = echo_args(dir.path());
        let expr = r#"-.a | test("x")"#;
        let run = zq_with(&stub, &["--", expr], "{}\n");
        assert!(run.success(), "stderr={}", run.stderr);
        assert_eq!(run.stdout, format!("-c\n--\n{expr}\n"));
    }

    #[test]
    fn two_argument_recurse_is_delegated() {
        let dir = tempfile::tempdir().unwrap();
        let stub = echo_args(dir.path());
        let expr = "recurse(.a; . != null)";
        let run = zq_with(&stub, &[expr], "{\"a\":{}}\n");
        assert!(run.success(), "stderr={}", run.stderr);
        assert_eq!(run.stdout, format!("-c\n{expr}\n"));
    }

    #[test]
    fn stdin_is_inherited() {
        let dir = tempfile::tempdir().unwrap();
        let stub = script(dir.path(), "cat-stdin", "cat");
        let input = "{\"a\":1}\nnot json\n";
        let run = zq_with(&stub, &["--wrapper", "."], input);
        assert!(run.success());
        assert_eq!(run.stdout, input);
    }

    #[test]
    fn wrapper_exit_code_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let stub = script(dir.path(), "exit-5", "echo 'wrapper failed' >&2\nexit 5");
        let run = zq_with(&stub, &["--wrapper", "."], "");
        assert_eq!(run.code, Some(5));
        assert_eq!(run.stderr, "wrapper failed\n");
    }

    #[test]
    fn wrapper_killed_by_signal_exits_2() {
        let dir = tempfile::tempdir().unwrap();
        let stub = script(dir.path(), "self-kill", "kill -9 $$");
        let run = zq_with(&stub, &["--wrapper", "."], "");
        assert_eq!(run.code, Some(2));
    }

    #[test]
    fn wrapper_from_environment() {
        let dir = tempfile::tempdir().unwrap();
        let stub = echo_args(dir.path());
        let mut cmd = zq_command();
        cmd.env("ZQ_WRAPPER", &stub).args(["--wrapper", "."]);
        let run = run_with_input(cmd, b"");
        assert!(run.success());
        assert_eq!(run.stdout, "-c\n.\n");
    }

    #[test]
    fn wrapper_route_matches_native_route() {
        if !jq_available() {
            eprintln!("jq not on PATH, skipping");
            return;
        }
        let jq = Command::new("sh")
            .args(["-c", "command -v jq"])
            .output()
            .unwrap();
        let jq = String::from_utf8(jq.stdout).unwrap();
        let jq = std::path::Path::new(jq.trim());
        let input = "{\"name\":\"a\",\"v\":3,\"tags\":[\"x\",\"y\"]}\n\
                     {\"name\":\"b\",\"v\":150,\"tags\":[]}\n";
        for expr in [
            ".name",
            "select(.v > 100)",
            ".tags[]",
            "{name, n: (.tags | length)}",
            "[.v, .v * 2] | add",
            ".missing // \"default\"",
            "to_entries | map(.key) | join(\",\")",
        ] {
            let native = zq_with(jq, &["--native", expr], input);
            let wrapped = zq_with(jq, &["--wrapper", expr], input);
            assert_eq!(native.stdout, wrapped.stdout, "{expr}");
            assert_eq!(native.code, wrapped.code, "{expr}");
        }
    }
}

#[cfg(unix)]
#[test]
fn closed_stdout_is_a_clean_exit() {
    use std::io::{BufRead, BufReader, Write};
    use std::process::Stdio;

    let mut child = zq_command()
        .arg(".")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut stdin = child.stdin.take().unwrap();
    let feeder = std::thread::spawn(move || {
        let line = format!("{{\"payload\":\"{}\"}}\n", "x".repeat(200));
        for _ in 0..50_000 {
            if stdin.write_all(line.as_bytes()).is_err() {
                break;
            }
        }
    });

    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut first = String::new();
    stdout.read_line(&mut first).unwrap();
    assert!(first.starts_with("{\"payload\":"));
    drop(stdout);

    let output = child.wait_with_output().unwrap();
    feeder.join().unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stderr), "");
}
