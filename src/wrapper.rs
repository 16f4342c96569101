//! Delegation to the external reference evaluator.
//!
//! Wrapper mode hands the original expression text to a jq-compatible binary
//! with stdin, stdout and stderr inherited, then reports its exit code. Nothing
//! is buffered or rewritten in between.

use std::io;
use std::process::{Command, ExitStatus};

use thiserror::Error;
use tracing::debug;

/// Used when neither `--wrapper-bin` nor `ZQ_WRAPPER` is set.
pub const DEFAULT_WRAPPER: &str = "jq";

/// Exit code reported when the wrapper could not run or died from a signal.
pub const WRAPPER_FAILURE: i32 = 2;

#[derive(Debug, Error)]
pub enum WrapperError {
    #[error("failed to run wrapper `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapper {
    pub program: String,
    pub slurp: bool,
    pub raw: bool,
}

impl Wrapper {
    pub fn new(program: impl Into<String>) -> Self {
        Wrapper {
            program: program.into(),
            slurp: false,
            raw: false,
        }
    }

    /// `-c [-s] [-r] [--] <expr>`. Compact output keeps both routes
    /// byte-compatible. An expression such as `-.a` would otherwise be read as
    /// an option, so it goes after `--`.
    pub fn args(&self, expr: &str) -> Vec<String> {
        let mut args = vec!["-c".to_string()];
        if self.slurp {
            args.push("-s".into());
        }
        if self.raw {
            args.push("-r".into());
        }
        if expr.starts_with('-') {
            args.push("--".into());
        }
        args.push(expr.to_string());
        args
    }

    /// Run the wrapper to completion and return the exit code zq should use.
    pub fn run(&self, expr: &str) -> Result<i32, WrapperError> {
        let args = self.args(expr);
        debug!(program = %self.program, ?args, "spawning wrapper");
        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|source| WrapperError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let code = exit_code(status);
        debug!(program = %self.program, code, "wrapper exited");
        Ok(code)
    }
}

/// The child's own code, or [`WRAPPER_FAILURE`] if it was killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(WRAPPER_FAILURE)
}
