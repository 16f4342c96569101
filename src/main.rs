use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use zq::output::{OutputConfig, OutputMode};
use zq::router::{Route, RouteMode};
use zq::wrapper::{DEFAULT_WRAPPER, WRAPPER_FAILURE, Wrapper, WrapperError};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(
    name = "zq",
    about = "Streaming jq-compatible filter for NDJSON",
    version
)]
struct Cli {
    /// jq filter expression
    expression: String,

    /// Collect the whole input stream into one array before evaluating
    #[arg(short = 's', long)]
    slurp: bool,

    /// Raw output (strings without quotes)
    #[arg(short = 'r', long = "raw-output")]
    raw: bool,

    /// Compact output; accepted for jq compatibility, output is always compact
    #[arg(short = 'c', long = "compact-output")]
    #[allow(dead_code)]
    compact: bool,

    /// Always delegate to the reference evaluator
    #[arg(long, conflicts_with = "native")]
    wrapper: bool,

    /// Never delegate; fail if the expression needs the reference evaluator
    #[arg(long)]
    native: bool,

    /// Reference evaluator binary used in wrapper mode
    #[arg(long = "wrapper-bin", env = "ZQ_WRAPPER", default_value = DEFAULT_WRAPPER)]
    wrapper_bin: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        // Downstream closed early (`zq ... | head`): not an error.
        Err(e) if is_broken_pipe(&e) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("zq: error: {e:#}");
            ExitCode::from(failure_code(&e))
        }
    }
}

/// Logging goes to stderr, filtered by `ZQ_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("ZQ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<u8> {
    let filter = zq::filter::parse(&cli.expression)
        .with_context(|| format!("invalid expression: {}", cli.expression))?;

    let mode = if cli.wrapper {
        RouteMode::ForceWrapper
    } else if cli.native {
        RouteMode::ForceNative
    } else {
        RouteMode::Auto
    };
    let decision = zq::router::route(&filter, mode)?;
    debug!(route = ?decision.route, reason = decision.reason.as_deref(), "routing decision");

    if decision.route == Route::Wrapper {
        let wrapper = Wrapper {
            program: cli.wrapper_bin.clone(),
            slurp: cli.slurp,
            raw: cli.raw,
        };
        let code = wrapper.run(&cli.expression)?;
        return Ok(u8::try_from(code).unwrap_or(WRAPPER_FAILURE as u8));
    }

    let config = OutputConfig {
        mode: if cli.raw {
            OutputMode::Raw
        } else {
            OutputMode::Compact
        },
    };

    let mut stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    let mut out = BufWriter::with_capacity(128 * 1024, stdout);

    if cli.slurp {
        zq::ndjson::process_slurp(&mut stdin, &filter, &config, &mut out)?;
    } else {
        zq::ndjson::process_stream(&mut stdin, &filter, &config, &mut out)?;
    }
    out.flush().context("failed to flush output")?;
    Ok(0)
}

/// A wrapper that could not start exits 2; expression, routing and I/O
/// failures exit 1.
fn failure_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<WrapperError>().is_some() {
        WRAPPER_FAILURE as u8
    } else {
        1
    }
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}
