//! NDJSON streaming driver for the native route.
//!
//! Input is read in windows; complete lines are split out with `memchr` and
//! evaluated one record at a time. A partial trailing line is carried into the
//! next window. Per-record output is staged in a [`RecordScope`] and only
//! written once the whole record evaluated cleanly.

use std::io::{ErrorKind, Read, Write};

use anyhow::{Context, Result};
use tracing::{debug, trace};

use crate::filter::eval::eval;
use crate::filter::{EvalError, Filter};
use crate::input::parse_line;
use crate::output::{OutputConfig, write_value};
use crate::strip_bom;
use crate::value::Value;

/// Initial read window. Grows when a single line does not fit.
const WINDOW_SIZE: usize = 64 * 1024;

/// Counters for one run, logged at the end of the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Lines that parsed as JSON and were evaluated.
    pub records: u64,
    /// Values written.
    pub outputs: u64,
    /// Malformed lines skipped.
    pub skipped: u64,
    /// Records dropped because evaluation failed.
    pub errors: u64,
}

/// Per-record buffers, cleared (capacity kept) after every record.
#[derive(Default)]
struct RecordScope {
    out: Vec<u8>,
    outputs: u64,
}

impl RecordScope {
    fn reset(&mut self) {
        self.out.clear();
        self.outputs = 0;
    }
}

/// Evaluate `filter` once per input line.
pub fn process_stream<R: Read, W: Write>(
    reader: &mut R,
    filter: &Filter,
    config: &OutputConfig,
    out: &mut W,
) -> Result<StreamStats> {
    let mut stats = StreamStats::default();
    let mut scope = RecordScope::default();
    let mut first_line = true;

    let mut buf = vec![0u8; WINDOW_SIZE];
    let mut carry_len = 0;

    loop {
        if carry_len == buf.len() {
            // One line fills the window: grow and keep reading.
            buf.resize(buf.len() * 2, 0);
        }
        let n = read_some(reader, &mut buf[carry_len..]).context("failed to read input")?;
        let data_len = carry_len + n;

        if n == 0 {
            // EOF: a final line without a trailing newline still counts.
            if data_len > 0 {
                let line = take_line(&buf[..data_len], &mut first_line);
                process_record(line, filter, config, &mut scope, &mut stats, out)?;
            }
            break;
        }

        let Some(last_nl) = memchr::memrchr(b'\n', &buf[carry_len..data_len]) else {
            carry_len = data_len;
            continue;
        };
        let process_len = carry_len + last_nl + 1;

        let mut start = 0;
        for pos in memchr::memchr_iter(b'\n', &buf[..process_len]) {
            let line = take_line(&buf[start..pos], &mut first_line);
            process_record(line, filter, config, &mut scope, &mut stats, out)?;
            start = pos + 1;
        }

        buf.copy_within(process_len..data_len, 0);
        carry_len = data_len - process_len;
    }

    log_summary(&stats);
    Ok(stats)
}

/// Collect every record into one array and evaluate `filter` once against it.
/// Empty input evaluates against `[]`.
pub fn process_slurp<R: Read, W: Write>(
    reader: &mut R,
    filter: &Filter,
    config: &OutputConfig,
    out: &mut W,
) -> Result<StreamStats> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data).context("failed to read input")?;

    let mut stats = StreamStats::default();
    let mut records = Vec::new();
    let mut first_line = true;
    let mut start = 0;
    let ends = memchr::memchr_iter(b'\n', &data).chain(std::iter::once(data.len()));
    for end in ends {
        if start > data.len() {
            break;
        }
        let line = take_line(&data[start..end], &mut first_line);
        start = end + 1;
        match parse_line(line) {
            Ok(Some(v)) => records.push(v),
            Ok(None) => {}
            Err(e) => {
                stats.skipped += 1;
                trace!(error = %e, "skipping malformed line");
            }
        }
    }
    stats.records = records.len() as u64;
    drop(data);

    let mut scope = RecordScope::default();
    let input = Value::Array(records);
    match eval_into(filter, &input, config, &mut scope) {
        Ok(()) => {
            out.write_all(&scope.out)?;
            stats.outputs = scope.outputs;
        }
        Err(e) => {
            stats.errors += 1;
            debug!(error = %e, "slurp evaluation failed");
        }
    }

    log_summary(&stats);
    Ok(stats)
}

/// Strip the BOM from the first line only.
fn take_line<'a>(line: &'a [u8], first_line: &mut bool) -> &'a [u8] {
    if std::mem::take(first_line) {
        strip_bom(line)
    } else {
        line
    }
}

fn process_record<W: Write>(
    line: &[u8],
    filter: &Filter,
    config: &OutputConfig,
    scope: &mut RecordScope,
    stats: &mut StreamStats,
    out: &mut W,
) -> Result<()> {
    let value = match parse_line(line) {
        Ok(Some(v)) => v,
        Ok(None) => return Ok(()),
        Err(e) => {
            stats.skipped += 1;
            trace!(error = %e, "skipping malformed line");
            return Ok(());
        }
    };
    stats.records += 1;

    match eval_into(filter, &value, config, scope) {
        Ok(()) => {
            out.write_all(&scope.out)?;
            stats.outputs += scope.outputs;
        }
        Err(e) => {
            stats.errors += 1;
            trace!(record = stats.records, error = %e, "dropping record");
        }
    }
    scope.reset();
    Ok(())
}

/// Evaluate into the scope's output buffer.
fn eval_into(
    filter: &Filter,
    input: &Value,
    config: &OutputConfig,
    scope: &mut RecordScope,
) -> Result<(), EvalError> {
    eval(filter, input, &mut |v| {
        scope.outputs += 1;
        write_value(&mut scope.out, &v, config).map_err(|e| EvalError::runtime(e.to_string()))
    })
}

/// One `read`, retrying on EINTR. Returns as soon as any bytes arrive so
/// records are processed while the producer is still writing.
fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn log_summary(stats: &StreamStats) {
    debug!(
        records = stats.records,
        outputs = stats.outputs,
        skipped = stats.skipped,
        errors = stats.errors,
        "end of stream"
    );
}
