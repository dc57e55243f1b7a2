//! Subscriber setup for the binary: one stdout layer picked from the CLI flags, plus
//! a JSON file per run under the promptbench log directory.

use std::io::{self, Write};

use anyhow::{Context as AnyhowContext, Result};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    filter::LevelFilter,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use promptbench::paths;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StdoutFormat {
    Human,
    Json,
    PrettyJson,
}

impl StdoutFormat {
    pub fn from_flags(log_json: bool, pretty: bool) -> Self {
        match (log_json, pretty) {
            (true, true) => Self::PrettyJson,
            (true, false) => Self::Json,
            (false, _) => Self::Human,
        }
    }
}

/// Installs the global subscriber. The returned guard flushes the run log on drop,
/// so `main` keeps it alive for the whole process.
pub fn init(verbose: bool, format: StdoutFormat, run_id: &str) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));
    let mut layers = vec![stdout_layer(verbose, format, filter)];

    let guard = match run_log_layer(run_id) {
        Ok((layer, guard)) => {
            layers.push(layer);
            Some(guard)
        }
        Err(err) => {
            eprintln!("Warning: run log disabled: {err:#}");
            None
        }
    };

    tracing_subscriber::registry().with(layers).init();
    guard
}

fn stdout_layer(verbose: bool, format: StdoutFormat, filter: EnvFilter) -> BoxedLayer {
    match format {
        StdoutFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stdout)
            .with_filter(filter)
            .boxed(),
        StdoutFormat::PrettyJson => fmt::layer()
            .json()
            .with_writer(PrettyStdout)
            .with_filter(filter)
            .boxed(),
        StdoutFormat::Human if verbose => fmt::layer()
            .with_writer(io::stdout)
            .with_filter(filter)
            .boxed(),
        StdoutFormat::Human => fmt::layer()
            .with_writer(io::stdout)
            .without_time()
            .with_target(false)
            .with_filter(filter)
            .boxed(),
    }
}

/// Debug-level JSON events to `<log dir>/run-<id>.log`, written off-thread.
fn run_log_layer(run_id: &str) -> Result<(BoxedLayer, WorkerGuard)> {
    let dir = paths::log_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create {}", dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(format!("run-{run_id}"))
        .filename_suffix("log")
        .build(&dir)
        .with_context(|| format!("cannot open run log in {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .json()
        .with_writer(writer)
        .with_filter(LevelFilter::DEBUG)
        .boxed();
    Ok((layer, guard))
}

fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("promptbench=debug,reqwest=info,hyper=info,info")
    } else {
        // Quiet enough that `--json` command output stays machine-readable.
        EnvFilter::new("promptbench=warn,warn")
    }
}

struct PrettyStdout;

impl<'a> MakeWriter<'a> for PrettyStdout {
    type Writer = PrettyEvent<io::Stdout>;

    fn make_writer(&'a self) -> Self::Writer {
        PrettyEvent::new(io::stdout())
    }
}

/// Collects one formatted event and emits it re-indented when dropped. Anything
/// that is not a JSON document passes through unchanged.
struct PrettyEvent<W: Write> {
    buf: Vec<u8>,
    out: W,
}

impl<W: Write> PrettyEvent<W> {
    fn new(out: W) -> Self {
        Self {
            buf: Vec::new(),
            out,
        }
    }
}

impl<W: Write> Write for PrettyEvent<W> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Drop for PrettyEvent<W> {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let pretty = serde_json::from_slice::<serde_json::Value>(&self.buf)
            .ok()
            .and_then(|value| serde_json::to_string_pretty(&value).ok());
        let written = match pretty {
            Some(text) => writeln!(self.out, "{text}"),
            None => self.out.write_all(&self.buf),
        };
        if written.is_ok() {
            let _ = self.out.flush();
        }
    }
}
