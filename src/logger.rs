//! File-backed tracing setup for the CLI build. Stdout carries protocol
//! text only, so diagnostics go to a log file through a non-blocking
//! writer.

use once_cell::sync::OnceCell;
use std::fs::OpenOptions;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt};

/// Holding the writer guard keeps the background thread flushing for
/// the process lifetime; it also marks logging as installed.
static LOG_WRITER: OnceCell<WorkerGuard> = OnceCell::new();

/// Installs the process-wide subscriber once; repeat calls are no-ops.
/// `RUST_LOG` takes precedence over `filter`, and both fall back to
/// `info` when malformed. If the log file cannot be opened the engine
/// runs unlogged rather than refusing to start.
pub fn init_logging<P: AsRef<Path>>(path: P, filter: &str) {
    let path = path.as_ref();
    let result = LOG_WRITER.get_or_try_init(|| -> Result<WorkerGuard, String> {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| format!("cannot open log file {}: {}", path.display(), err))?;
        let (writer, guard) = tracing_appender::non_blocking(file);

        let env_filter = std::env::var("RUST_LOG")
            .ok()
            .and_then(|spec| EnvFilter::try_new(spec).ok())
            .or_else(|| EnvFilter::try_new(filter).ok())
            .unwrap_or_else(|| EnvFilter::new("info"));

        let subscriber = fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer)
            .finish();
        // Another subscriber may already be installed (tests); the file
        // writer stays alive either way.
        let _ = tracing::subscriber::set_global_default(subscriber);
        Ok(guard)
    });

    if let Err(err) = result {
        eprintln!("{}", err);
    }
}
