use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

pub(crate) const TRACE_FILE_ENV: &str = "WARDEN_TRACE_FILE";

/// Guard that must be held alive for non-blocking writer flush on shutdown.
/// When dropped, buffered JSONL lines are flushed to disk.
pub(crate) struct TracingGuard {
    _guards: Vec<WorkerGuard>,
}

/// Initialize the layered tracing subscriber.
///
/// Layers:
/// 1. Console on stderr, filtered by `RUST_LOG` (default `console_default`).
///    Stdout is reserved for command output and session responses.
/// 2. JSONL file, activated by `WARDEN_TRACE_FILE`, filtered at `debug`
///
/// Returns a guard that must be held in `main()` to ensure buffered writes flush.
pub(crate) fn init(console_default: &str) -> TracingGuard {
    let mut guards = Vec::new();

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_default));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let jsonl_layer = if let Ok(trace_file) = std::env::var(TRACE_FILE_ENV) {
        let (dir, filename) = split_trace_path(&trace_file);
        let file_appender = tracing_appender::rolling::never(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);

        let jsonl_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        Some(
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_file(true)
                .with_line_number(true)
                .with_filter(jsonl_filter),
        )
    } else {
        None
    };

    Registry::default()
        .with(console_layer)
        .with(jsonl_layer)
        .init();

    TracingGuard { _guards: guards }
}

fn split_trace_path(trace_file: &str) -> (PathBuf, String) {
    let path = Path::new(trace_file);
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let filename = path.file_name().map_or_else(
        || "warden-traces.jsonl".to_owned(),
        |f| f.to_string_lossy().into_owned(),
    );
    (dir, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_path_splits_into_dir_and_file() {
        assert_eq!(
            split_trace_path("/var/log/warden/trace.jsonl"),
            (PathBuf::from("/var/log/warden"), "trace.jsonl".to_owned())
        );
        assert_eq!(
            split_trace_path("trace.jsonl"),
            (PathBuf::from("."), "trace.jsonl".to_owned())
        );
        assert_eq!(
            split_trace_path("/"),
            (PathBuf::from("."), "warden-traces.jsonl".to_owned())
        );
    }
}
