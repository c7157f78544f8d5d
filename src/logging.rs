use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, fmt::time::LocalTime, layer::SubscriberExt, EnvFilter};

pub const LOG_FILE: &str = "annotator.log";

const DEFAULT_FILTER: &str = "child_annotator=debug,warn";

/// Logs go to stderr and to `annotator.log` in the working directory.
///
/// The returned guard flushes the file writer on drop, keep it alive for the
/// whole run.
pub fn init_logs() -> Option<WorkerGuard> {
    let file_appender = tracing_appender::rolling::never(".", LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(LocalTime::rfc_3339())
                .with_target(false),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false),
        );

    /// eframe and winit log through the `log` crate
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to install log bridge: {}", e);
    }

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return None;
    }

    Some(guard)
}
