use std::str::FromStr;
use std::sync::Once;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::Registry;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;

/// Installs the global subscriber. Logs go to stderr; stdout is reserved
/// for the benchmark report.
pub fn init_logging() -> WorkerGuard {
    let (stderr_write, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let log_level = std::env::var("GISTBENCH_LOG_LEVEL").unwrap_or("INFO".to_owned());
    let log_level = Level::from_str(log_level.as_str()).unwrap_or(Level::INFO);
    let stderr_layer = Layer::new()
        .with_writer(stderr_write.with_max_level(log_level))
        .with_target(false);

    let subscriber = Registry::default().with(stderr_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);

    stderr_guard
}

pub fn init_test_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        std::mem::forget(init_logging());
    });
}
