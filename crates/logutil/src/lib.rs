//! Shared logging setup.
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    HumanReadable,
    Json,
}

static INIT: Once = Once::new();

/// Configure the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`. Only the first call has
/// an effect, later calls (e.g. from multiple tests) are ignored.
pub fn configure_global_logger(default_level: Level, format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy();

        let builder = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_ids(true);

        let result = match format {
            LogFormat::HumanReadable => tracing::subscriber::set_global_default(builder.finish()),
            LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        };

        // Someone else already installed a subscriber. Keep theirs.
        if let Err(e) = result {
            tracing::debug!(%e, "global subscriber already set");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_twice() {
        configure_global_logger(Level::DEBUG, LogFormat::HumanReadable);
        configure_global_logger(Level::TRACE, LogFormat::Json);
        tracing::debug!("still logging");
    }
}
