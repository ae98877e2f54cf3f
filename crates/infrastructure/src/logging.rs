use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ConfigError, LogFormat, LogLevel};

/// Wire up the router daemon's tracing output on stdout.
///
/// The filter honors `RUST_LOG` when present, so an operator can turn
/// individual targets up or down without touching the snapshot file;
/// otherwise the configured level applies across the board.
///
/// `LogFormat::Json` emits one flattened object per event for log
/// shippers; `LogFormat::Text` is the colored development format.
/// Call once at startup, before the first packet is processed.
pub fn init_logging(level: LogLevel, format: LogFormat) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::new(level.as_str()),
    };
    let base = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false);
            base.with(layer).init();
        }
        LogFormat::Text => {
            base.with(fmt::layer().pretty().with_ansi(true).with_target(true))
                .init();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_maps_to_a_parsable_directive() {
        let levels = [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ];
        for level in levels {
            assert!(EnvFilter::try_new(level.as_str()).is_ok(), "{level:?}");
        }
    }
}
