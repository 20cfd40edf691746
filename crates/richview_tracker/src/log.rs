use std::path::PathBuf;

use derive_setters::Setters;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

const DEFAULT_FILTER: &str = "richview=info";
const FILTER_ENV: &str = "RICHVIEW_LOG";

#[derive(Debug, Clone, Default, Setters)]
#[setters(into, strip_option)]
pub struct LogConfig {
    /// Directory for the daily rolling JSON log. Console only when unset.
    pub directory: Option<PathBuf>,
    /// Lowers the console level to `debug` when no filter is set.
    pub verbose: bool,
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| {
            if self.verbose {
                EnvFilter::new("richview=debug")
            } else {
                EnvFilter::new(DEFAULT_FILTER)
            }
        })
    }
}

/// Installs the global subscriber. The returned guard flushes the file writer
/// on drop and must outlive the program's logging.
pub fn init_tracing(config: LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(config.filter());

    let (file, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "richview.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(config.filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()?;

    tracing::debug!(directory = ?config.directory, "Logging initialised");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config_is_console_only() {
        let fixture = LogConfig::default();
        assert_eq!(fixture.directory, None);
        assert!(!fixture.verbose);
    }

    #[test]
    fn test_setters() {
        let actual = LogConfig::default().directory("/tmp/logs").verbose(true);
        assert_eq!(actual.directory, Some(PathBuf::from("/tmp/logs")));
        assert!(actual.verbose);
    }
}
