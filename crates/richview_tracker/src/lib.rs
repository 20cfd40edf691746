mod log;

pub use log::{LogConfig, init_tracing};
pub use tracing_appender::non_blocking::WorkerGuard;
