use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Threshold for {family} must be within [0, 1], got {value}")]
    InvalidThreshold { family: &'static str, value: f64 },

    #[error("Chart poll interval must be greater than zero")]
    ZeroPollInterval,
}
