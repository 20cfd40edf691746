mod config;
mod env;
mod error;

pub use config::*;
pub use env::*;
pub use error::*;
