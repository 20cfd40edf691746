mod cli;
mod run;

pub use cli::{ChartArgs, Cli, Command, InputArgs, RenderArgs};
pub use run::{read_input, run, write_charts, write_downloads};
