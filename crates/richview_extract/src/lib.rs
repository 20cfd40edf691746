mod chart;
mod literal;
mod table;

pub use chart::{ChartSpecExtractor, config_from_literal};
pub use literal::{matching_delimiter, parse_float_prefix};
pub use table::TableDataExtractor;
