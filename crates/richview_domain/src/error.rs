use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("Chart has no labels")]
    EmptyChart,

    #[error("Dataset {index} has {actual} values but the chart has {expected} labels")]
    DatasetLength {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Chart has no datasets")]
    NoDatasets,

    #[error("Unsupported chart type: {0}")]
    UnsupportedChartType(String),

    #[error("Unknown output format: {0}")]
    UnknownOutputFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
