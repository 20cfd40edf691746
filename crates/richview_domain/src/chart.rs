use derive_getters::Getters;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::{Error, Result, TableData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ChartKind {
    Pie,
    Doughnut,
    Bar,
    Line,
}

impl ChartKind {
    /// Slices rather than axes.
    pub fn is_radial(&self) -> bool {
        matches!(self, ChartKind::Pie | ChartKind::Doughnut)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default, Setters)]
#[setters(into, strip_option)]
pub struct Dataset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
}

impl Dataset {
    pub fn new(values: Vec<f64>) -> Self {
        Self { label: None, values, colors: None }
    }
}

/// Canonical description of a chart, independent of how it was derived.
///
/// Construction validates that every dataset has exactly one value per
/// label, so a `ChartConfig` that exists is always renderable.
#[derive(Debug, Clone, PartialEq, Serialize, Getters)]
pub struct ChartConfig {
    kind: ChartKind,
    labels: Vec<String>,
    datasets: Vec<Dataset>,
    options: serde_json::Value,
}

impl ChartConfig {
    pub fn new(kind: ChartKind, labels: Vec<String>, datasets: Vec<Dataset>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::EmptyChart);
        }
        if datasets.is_empty() {
            return Err(Error::NoDatasets);
        }
        if let Some((index, dataset)) = datasets
            .iter()
            .enumerate()
            .find(|(_, d)| d.values.len() != labels.len())
        {
            return Err(Error::DatasetLength {
                index,
                expected: labels.len(),
                actual: dataset.values.len(),
            });
        }
        Ok(Self { kind, labels, datasets, options: serde_json::Value::Null })
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }

    /// Pie chart with one slice per distinct second-column value of a
    /// chartable table.
    pub fn from_table(table: &TableData) -> Option<Self> {
        if !table.is_chartable() {
            return None;
        }
        let tally = table.category_frequencies();
        let labels: Vec<String> = tally.keys().cloned().collect();
        let values: Vec<f64> = tally.values().map(|count| *count as f64).collect();
        let dataset = Dataset::new(values).label(table.headers()[1].clone());
        Self::new(ChartKind::Pie, labels, vec![dataset]).ok()
    }

    /// Sum of the first dataset, used for radial slice angles.
    pub fn total(&self) -> f64 {
        self.datasets
            .first()
            .map(|d| d.values.iter().filter(|v| **v > 0.0).sum())
            .unwrap_or_default()
    }
}

/// Where a chart candidate came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ChartSource {
    /// A chart-construction call found in the text. `fragment` is the
    /// original call site so it can be re-executed.
    Script { fragment: String },
    /// A chartable table, by position among the extracted tables.
    Table { index: usize },
}

impl ChartSource {
    pub fn tag(&self) -> &'static str {
        match self {
            ChartSource::Script { .. } => "script",
            ChartSource::Table { .. } => "table",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartCandidate {
    pub config: ChartConfig,
    #[serde(flatten)]
    pub source: ChartSource,
}

impl ChartCandidate {
    pub fn new(config: ChartConfig, source: ChartSource) -> Self {
        Self { config, source }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_kind_parses_case_insensitive() {
        assert_eq!(ChartKind::from_str("Doughnut").unwrap(), ChartKind::Doughnut);
        assert!(ChartKind::from_str("radar").is_err());
    }

    #[test]
    fn test_dataset_setters_wrap_optional_fields() {
        let actual = Dataset::new(vec![1.0]).label("Units").colors(labels(&["#ffffff"]));
        let expected = Dataset {
            label: Some("Units".to_string()),
            values: vec![1.0],
            colors: Some(labels(&["#ffffff"])),
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_matching_lengths_are_accepted() {
        let actual = ChartConfig::new(
            ChartKind::Bar,
            labels(&["a", "b"]),
            vec![Dataset::new(vec![1.0, 2.0])],
        );
        assert!(actual.is_ok());
    }

    #[test]
    fn test_mismatched_dataset_is_rejected() {
        let actual = ChartConfig::new(
            ChartKind::Line,
            labels(&["a", "b"]),
            vec![Dataset::new(vec![1.0, 2.0]), Dataset::new(vec![3.0])],
        );
        let expected = Err(Error::DatasetLength { index: 1, expected: 2, actual: 1 });
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_empty_labels_are_rejected() {
        let actual = ChartConfig::new(ChartKind::Pie, vec![], vec![Dataset::new(vec![])]);
        assert_eq!(actual, Err(Error::EmptyChart));
    }

    #[test]
    fn test_from_table_tallies_second_column() {
        let fixture = TableData::new(
            labels(&["A", "B"]),
            vec![labels(&["1", "x"]), labels(&["2", "x"])],
        );
        let actual = ChartConfig::from_table(&fixture).unwrap();
        assert_eq!(actual.kind(), &ChartKind::Pie);
        assert_eq!(actual.labels(), &labels(&["x"]));
        assert_eq!(actual.datasets()[0].values, vec![2.0]);
    }

    #[test]
    fn test_from_table_skips_unchartable() {
        let fixture = TableData::new(labels(&["A"]), vec![labels(&["1"]), labels(&["2"])]);
        assert_eq!(ChartConfig::from_table(&fixture), None);
    }

    #[test]
    fn test_candidate_serializes_source_tag() {
        let config = ChartConfig::new(ChartKind::Pie, labels(&["x"]), vec![Dataset::new(vec![2.0])])
            .unwrap();
        let fixture = ChartCandidate::new(config, ChartSource::Table { index: 0 });
        let actual = serde_json::to_value(&fixture).unwrap();
        assert_eq!(actual["source"], "table");
        assert_eq!(actual["index"], 0);
    }
}
