use std::collections::HashSet;

use derive_getters::Getters;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Share of rows that must carry a second-column value for a table to be
/// charted.
const MIN_USABLE_RATIO: f64 = 0.8;

/// A rectangular table recovered from rendered content.
///
/// Every row has exactly as many cells as there are headers: short rows are
/// padded with empty cells and long rows are truncated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct TableData {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableData {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Whether the table looks like a categorical series worth a pie chart:
    /// exactly two columns, at least two rows with a second-column value, and
    /// at least 80% of the rows carrying such a value.
    pub fn is_chartable(&self) -> bool {
        if self.column_count() != 2 || self.rows.is_empty() {
            return false;
        }

        let values: Vec<&str> = self.category_values().collect();
        if values.len() < 2 {
            return false;
        }

        let distinct: HashSet<&str> = values.iter().copied().collect();
        let varied = distinct.len() >= 2 || (distinct.len() == 1 && values.len() >= 2);
        if !varied {
            return false;
        }

        let usable_ratio = values.len() as f64 / self.rows.len() as f64;
        usable_ratio >= MIN_USABLE_RATIO
    }

    /// Counts how often each second-column value occurs, in first-seen order.
    pub fn category_frequencies(&self) -> IndexMap<String, usize> {
        let mut tally = IndexMap::new();
        for value in self.category_values() {
            *tally.entry(value.to_string()).or_insert(0) += 1;
        }
        tally
    }

    fn category_values(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(|row| row.get(1))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
    }
}
