use lazy_static::lazy_static;
use regex::Regex;
use richview_domain::{TableData, decode_entities};
use richview_markdown::MarkdownEngine;

lazy_static! {
    static ref TABLE: Regex = Regex::new(r"(?is)<table[^>]*>(.*?)</table>").unwrap();
    static ref ROW: Regex = Regex::new(r"(?is)<tr(?:\s[^>]*)?>(.*?)</tr>").unwrap();
    static ref HEADER_CELL: Regex = Regex::new(r"(?is)<th(?:\s[^>]*)?>(.*?)</th>").unwrap();
    static ref DATA_CELL: Regex = Regex::new(r"(?is)<td(?:\s[^>]*)?>(.*?)</td>").unwrap();
    static ref TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Pulls tabular data out of rendered HTML, so tables from every markdown
/// table dialect are extracted the same way.
#[derive(Clone, Debug, Default)]
pub struct TableDataExtractor {
    engine: MarkdownEngine,
}

impl TableDataExtractor {
    pub fn new(engine: MarkdownEngine) -> Self {
        Self { engine }
    }

    /// Extracts every `<table>` in `html`. `<th>` cells become the headers;
    /// when a table has none, its first data row is used instead. Rows
    /// without `<td>` cells are skipped.
    pub fn extract(&self, html: &str) -> Vec<TableData> {
        TABLE
            .captures_iter(html)
            .filter_map(|caps| {
                let body = caps.get(1)?.as_str();
                let mut headers = cells(&HEADER_CELL, body);
                let mut rows: Vec<Vec<String>> = ROW
                    .captures_iter(body)
                    .filter_map(|row| row.get(1))
                    .map(|row| cells(&DATA_CELL, row.as_str()))
                    .filter(|row| !row.is_empty())
                    .collect();
                if headers.is_empty() && !rows.is_empty() {
                    headers = rows.remove(0);
                }
                if headers.is_empty() {
                    tracing::debug!("Skipping table without header or data cells");
                    return None;
                }
                Some(TableData::new(headers, rows))
            })
            .collect()
    }

    /// Renders markdown and extracts the tables of the result.
    pub fn extract_markdown(&self, markdown: &str) -> Vec<TableData> {
        self.extract(&self.engine.render(markdown))
    }
}

fn cells(pattern: &Regex, html: &str) -> Vec<String> {
    pattern
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|cell| cell_text(cell.as_str()))
        .collect()
}

fn cell_text(html: &str) -> String {
    let stripped = TAG.replace_all(html, "");
    let decoded = decode_entities(&stripped);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_extract_gfm_table_from_markdown() {
        let fixture = "| A | B |\n|---|---|\n| 1 | x |\n| 2 | x |";
        let actual = TableDataExtractor::default().extract_markdown(fixture);
        let expected = vec![TableData::new(
            strings(&["A", "B"]),
            vec![strings(&["1", "x"]), strings(&["2", "x"])],
        )];
        assert_eq!(actual, expected);
        assert!(actual[0].is_chartable());
    }

    #[test]
    fn test_extract_box_table_from_markdown() {
        let fixture = "┌───┬───┐\n│ k │ v │\n├───┼───┤\n│ a │ 1 │\n└───┴───┘";
        let actual = TableDataExtractor::default().extract_markdown(fixture);
        let expected = vec![TableData::new(strings(&["k", "v"]), vec![strings(&["a", "1"])])];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_cells_are_text_only() {
        let fixture = "<table><tr><th class=\"h\"><b>Name</b></th><th>Note</th></tr>\
                       <tr><td>Tom &amp; Jerry</td><td>  a\n b </td></tr></table>";
        let actual = TableDataExtractor::default().extract(fixture);
        let expected = vec![TableData::new(
            strings(&["Name", "Note"]),
            vec![strings(&["Tom & Jerry", "a b"])],
        )];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_first_row_becomes_header_without_th() {
        let fixture = "<table><tr><td>h1</td><td>h2</td></tr><tr><td>1</td><td>2</td></tr></table>";
        let actual = TableDataExtractor::default().extract(fixture);
        assert_eq!(actual[0].headers(), &strings(&["h1", "h2"]));
        assert_eq!(actual[0].rows(), &vec![strings(&["1", "2"])]);
    }

    #[test]
    fn test_rows_are_rectangular() {
        let fixture = "<table><thead><tr><th>a</th><th>b</th></tr></thead>\
                       <tbody><tr><td>1</td></tr><tr><td>1</td><td>2</td><td>3</td></tr><tr></tr></tbody></table>";
        let actual = TableDataExtractor::default().extract(fixture);
        assert_eq!(actual[0].rows(), &vec![strings(&["1", ""]), strings(&["1", "2"])]);
    }

    #[test]
    fn test_multiple_tables() {
        let fixture = "<table><tr><th>a</th></tr></table><p>x</p><table><tr><th>b</th></tr></table>";
        let actual = TableDataExtractor::default().extract(fixture);
        assert_eq!(actual.len(), 2);
    }
}
