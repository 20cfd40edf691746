//! GFM pipe tables and box-drawing tables.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref GFM_SEPARATOR: Regex =
        Regex::new(r"^\s*\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)*\|?\s*$").unwrap();
    static ref BOX_BORDER: Regex =
        Regex::new(r"^\s*[-=+|:─━═┌┬┐├┼┤└┴┘╔╦╗╠╬╣╚╩╝│┃║\s]+$").unwrap();
}

const BOX_DELIMITERS: [char; 4] = ['|', '│', '┃', '║'];
const BOX_RULES: [char; 5] = ['-', '=', '─', '━', '═'];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn as_css(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

/// A parsed table. Every row has exactly `headers.len()` cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub alignments: Vec<Option<Alignment>>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(headers: Vec<String>, alignments: Vec<Option<Alignment>>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let mut alignments = alignments;
        alignments.resize(width, None);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, alignments, rows }
    }
}

fn is_gfm_separator(line: &str) -> bool {
    line.contains('-') && line.contains('|') && GFM_SEPARATOR.is_match(line)
}

/// Splits a pipe row into trimmed cells. Escaped pipes (`\|`) stay in the
/// cell and pipes inside code spans do not split.
fn split_pipe_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').filter(|_| !trimmed.ends_with("\\|")).unwrap_or(trimmed);

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_code = false;
    let mut chars = trimmed.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '`' => {
                in_code = !in_code;
                current.push(c);
            }
            '|' if !in_code => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn parse_alignment(cell: &str) -> Option<Alignment> {
    match (cell.starts_with(':'), cell.ends_with(':')) {
        (true, true) => Some(Alignment::Center),
        (true, false) => Some(Alignment::Left),
        (false, true) => Some(Alignment::Right),
        (false, false) => None,
    }
}

/// Parses a GFM table starting at `lines[start]`. Returns the table and the
/// number of lines consumed.
pub(crate) fn parse_gfm(lines: &[&str], start: usize) -> Option<(Table, usize)> {
    let header = lines.get(start)?;
    let separator = lines.get(start + 1)?;
    if !header.contains('|') || !is_gfm_separator(separator) {
        return None;
    }

    let headers = split_pipe_row(header);
    let alignments = split_pipe_row(separator).iter().map(|c| parse_alignment(c)).collect();
    let rows: Vec<Vec<String>> = lines[start + 2..]
        .iter()
        .take_while(|line| !line.trim().is_empty() && line.contains('|'))
        .map(|line| split_pipe_row(line))
        .collect();
    let consumed = 2 + rows.len();
    Some((Table::new(headers, alignments, rows), consumed))
}

fn is_box_border(line: &str) -> bool {
    BOX_BORDER.is_match(line) && line.chars().filter(|c| BOX_RULES.contains(c)).count() >= 3
}

fn is_box_row(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(BOX_DELIMITERS) && !is_box_border(line)
}

fn split_box_row(line: &str) -> Vec<String> {
    let trimmed = line.trim().trim_matches(&BOX_DELIMITERS[..]);
    trimmed.split(&BOX_DELIMITERS[..]).map(|cell| cell.trim().to_string()).collect()
}

/// Parses a box-drawing table: a run of border lines and delimited rows with
/// at least one border. The first data row becomes the header row.
pub(crate) fn parse_box(lines: &[&str], start: usize) -> Option<(Table, usize)> {
    let run = lines[start..]
        .iter()
        .take_while(|line| is_box_border(line) || is_box_row(line))
        .count();
    let block = &lines[start..start + run];
    if !block.iter().any(|line| is_box_border(line)) {
        return None;
    }

    let mut data = block.iter().filter(|line| is_box_row(line)).map(|line| split_box_row(line));
    let headers = data.next()?;
    let rows = data.collect();
    Some((Table::new(headers, Vec::new(), rows), run))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_gfm_table() {
        let fixture = ["| Name | Age |", "|:-----|----:|", "| Ann | 31 |", "| Bob | 42 |", "", "after"];
        let (actual, consumed) = parse_gfm(&fixture, 0).unwrap();
        let expected = Table {
            headers: strings(&["Name", "Age"]),
            alignments: vec![Some(Alignment::Left), Some(Alignment::Right)],
            rows: vec![strings(&["Ann", "31"]), strings(&["Bob", "42"])],
        };
        assert_eq!(actual, expected);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_gfm_rows_are_padded_and_truncated() {
        let fixture = ["A | B", "---|---", "| 1 |", "1 | 2 | 3"];
        let (actual, _) = parse_gfm(&fixture, 0).unwrap();
        assert_eq!(actual.rows, vec![strings(&["1", ""]), strings(&["1", "2"])]);
    }

    #[test]
    fn test_gfm_escaped_pipe() {
        let fixture = ["| Expr |", "|---|", r"| a \| b |"];
        let (actual, _) = parse_gfm(&fixture, 0).unwrap();
        assert_eq!(actual.rows, vec![strings(&["a | b"])]);
    }

    #[test]
    fn test_rule_is_not_a_separator() {
        let fixture = ["a | b", "---"];
        assert_eq!(parse_gfm(&fixture, 0), None);
    }

    #[test]
    fn test_box_table_unicode() {
        let fixture = [
            "┌──────┬─────┐",
            "│ Name │ Age │",
            "├──────┼─────┤",
            "│ Ann  │ 31  │",
            "└──────┴─────┘",
        ];
        let (actual, consumed) = parse_box(&fixture, 0).unwrap();
        assert_eq!(actual.headers, strings(&["Name", "Age"]));
        assert_eq!(actual.rows, vec![strings(&["Ann", "31"])]);
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_box_table_ascii() {
        let fixture = ["+----+----+", "| k  | v  |", "+====+====+", "| a  | 1  |", "+----+----+"];
        let (actual, _) = parse_box(&fixture, 0).unwrap();
        assert_eq!(actual.headers, strings(&["k", "v"]));
        assert_eq!(actual.rows, vec![strings(&["a", "1"])]);
    }

    #[test]
    fn test_box_rows_without_border_are_not_a_table() {
        let fixture = ["| a | b |", "| c | d |"];
        assert_eq!(parse_box(&fixture, 0), None);
    }
}
