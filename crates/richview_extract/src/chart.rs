use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use richview_domain::{ChartCandidate, ChartConfig, ChartKind, ChartSource, Dataset, TableData};
use serde_json::Value;

use crate::literal::{matching_delimiter, parse_float_prefix, split_top_level, unquote};

lazy_static! {
    static ref CALL_SITE: Regex = Regex::new(r"\b(?:new\s+)?Chart\s*\(").unwrap();
    static ref SCRIPT_BLOCK: Regex = Regex::new(r"(?is)<script[^>]*>(.*?)</script>").unwrap();
    static ref FENCED_BLOCK: Regex = Regex::new(r"(?s)```[^\n]*\n(.*?)```").unwrap();
    static ref TYPE_FIELD: Regex = Regex::new(r#"\btype\s*:\s*['"`](\w+)['"`]"#).unwrap();
    static ref LABELS_FIELD: Regex = Regex::new(r"\blabels\s*:\s*\[").unwrap();
    static ref DATASETS_FIELD: Regex = Regex::new(r"\bdatasets\s*:\s*\[").unwrap();
    static ref DATA_FIELD: Regex = Regex::new(r"\bdata\s*:\s*\[").unwrap();
    static ref LABEL_FIELD: Regex = Regex::new(r#"\blabel\s*:\s*(['"`])(.*?)['"`]"#).unwrap();
    static ref DECLARATION: Regex = Regex::new(r"\b(?:const|let|var)\s+([\w$]+)\s*=\s*\{").unwrap();
    static ref COLOR_FIELD: Regex =
        Regex::new(r#"\bbackgroundColor\s*:\s*(\[|['"`][^'"`]*['"`])"#).unwrap();
}

/// Finds chart candidates in raw text and in extracted tables.
#[derive(Clone, Debug, Default)]
pub struct ChartSpecExtractor;

impl ChartSpecExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Script candidates in text order followed by table candidates in table
    /// order. Nothing is merged or deduplicated.
    pub fn extract(&self, text: &str, tables: &[TableData]) -> Vec<ChartCandidate> {
        let mut candidates = self.extract_scripts(text);
        candidates.extend(self.extract_tables(tables));
        candidates
    }

    /// One pie chart per chartable table.
    pub fn extract_tables(&self, tables: &[TableData]) -> Vec<ChartCandidate> {
        tables
            .iter()
            .enumerate()
            .filter_map(|(index, table)| {
                ChartConfig::from_table(table)
                    .map(|config| ChartCandidate::new(config, ChartSource::Table { index }))
            })
            .collect()
    }

    /// Chart-construction calls (`new Chart(target, {...})`, `Chart(target,
    /// config)`) whose configuration literal is inline or bound to a variable
    /// earlier in the text.
    pub fn extract_scripts(&self, text: &str) -> Vec<ChartCandidate> {
        let mut candidates = Vec::new();
        for site in CALL_SITE.find_iter(text) {
            let open = site.end() - 1;
            let Some(close) = matching_delimiter(text, open) else {
                tracing::debug!(offset = site.start(), "Unterminated chart call");
                continue;
            };
            let args = split_top_level(&text[open + 1..close]);
            let Some((literal, declaration)) =
                args.last().copied().and_then(|arg| resolve_literal(text, arg, site.start()))
            else {
                tracing::debug!(offset = site.start(), "Chart call without a configuration literal");
                continue;
            };
            match config_from_literal(literal) {
                Some(config) => {
                    let start = declaration.unwrap_or(site.start());
                    let fragment = enclosing_fragment(text, start, close);
                    candidates.push(ChartCandidate::new(config, ChartSource::Script { fragment }));
                }
                None => tracing::debug!(offset = site.start(), "Discarding chart candidate"),
            }
        }
        candidates
    }
}

/// The object literal for a call argument: the argument itself, or the
/// literal assigned to it by a declaration before the call. The second value
/// is the offset of that declaration.
fn resolve_literal<'a>(
    text: &'a str,
    arg: &'a str,
    call: usize,
) -> Option<(&'a str, Option<usize>)> {
    if arg.starts_with('{') {
        return Some((arg, None));
    }
    if !arg.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return None;
    }
    let found = DECLARATION
        .captures_iter(&text[..call])
        .filter(|caps| &caps[1] == arg)
        .last()?
        .get(0)?;
    let open = found.end() - 1;
    let close = matching_delimiter(text, open)?;
    Some((&text[open..=close], Some(found.start())))
}

/// The script or fenced block containing `start..=close`, or that span
/// itself with its trailing semicolon.
fn enclosing_fragment(text: &str, start: usize, close: usize) -> String {
    SCRIPT_BLOCK
        .captures_iter(text)
        .chain(FENCED_BLOCK.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .find(|body| body.start() <= start && close < body.end())
        .map(|body| body.as_str().trim().to_string())
        .unwrap_or_else(|| {
            let end = if text[close + 1..].starts_with(';') { close + 2 } else { close + 1 };
            text[start..end].to_string()
        })
}

/// Builds a config from an object literal. JSON5 literals are read
/// structurally; anything else (functions, computed values) falls back to
/// field-by-field pattern matching.
pub fn config_from_literal(literal: &str) -> Option<ChartConfig> {
    match serde_json5::from_str::<Value>(literal) {
        Ok(value) => parse_structured(&value),
        Err(_) => parse_tolerant(literal),
    }
}

fn parse_structured(value: &Value) -> Option<ChartConfig> {
    let kind = chart_kind(value.get("type")?.as_str()?)?;
    let data = value.get("data").filter(|d| d.is_object()).unwrap_or(value);
    let labels: Vec<String> = data
        .get("labels")?
        .as_array()?
        .iter()
        .map(|label| match label {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    let datasets: Vec<Dataset> = match data.get("datasets").and_then(Value::as_array) {
        Some(datasets) => datasets.iter().filter_map(structured_dataset).collect(),
        None => {
            let values = numbers(data.get("data")?.as_array()?);
            vec![Dataset::new(values)]
        }
    };

    let config = ChartConfig::new(kind, labels, datasets).ok()?;
    Some(match value.get("options") {
        Some(options) => config.with_options(options.clone()),
        None => config,
    })
}

fn structured_dataset(value: &Value) -> Option<Dataset> {
    let mut dataset = Dataset::new(numbers(value.get("data")?.as_array()?));
    if let Some(label) = value.get("label").and_then(Value::as_str) {
        dataset = dataset.label(label);
    }
    match value.get("backgroundColor") {
        Some(Value::String(color)) => dataset = dataset.colors(vec![color.clone()]),
        Some(Value::Array(colors)) => {
            dataset = dataset.colors(colors.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>())
        }
        _ => {}
    }
    Some(dataset)
}

fn numbers(values: &[Value]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_float_prefix(s),
            _ => None,
        })
        .collect()
}

fn chart_kind(name: &str) -> Option<ChartKind> {
    let lowered = name.to_lowercase();
    ChartKind::from_str(&lowered)
        .inspect_err(|_| tracing::debug!(kind = %lowered, "Unsupported chart type"))
        .ok()
}

/// Contents of the bracketed array whose `[` ends `field`'s match.
fn array_after<'a>(literal: &'a str, field: &regex::Match<'_>) -> Option<&'a str> {
    let open = field.end() - 1;
    let close = matching_delimiter(literal, open)?;
    Some(&literal[open + 1..close])
}

fn parse_tolerant(literal: &str) -> Option<ChartConfig> {
    let kind = chart_kind(&TYPE_FIELD.captures(literal)?[1])?;
    let labels: Vec<String> = split_top_level(array_after(literal, &LABELS_FIELD.find(literal)?)?)
        .into_iter()
        .map(|label| unquote(label).to_string())
        .collect();

    let datasets: Vec<Dataset> = match DATASETS_FIELD.find(literal).and_then(|f| array_after(literal, &f)) {
        Some(body) => split_top_level(body)
            .into_iter()
            .filter(|item| item.starts_with('{'))
            .filter_map(tolerant_dataset)
            .collect(),
        None => DATA_FIELD
            .find_iter(literal)
            .filter_map(|field| array_after(literal, &field))
            .map(|body| Dataset::new(tolerant_numbers(body)))
            .collect(),
    };

    ChartConfig::new(kind, labels, datasets).ok()
}

fn tolerant_dataset(object: &str) -> Option<Dataset> {
    let body = array_after(object, &DATA_FIELD.find(object)?)?;
    let mut dataset = Dataset::new(tolerant_numbers(body));
    if let Some(caps) = LABEL_FIELD.captures(object) {
        dataset = dataset.label(&caps[2]);
    }
    if let Some(field) = COLOR_FIELD.captures(object).and_then(|caps| caps.get(1)) {
        let colors: Vec<String> = if field.as_str() == "[" {
            let close = matching_delimiter(object, field.start())?;
            split_top_level(&object[field.start() + 1..close])
                .into_iter()
                .map(|c| unquote(c).to_string())
                .collect()
        } else {
            vec![unquote(field.as_str()).to_string()]
        };
        dataset = dataset.colors(colors);
    }
    Some(dataset)
}

fn tolerant_numbers(body: &str) -> Vec<f64> {
    split_top_level(body).into_iter().filter_map(parse_float_prefix).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flat_bar_literal() {
        let fixture = "new Chart(ctx, {type:'bar', labels:['a','b'], data:[1,2]});";
        let actual = ChartSpecExtractor::new().extract_scripts(fixture);
        assert_eq!(actual.len(), 1);
        let config = &actual[0].config;
        assert_eq!(*config.kind(), ChartKind::Bar);
        assert_eq!(config.labels(), &strings(&["a", "b"]));
        assert_eq!(config.datasets()[0].values, vec![1.0, 2.0]);
        assert_eq!(
            actual[0].source,
            ChartSource::Script { fragment: fixture.to_string() }
        );
    }

    #[test]
    fn test_chartjs_shape_with_datasets() {
        let fixture = r#"
<script>
const ctx = document.getElementById('sales').getContext('2d');
new Chart(ctx, {
  type: 'Line',
  data: {
    labels: ['Q1', 'Q2', 'Q3'],
    datasets: [
      { label: 'North', data: [10, 20, 30], backgroundColor: '#f00' },
      { label: 'South', data: [5, 15, 25], backgroundColor: ['#0f0', '#00f', '#ff0'] },
    ],
  },
  options: { responsive: true },
});
</script>"#;
        let actual = ChartSpecExtractor::new().extract_scripts(fixture);
        assert_eq!(actual.len(), 1);
        let config = &actual[0].config;
        assert_eq!(*config.kind(), ChartKind::Line);
        assert_eq!(config.datasets().len(), 2);
        assert_eq!(config.datasets()[0].label.as_deref(), Some("North"));
        assert_eq!(config.datasets()[1].colors, Some(strings(&["#0f0", "#00f", "#ff0"])));
        assert_eq!(config.options(), &serde_json::json!({"responsive": true}));
        let ChartSource::Script { fragment } = &actual[0].source else { panic!("expected script source") };
        assert!(fragment.starts_with("const ctx"));
    }

    #[test]
    fn test_function_values_use_tolerant_path() {
        let fixture = "new Chart(el, { type: 'pie', data: { labels: [\"x\"], datasets: [{ label: 'L', data: [3, '4px'] }] }, options: { onClick: function(e) { return e; } } })";
        let actual = ChartSpecExtractor::new().extract_scripts(fixture);
        assert_eq!(actual.len(), 1);
        let config = &actual[0].config;
        assert_eq!(*config.kind(), ChartKind::Pie);
        assert_eq!(config.datasets()[0].values, vec![3.0]);
    }

    #[test]
    fn test_tolerant_numbers_follow_parse_float() {
        let fixture = "new Chart(el, { type: 'pie', data: { labels: ['x', 'y'], datasets: [{ data: [3, 4px] }] }, cb: () => 1 })";
        let actual = ChartSpecExtractor::new().extract_scripts(fixture);
        let config = &actual[0].config;
        assert_eq!(config.datasets()[0].values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_config_bound_to_variable() {
        let fixture = "const config = { type: 'doughnut', data: { labels: ['a'], datasets: [{ data: [1] }] } };\nnew Chart(canvas, config);";
        let actual = ChartSpecExtractor::new().extract_scripts(fixture);
        assert_eq!(actual.len(), 1);
        assert_eq!(*actual[0].config.kind(), ChartKind::Doughnut);
        assert_eq!(
            actual[0].source,
            ChartSource::Script { fragment: fixture.to_string() }
        );
    }

    #[test]
    fn test_latest_matching_declaration_is_used() {
        let fixture = "let config = {type:'bar', labels:['a'], data:[1]};\nconst other = {type:'line', labels:['a'], data:[1]};\nlet config = {type:'pie', labels:['a'], data:[1]};\nnew Chart(canvas, config);\nconst later = {type:'line', labels:['a'], data:[1]};";
        let actual = ChartSpecExtractor::new().extract_scripts(fixture);
        assert_eq!(actual.len(), 1);
        assert_eq!(*actual[0].config.kind(), ChartKind::Pie);
    }

    #[test]
    fn test_length_mismatch_is_discarded() {
        let fixture = "new Chart(ctx, {type:'bar', labels:['a','b','c'], data:[1,2]});";
        let actual = ChartSpecExtractor::new().extract_scripts(fixture);
        assert_eq!(actual, vec![]);
    }

    #[test]
    fn test_non_numeric_entries_are_dropped_then_checked() {
        let fixture = "new Chart(ctx, {type:'bar', labels:['a','b'], data:[1,'n/a']});";
        let actual = ChartSpecExtractor::new().extract_scripts(fixture);
        assert_eq!(actual, vec![]);
    }

    #[test]
    fn test_unsupported_type_is_discarded() {
        let fixture = "new Chart(ctx, {type:'radar', labels:['a'], data:[1]});";
        assert_eq!(ChartSpecExtractor::new().extract_scripts(fixture), vec![]);
    }

    #[test]
    fn test_prose_mentioning_chart_is_ignored() {
        let fixture = "A Chart (see below) and myChart(1) are not calls to the engine.";
        assert_eq!(ChartSpecExtractor::new().extract_scripts(fixture), vec![]);
    }

    #[test]
    fn test_table_candidates() {
        let table = TableData::new(
            strings(&["A", "B"]),
            vec![strings(&["1", "x"]), strings(&["2", "x"])],
        );
        let actual = ChartSpecExtractor::new().extract_tables(&[table]);
        assert_eq!(actual.len(), 1);
        assert_eq!(actual[0].source, ChartSource::Table { index: 0 });
        assert_eq!(actual[0].config.labels(), &strings(&["x"]));
        assert_eq!(actual[0].config.datasets()[0].values, vec![2.0]);
    }

    #[test]
    fn test_both_sources_are_surfaced() {
        let text = "```js\nnew Chart(c, {type:'bar', labels:['a','b'], data:[1,2]})\n```";
        let table = TableData::new(
            strings(&["A", "B"]),
            vec![strings(&["1", "x"]), strings(&["2", "y"])],
        );
        let actual = ChartSpecExtractor::new().extract(text, &[table]);
        let tags: Vec<_> = actual.iter().map(|c| c.source.tag()).collect();
        assert_eq!(tags, vec!["script", "table"]);
    }
}
