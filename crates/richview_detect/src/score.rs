//! Per-family heuristics. Each scorer returns a value in `[0, 1]`; the
//! detector compares them and applies thresholds.

use lazy_static::lazy_static;
use regex::Regex;
use richview_domain::ContentType;

use crate::language::language_hits;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Score {
    pub content_type: ContentType,
    pub value: f64,
    pub sub_type: Option<String>,
    pub language: Option<String>,
}

impl Score {
    fn new(content_type: ContentType, value: f64) -> Self {
        Self { content_type, value: value.clamp(0.0, 1.0), sub_type: None, language: None }
    }

    fn sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_type = Some(sub_type.into());
        self
    }

    fn language(mut self, language: Option<impl Into<String>>) -> Self {
        self.language = language.map(Into::into);
        self
    }
}

const HTML_TAGS: &str = "html|head|body|div|span|p|a|ul|ol|li|table|thead|tbody|tr|td|th|h[1-6]|br|hr|img|strong|em|b|i|u|pre|code|section|article|header|footer|nav|main|form|input|button|label|select|option|textarea|style|script|blockquote|iframe|canvas|svg|small|sup|sub";

lazy_static! {
    static ref HTML_DOCUMENT: Regex = Regex::new(r"(?i)^\s*(<!doctype\s+html|<html[\s>])").unwrap();
    static ref HTML_TAG: Regex =
        Regex::new(&format!(r"(?i)</?({HTML_TAGS})\b[^>]*>")).unwrap();
    static ref XML_DECL: Regex = Regex::new(r"^\s*<\?xml\b").unwrap();
    static ref XML_TAG: Regex = Regex::new(r"<(/?)([A-Za-z_][\w:.-]*)[^>]*?(/?)>").unwrap();
    static ref MD_HEADING: Regex = Regex::new(r"(?m)^#{1,6}\s+\S").unwrap();
    static ref MD_EMPHASIS: Regex =
        Regex::new(r"\*\*[^*\n]+\*\*|__[^_\n]+__|(^|\s)\*[^*\s][^*\n]*\*").unwrap();
    static ref MD_LIST: Regex = Regex::new(r"(?m)^\s*([-*+]|\d+[.)])\s+\S").unwrap();
    static ref MD_LINK: Regex = Regex::new(r"!?\[[^\]\n]+\]\([^)\s]+\)").unwrap();
    static ref MD_FENCE: Regex = Regex::new(r"(?m)^\s*```").unwrap();
    static ref MD_TABLE_SEPARATOR: Regex =
        Regex::new(r"^\s*\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)*\|?\s*$").unwrap();
    static ref MD_BOX_TABLE: Regex = Regex::new(r"(?m)^\s*[┌├+][─━=+\-┬┼]{3,}").unwrap();
    static ref MD_QUOTE: Regex = Regex::new(r"(?m)^\s*>\s?\S").unwrap();
    static ref MD_INLINE_CODE: Regex = Regex::new(r"`[^`\n]+`").unwrap();
    static ref MD_RULE: Regex = Regex::new(r"(?m)^\s*([-*_])(\s*[-*_]){2,}\s*$").unwrap();
    static ref SINGLE_FENCE: Regex = Regex::new(r"(?s)^\s*```([\w+#.-]*)[^\n]*\n(.*?)\n\s*```\s*$").unwrap();
    static ref CODE_LINE_START: Regex = Regex::new(
        r"^\s*(fn|pub|let|const|var|def|class|import|from|use|return|if\s*\(|for\s*\(|while\s*\(|function|public|private|package|#include|SELECT|INSERT|UPDATE|CREATE|async|await|struct|impl|enum|func|echo|export)\b"
    )
    .unwrap();
}

pub(crate) fn score_json(text: &str) -> Score {
    let trimmed = text.trim();
    let braced = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if !braced {
        return Score::new(ContentType::Json, 0.0);
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(_)) => Score::new(ContentType::Json, 0.95).sub_type("object"),
        Ok(serde_json::Value::Array(_)) => Score::new(ContentType::Json, 0.95).sub_type("array"),
        Ok(_) => Score::new(ContentType::Json, 0.0),
        // Looks like JSON but does not parse: let code or text win.
        Err(_) => Score::new(ContentType::Json, 0.3),
    }
}

pub(crate) fn score_xml(text: &str) -> Score {
    let trimmed = text.trim();
    if XML_DECL.is_match(trimmed) {
        let sub_type = if trimmed.contains("<svg") { "svg" } else { "document" };
        return Score::new(ContentType::Xml, 0.95).sub_type(sub_type);
    }
    if !(trimmed.starts_with('<') && trimmed.ends_with('>')) {
        return Score::new(ContentType::Xml, 0.0);
    }

    let Some(root) = XML_TAG.captures(trimmed).map(|c| c[2].to_string()) else {
        return Score::new(ContentType::Xml, 0.0);
    };
    let root_is_html = HTML_TAG.is_match(&format!("<{root}>")) && root != "svg";
    if root_is_html {
        return Score::new(ContentType::Xml, 0.0);
    }

    let value = if tags_balanced(trimmed) { 0.8 } else { 0.3 };
    let sub_type = if root == "svg" { "svg" } else { "fragment" };
    Score::new(ContentType::Xml, value).sub_type(sub_type)
}

/// Stack check over open/close tags; self-closing tags are ignored.
fn tags_balanced(text: &str) -> bool {
    let mut stack: Vec<String> = Vec::new();
    for caps in XML_TAG.captures_iter(text) {
        let closing = &caps[1] == "/";
        let self_closing = &caps[3] == "/";
        let name = caps[2].to_string();
        if self_closing {
            continue;
        }
        if closing {
            if stack.pop().as_deref() != Some(name.as_str()) {
                return false;
            }
        } else {
            stack.push(name);
        }
    }
    stack.is_empty()
}

pub(crate) fn score_html(text: &str) -> Score {
    if HTML_DOCUMENT.is_match(text) {
        return Score::new(ContentType::Html, 0.95).sub_type("document");
    }

    let tags: Vec<regex::Match> = HTML_TAG.find_iter(text).collect();
    if tags.is_empty() {
        return Score::new(ContentType::Html, 0.0);
    }

    let mut names: Vec<String> = HTML_TAG
        .captures_iter(text)
        .map(|c| c[1].to_lowercase())
        .collect();
    names.sort();
    names.dedup();

    let markup: usize = tags.iter().map(|m| m.as_str().len()).sum();
    let visible = text.chars().filter(|c| !c.is_whitespace()).count().max(1);
    let density = (markup as f64 / visible as f64).min(1.0);

    let mut value = 0.3 + 0.1 * names.len().min(4) as f64 + 0.3 * (density * 2.0).min(1.0);
    if text.trim_start().starts_with('<') {
        value += 0.1;
    }
    Score::new(ContentType::Html, value.min(0.9)).sub_type("fragment")
}

pub(crate) fn score_markdown(text: &str) -> Score {
    let list_items = MD_LIST.find_iter(text).count();
    let features = [
        (MD_HEADING.is_match(text), 0.3),
        (MD_EMPHASIS.is_match(text), 0.2),
        (list_items >= 2, 0.25),
        (list_items == 1, 0.1),
        (MD_LINK.is_match(text), 0.2),
        (MD_FENCE.is_match(text), 0.3),
        (has_pipe_table(text), 0.45),
        (MD_BOX_TABLE.is_match(text), 0.45),
        (MD_QUOTE.is_match(text), 0.15),
        (MD_INLINE_CODE.is_match(text), 0.1),
        (MD_RULE.is_match(text), 0.1),
    ];
    let value: f64 = features
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, weight)| weight)
        .sum();
    Score::new(ContentType::Markdown, value)
}

/// A header line with a pipe followed by a separator line, accepted on the
/// same terms as the markdown table parser.
fn has_pipe_table(text: &str) -> bool {
    let is_separator =
        |line: &str| line.contains('-') && line.contains('|') && MD_TABLE_SEPARATOR.is_match(line);
    let lines: Vec<&str> = text.lines().collect();
    lines.windows(2).any(|pair| pair[0].contains('|') && is_separator(pair[1]))
}

pub(crate) fn score_code(text: &str) -> Score {
    if let Some(caps) = SINGLE_FENCE.captures(text) {
        // Exactly one fenced block and nothing around it.
        let body = &caps[2];
        if !body.contains("```") {
            let lang = Some(caps[1].to_lowercase())
                .filter(|l| !l.is_empty())
                .or_else(|| language_hits(body).first().map(|(l, _)| l.to_string()));
            return Score::new(ContentType::Code, 0.9)
                .sub_type("fenced")
                .language(lang);
        }
    }
    if MD_FENCE.is_match(text) {
        return Score::new(ContentType::Code, 0.0);
    }

    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return Score::new(ContentType::Code, 0.0);
    }
    let code_like = lines.iter().filter(|l| is_code_line(l)).count();
    let ratio = code_like as f64 / lines.len() as f64;

    let hits = language_hits(text);
    let language = hits.first().map(|(l, _)| *l);
    let signature_bonus = match hits.first() {
        Some((_, n)) if *n >= 2 => 0.3,
        Some(_) => 0.15,
        None => 0.0,
    };
    let value = if lines.len() < 2 {
        ratio * 0.5 + signature_bonus
    } else {
        ratio * 0.7 + signature_bonus
    };
    Score::new(ContentType::Code, value).language(language)
}

fn is_code_line(line: &str) -> bool {
    let trimmed = line.trim_end();
    let ends_like_code = trimmed.ends_with(';')
        || trimmed.ends_with('{')
        || trimmed.ends_with('}')
        || trimmed.ends_with("};")
        || trimmed.ends_with(");")
        || trimmed.ends_with("):");
    let indented = line.starts_with("    ") || line.starts_with('\t');
    ends_like_code || CODE_LINE_START.is_match(line) || (indented && !MD_LIST.is_match(line))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_valid_json_object() {
        let actual = score_json(r#"{"a": [1, 2]}"#);
        assert_eq!(actual.value, 0.95);
        assert_eq!(actual.sub_type.as_deref(), Some("object"));
    }

    #[test]
    fn test_broken_json_scores_low() {
        assert_eq!(score_json(r#"{"a": }"#).value, 0.3);
    }

    #[test]
    fn test_xml_declaration() {
        let actual = score_xml("<?xml version=\"1.0\"?><note><to>A</to></note>");
        assert_eq!(actual.value, 0.95);
    }

    #[test]
    fn test_balanced_custom_xml() {
        let actual = score_xml("<note><to>Tove</to><from>Jani</from><empty/></note>");
        assert_eq!(actual.value, 0.8);
    }

    #[test]
    fn test_html_root_is_not_xml() {
        assert_eq!(score_xml("<div><p>x</p></div>").value, 0.0);
    }

    #[test]
    fn test_html_fragment_scores_high() {
        let actual = score_html("<div><p>Hello</p></div>");
        assert!(actual.value >= 0.8, "{}", actual.value);
    }

    #[test]
    fn test_single_break_in_prose_scores_low() {
        let fixture = "This is a long sentence of ordinary prose with a single break<br> in the middle of it.";
        assert!(score_html(fixture).value < 0.5);
    }

    #[test]
    fn test_markdown_heading_and_bold() {
        let actual = score_markdown("# Title\n\nSome **bold** text.");
        assert!((actual.value - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_markdown_table() {
        let actual = score_markdown("| A | B |\n|---|---|\n| 1 | x |");
        assert!(actual.value >= 0.45);
    }

    #[test]
    fn test_short_dash_separator_counts_as_table() {
        let actual = score_markdown("| A | B |\n|--|--|\n| 1 | x |");
        assert_eq!(actual.value, 0.45);
    }

    #[test]
    fn test_separator_without_pipe_header_is_not_a_table() {
        assert_eq!(score_markdown("Title\n--|--").value, 0.0);
    }

    #[test]
    fn test_box_table_reaches_markdown_threshold() {
        let actual = score_markdown("+---+---+\n| a | b |\n+---+---+\n| 1 | 2 |\n+---+---+");
        assert!(actual.value >= 0.4, "{}", actual.value);
    }

    #[test]
    fn test_single_fenced_block_is_code() {
        let actual = score_code("```python\nprint('hi')\n```");
        assert_eq!(actual.value, 0.9);
        assert_eq!(actual.language.as_deref(), Some("python"));
    }

    #[test]
    fn test_fence_with_prose_is_not_code() {
        assert_eq!(score_code("Intro\n\n```rust\nfn main() {}\n```\n").value, 0.0);
    }

    #[test]
    fn test_plain_prose_scores_zero_everywhere() {
        let fixture = "hello world";
        assert_eq!(score_code(fixture).value, 0.0);
        assert_eq!(score_markdown(fixture).value, 0.0);
        assert_eq!(score_html(fixture).value, 0.0);
        assert_eq!(score_json(fixture).value, 0.0);
        assert_eq!(score_xml(fixture).value, 0.0);
    }
}
