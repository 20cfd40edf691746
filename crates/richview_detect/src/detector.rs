use richview_config::Thresholds;
use richview_domain::{ContentType, DetectionResult, OutputFormat};
use tracing::debug;

use crate::html::{sanitize_html, text_content};
use crate::language::guess_language;
use crate::score::{Score, score_code, score_html, score_json, score_markdown, score_xml};

/// Floor for the confidence reported when the detector falls back to text.
const TEXT_CONFIDENCE_FLOOR: f64 = 0.5;

/// Synchronous, side-effect-free classifier.
#[derive(Debug, Clone, Default)]
pub struct ContentTypeDetector {
    thresholds: Thresholds,
}

impl ContentTypeDetector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Classifies `content`, honouring a caller-pinned format when one is
    /// given.
    pub fn detect_with(&self, content: &str, format: OutputFormat) -> DetectionResult {
        match format.pinned() {
            Some(content_type) => self.forced(content, content_type),
            None => self.detect(content),
        }
    }

    pub fn detect(&self, content: &str) -> DetectionResult {
        let normalized = normalize(content);
        if normalized.trim().is_empty() {
            return DetectionResult::empty();
        }

        let best = self.best_score(&normalized);
        let threshold = self.threshold(best.content_type);

        if best.value < threshold || best.value == 0.0 {
            let confidence = if best.value == 0.0 {
                1.0
            } else {
                (1.0 - best.value).max(TEXT_CONFIDENCE_FLOOR)
            };
            debug!(
                candidate = %best.content_type,
                score = best.value,
                threshold,
                "Below threshold, falling back to text"
            );
            return DetectionResult::new(ContentType::Text, confidence, normalized.clone(), normalized);
        }

        debug!(content_type = %best.content_type, confidence = best.value, "Content classified");
        self.build(normalized, best)
    }

    /// Runs every scorer and keeps the strictly best one; on equal scores the
    /// more specific family wins.
    fn best_score(&self, text: &str) -> Score {
        let mut scores = vec![
            score_code(text),
            score_json(text),
            score_xml(text),
            score_html(text),
            score_markdown(text),
        ];
        scores.sort_by_key(|s| std::cmp::Reverse(s.content_type.specificity()));

        let mut best = scores.remove(0);
        for score in scores {
            if score.value > best.value {
                best = score;
            }
        }
        best
    }

    fn threshold(&self, content_type: ContentType) -> f64 {
        match content_type {
            ContentType::Code => self.thresholds.code,
            ContentType::Json => self.thresholds.json,
            ContentType::Xml => self.thresholds.xml,
            ContentType::Html => self.thresholds.html,
            ContentType::Markdown => self.thresholds.markdown,
            ContentType::Text => 0.0,
        }
    }

    fn build(&self, normalized: String, score: Score) -> DetectionResult {
        let (sanitized, text) = match score.content_type {
            ContentType::Html => {
                let sanitized = sanitize_html(&normalized);
                let text = text_content(&sanitized);
                (sanitized, text)
            }
            ContentType::Code if score.sub_type.as_deref() == Some("fenced") => {
                let inner = strip_fence(&normalized);
                (inner.clone(), inner)
            }
            _ => (normalized.clone(), normalized),
        };

        let mut result = DetectionResult::new(score.content_type, score.value, sanitized, text);
        result.sub_type = score.sub_type;
        result.language = score.language;
        result
    }

    /// User-forced mode: family fixed by the caller, confidence 1.0, no
    /// thresholds consulted.
    fn forced(&self, content: &str, content_type: ContentType) -> DetectionResult {
        let normalized = normalize(content);
        if normalized.trim().is_empty() {
            return DetectionResult::new(content_type, 1.0, "", "");
        }

        let result = match content_type {
            ContentType::Html => {
                let sanitized = sanitize_html(&normalized);
                let text = text_content(&sanitized);
                DetectionResult::new(content_type, 1.0, sanitized, text)
            }
            ContentType::Code => {
                let code = if score_code(&normalized).sub_type.as_deref() == Some("fenced") {
                    strip_fence(&normalized)
                } else {
                    normalized.clone()
                };
                let mut result = DetectionResult::new(content_type, 1.0, code.clone(), code.clone());
                result.language = guess_language(&code).map(str::to_string);
                result
            }
            _ => DetectionResult::new(content_type, 1.0, normalized.clone(), normalized),
        };
        debug!(content_type = %content_type, "Format pinned by caller");
        result
    }
}

fn normalize(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n").trim_end().to_string()
}

/// Body of a text that is exactly one fenced block.
fn strip_fence(text: &str) -> String {
    let mut lines: Vec<&str> = text.trim().lines().collect();
    if lines.len() >= 2 {
        lines.remove(0);
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn detect(content: &str) -> DetectionResult {
        ContentTypeDetector::default().detect(content)
    }

    #[test]
    fn test_ambiguous_text_falls_back_to_text() {
        let actual = detect("hello world");
        assert_eq!(actual.content_type, ContentType::Text);
        assert_eq!(actual.confidence, 1.0);
    }

    #[test]
    fn test_weak_markdown_signal_falls_back_to_text() {
        let actual = detect("Use the `ls` command.");
        assert_eq!(actual.content_type, ContentType::Text);
        assert_eq!(actual.confidence, 0.9);
    }

    #[test]
    fn test_heading_and_bold_is_markdown() {
        let actual = detect("# Title\n\nSome **bold** text.");
        assert_eq!(actual.content_type, ContentType::Markdown);
        assert_eq!(actual.confidence, 0.5);
    }

    #[test]
    fn test_gfm_table_is_markdown() {
        let actual = detect("| A | B |\n|---|---|\n| 1 | x |\n| 2 | x |");
        assert_eq!(actual.content_type, ContentType::Markdown);
    }

    #[test]
    fn test_short_dash_gfm_table_is_markdown() {
        let actual = detect("| A | B |\n|--|--|\n| 1 | x |\n| 2 | x |");
        assert_eq!(actual.content_type, ContentType::Markdown);
    }

    #[test]
    fn test_box_table_alone_is_markdown() {
        let fixture = "┌─────┬─────┐\n│ Qtr │ Rev │\n├─────┼─────┤\n│ Q1  │ 10  │\n│ Q2  │ 12  │\n└─────┴─────┘";
        let actual = detect(fixture);
        assert_eq!(actual.content_type, ContentType::Markdown);
    }

    #[test]
    fn test_ascii_box_table_alone_is_markdown() {
        let actual = detect("+---+---+\n| a | b |\n+---+---+\n| 1 | 2 |\n+---+---+");
        assert_eq!(actual.content_type, ContentType::Markdown);
    }

    #[test]
    fn test_json_object() {
        let actual = detect("{\"name\": \"richview\", \"tags\": [1, 2]}");
        assert_eq!(actual.content_type, ContentType::Json);
        assert_eq!(actual.sub_type.as_deref(), Some("object"));
    }

    #[test]
    fn test_html_is_sanitized() {
        let actual = detect("<div><p>Hello</p><script>alert(1)</script></div>");
        assert_eq!(actual.content_type, ContentType::Html);
        assert_eq!(actual.sanitized_content, "<div><p>Hello</p></div>");
        assert_eq!(actual.text_content, "Hello");
    }

    #[test]
    fn test_xml_document() {
        let actual = detect("<?xml version=\"1.0\"?>\n<note><to>A</to></note>");
        assert_eq!(actual.content_type, ContentType::Xml);
    }

    #[test]
    fn test_source_code_with_language() {
        let fixture = "use std::io;\n\npub fn main() {\n    let mut line = String::new();\n    io::stdin().read_line(&mut line).unwrap();\n}";
        let actual = detect(fixture);
        assert_eq!(actual.content_type, ContentType::Code);
        assert_eq!(actual.language.as_deref(), Some("rust"));
    }

    #[test]
    fn test_single_fence_unwraps_body() {
        let actual = detect("```sql\nSELECT 1 FROM dual;\n```");
        assert_eq!(actual.content_type, ContentType::Code);
        assert_eq!(actual.language.as_deref(), Some("sql"));
        assert_eq!(actual.sanitized_content, "SELECT 1 FROM dual;");
    }

    #[test]
    fn test_forced_mode_bypasses_thresholds() {
        let actual = ContentTypeDetector::default().detect_with("hello world", OutputFormat::Markdown);
        assert_eq!(actual.content_type, ContentType::Markdown);
        assert_eq!(actual.confidence, 1.0);
    }

    #[test]
    fn test_forced_html_is_still_sanitized() {
        let actual = ContentTypeDetector::default()
            .detect_with("<b onclick=\"x()\">hi</b>", OutputFormat::Html);
        assert_eq!(actual.sanitized_content, "<b>hi</b>");
    }

    #[test]
    fn test_empty_input() {
        let actual = detect("  \n ");
        assert_eq!(actual, DetectionResult::empty());
    }

    #[test]
    fn test_detection_is_idempotent() {
        let fixture = "## Plan\n\n- one\n- two\n\n```js\nconsole.log(1)\n```";
        assert_eq!(detect(fixture), detect(fixture));
    }

    #[test]
    fn test_crlf_is_normalized() {
        let actual = detect("# Title\r\n\r\nSome **bold** text.");
        assert_eq!(actual.sanitized_content, "# Title\n\nSome **bold** text.");
    }
}
