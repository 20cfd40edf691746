use richview_config::{HtmlPreviewMode, RichviewConfig};
use richview_detect::{ContentTypeDetector, guess_language};
use richview_domain::{ChartCandidate, ContentType, DetectionResult, OutputFormat, TableData, escape_text};
use richview_extract::{ChartSpecExtractor, TableDataExtractor};
use richview_markdown::MarkdownEngine;
use serde::Serialize;
use strum_macros::Display;
use tracing::debug;

use crate::code::CodeHighlighter;
use crate::html::HtmlPreview;

/// Which renderer produced a [`RenderOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RendererKind {
    /// Empty input, nothing rendered.
    Empty,
    Markdown,
    Html,
    Code,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    pub detection: DetectionResult,
    pub renderer: RendererKind,
    pub body: String,
    /// Tables recovered from the markdown output.
    pub tables: Vec<TableData>,
    /// Chart candidates with their derivation source.
    pub charts: Vec<ChartCandidate>,
}

impl RenderOutput {
    fn new(detection: DetectionResult, renderer: RendererKind, body: String) -> Self {
        Self { detection, renderer, body, tables: Vec::new(), charts: Vec::new() }
    }
}

/// Entry point of the pipeline: classifies the input and hands it to exactly
/// one renderer. Never fails; the worst case is the plain text renderer.
#[derive(Debug, Clone)]
pub struct RendererRouter {
    config: RichviewConfig,
    detector: ContentTypeDetector,
    markdown: MarkdownEngine,
    tables: TableDataExtractor,
    charts: ChartSpecExtractor,
    highlighter: CodeHighlighter,
    preview: HtmlPreview,
}

impl Default for RendererRouter {
    fn default() -> Self {
        Self::new(RichviewConfig::default())
    }
}

impl RendererRouter {
    pub fn new(config: RichviewConfig) -> Self {
        let markdown = MarkdownEngine::new().max_consecutive_newlines(config.max_consecutive_newlines);
        Self {
            detector: ContentTypeDetector::new(config.thresholds),
            tables: TableDataExtractor::new(markdown.clone()),
            markdown,
            charts: ChartSpecExtractor::new(),
            highlighter: CodeHighlighter::new(),
            preview: HtmlPreview::new(config.html_preview),
            config,
        }
    }

    /// Overrides the configured HTML preview mode.
    pub fn with_html_preview(mut self, mode: HtmlPreviewMode) -> Self {
        self.config.html_preview = mode;
        self.preview = HtmlPreview::new(mode);
        self
    }

    pub fn config(&self) -> &RichviewConfig {
        &self.config
    }

    pub fn detect(&self, content: &str, format: OutputFormat) -> DetectionResult {
        self.detector.detect_with(content, format)
    }

    pub fn render(&self, content: &str, format: OutputFormat) -> RenderOutput {
        let detection = self.detect(content, format);
        if detection.is_empty() {
            return RenderOutput::new(detection, RendererKind::Empty, String::new());
        }

        let output = match detection.content_type {
            ContentType::Markdown => self.render_markdown(detection),
            ContentType::Html => {
                let body = self.preview.render(&detection.sanitized_content, &detection.text_content);
                RenderOutput::new(detection, RendererKind::Html, body)
            }
            ContentType::Json => {
                let body = self.highlighter.render(&pretty_json(&detection.sanitized_content), Some("json"));
                RenderOutput::new(detection, RendererKind::Code, body)
            }
            ContentType::Xml => {
                let body = self.highlighter.render(&detection.sanitized_content, Some("xml"));
                RenderOutput::new(detection, RendererKind::Code, body)
            }
            ContentType::Code => {
                let code = &detection.sanitized_content;
                let lang = detection.language.as_deref().or_else(|| guess_language(code));
                let body = self.highlighter.render(code, lang);
                RenderOutput::new(detection, RendererKind::Code, body)
            }
            ContentType::Text => {
                let body = format!("<pre class=\"text\">{}</pre>", escape_text(&detection.sanitized_content));
                RenderOutput::new(detection, RendererKind::Text, body)
            }
        };
        debug!(
            renderer = %output.renderer,
            tables = output.tables.len(),
            charts = output.charts.len(),
            "Content rendered"
        );
        output
    }

    fn render_markdown(&self, detection: DetectionResult) -> RenderOutput {
        let body = self.markdown.render(&detection.sanitized_content);
        let tables = if self.config.extract_tables { self.tables.extract(&body) } else { Vec::new() };
        let charts = if self.config.extract_charts {
            self.charts.extract(&detection.sanitized_content, &tables)
        } else {
            Vec::new()
        };
        RenderOutput { detection, renderer: RendererKind::Markdown, body, tables, charts }
    }
}

/// Re-indents valid JSON; anything else is returned unchanged.
fn pretty_json(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use richview_domain::{ChartKind, ChartSource};

    use super::*;

    fn render(content: &str) -> RenderOutput {
        RendererRouter::default().render(content, OutputFormat::Auto)
    }

    #[test]
    fn test_empty_input_renders_nothing() {
        let actual = render("  \n ");
        assert_eq!(actual.renderer, RendererKind::Empty);
        assert_eq!(actual.body, "");
    }

    #[test]
    fn test_markdown_heading_and_bold() {
        let actual = render("# Title\n\nSome **bold** text.");
        assert_eq!(actual.detection.content_type, ContentType::Markdown);
        assert_eq!(actual.renderer, RendererKind::Markdown);
        assert_snapshot!(actual.body, @r"
        <h1>Title</h1>
        <p>Some <b>bold</b> text.</p>
        ");
    }

    #[test]
    fn test_markdown_table_yields_table_and_pie_chart() {
        let actual = render("| A | B |\n|---|---|\n| 1 | x |\n| 2 | x |");
        let expected = vec![TableData::new(
            vec!["A".to_string(), "B".to_string()],
            vec![vec!["1".to_string(), "x".to_string()], vec!["2".to_string(), "x".to_string()]],
        )];
        assert_eq!(actual.tables, expected);
        assert_eq!(actual.charts.len(), 1);
        assert_eq!(*actual.charts[0].config.kind(), ChartKind::Pie);
        assert_eq!(actual.charts[0].config.labels(), &vec!["x".to_string()]);
        assert_eq!(actual.charts[0].config.datasets()[0].values, vec![2.0]);
        assert_eq!(actual.charts[0].source, ChartSource::Table { index: 0 });
    }

    #[test]
    fn test_extraction_can_be_disabled() {
        let fixture = RichviewConfig::default().extract_tables(false).extract_charts(false);
        let actual = RendererRouter::new(fixture).render("| A | B |\n|---|---|\n| 1 | x |\n| 2 | x |", OutputFormat::Auto);
        assert_eq!(actual.renderer, RendererKind::Markdown);
        assert!(actual.tables.is_empty());
        assert!(actual.charts.is_empty());
    }

    #[test]
    fn test_ambiguous_input_is_plain_text() {
        let actual = render("hello world & friends");
        assert_eq!(actual.renderer, RendererKind::Text);
        assert_eq!(actual.body, "<pre class=\"text\">hello world &amp; friends</pre>");
    }

    #[test]
    fn test_json_is_pretty_printed_and_highlighted() {
        let actual = render("{\"ok\": true}");
        assert_eq!(actual.renderer, RendererKind::Code);
        assert_snapshot!(actual.body, @r#"
        <pre><code class="language-json">{
          <span class="hl-string">"ok"</span>: <span class="hl-keyword">true</span>
        }</code></pre>
        "#);
    }

    #[test]
    fn test_pinned_format_bypasses_detection() {
        let actual = RendererRouter::default().render("# not a heading", OutputFormat::Text);
        assert_eq!(actual.detection.confidence, 1.0);
        assert_eq!(actual.renderer, RendererKind::Text);
    }

    #[test]
    fn test_html_is_sanitized_before_preview() {
        let actual = RendererRouter::default()
            .render("<div><p onclick=\"steal()\">Hi</p><script>alert(1)</script></div>", OutputFormat::Html);
        assert_eq!(actual.renderer, RendererKind::Html);
        assert_eq!(actual.body, "<div class=\"html-preview\"><div><p>Hi</p></div></div>");
    }

    #[test]
    fn test_render_is_idempotent() {
        let fixture = "## Notes\n\n- one\n- two\n\n```js\nnew Chart(ctx, {type: 'bar', data: {labels: ['a'], datasets: [{data: [1]}]}});\n```";
        let router = RendererRouter::default();
        let first = router.render(fixture, OutputFormat::Auto);
        let second = router.render(fixture, OutputFormat::Auto);
        assert_eq!(first, second);
    }
}
