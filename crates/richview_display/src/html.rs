use lazy_static::lazy_static;
use richview_config::HtmlPreviewMode;
use richview_domain::{escape_html, escape_text};

const SNAPSHOT_WIDTH: usize = 720;
const SNAPSHOT_COLUMNS: usize = 88;
const LINE_HEIGHT: usize = 20;
const PADDING: usize = 16;

/// Document wrapped around sanitized markup shown in a sandboxed frame.
struct FrameShell {
    head: String,
    tail: &'static str,
}

impl FrameShell {
    fn build() -> Self {
        tracing::debug!("Building preview frame shell");
        let style = [
            "body{margin:0;padding:16px;font-family:system-ui,sans-serif;line-height:1.5;color:#1f2328}",
            "table{border-collapse:collapse}",
            "td,th{border:1px solid #d0d7de;padding:4px 8px}",
            "img{max-width:100%}",
            "pre{overflow:auto;background:#f6f8fa;padding:8px}",
        ]
        .join("");
        let head = format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
             <meta http-equiv=\"Content-Security-Policy\" content=\"default-src 'none'; img-src data: https:; style-src 'unsafe-inline'\">\
             <style>{style}</style></head><body>"
        );
        Self { head, tail: "</body></html>" }
    }

    fn wrap(&self, body: &str) -> String {
        format!("{}{body}{}", self.head, self.tail)
    }
}

lazy_static! {
    static ref FRAME_SHELL: FrameShell = FrameShell::build();
}

/// Presents already-sanitized HTML in one of the configured preview modes.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlPreview {
    mode: HtmlPreviewMode,
}

impl HtmlPreview {
    pub fn new(mode: HtmlPreviewMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> HtmlPreviewMode {
        self.mode
    }

    /// `sanitized` is shown as markup; `text` is used by the snapshot mode.
    pub fn render(&self, sanitized: &str, text: &str) -> String {
        match self.mode {
            HtmlPreviewMode::Inline => format!("<div class=\"html-preview\">{sanitized}</div>"),
            HtmlPreviewMode::SandboxedFrame => {
                let document = FRAME_SHELL.wrap(sanitized);
                format!(
                    "<iframe class=\"html-preview\" sandbox=\"\" referrerpolicy=\"no-referrer\" srcdoc=\"{}\"></iframe>",
                    escape_html(&document)
                )
            }
            HtmlPreviewMode::OffscreenCanvas => snapshot(text),
        }
    }
}

/// Lays visible text out into an SVG image, one `<text>` per wrapped line.
fn snapshot(text: &str) -> String {
    let lines: Vec<String> = text.lines().flat_map(|line| wrap_line(line, SNAPSHOT_COLUMNS)).collect();
    let height = PADDING * 2 + lines.len().max(1) * LINE_HEIGHT;
    let mut out = format!(
        "<svg class=\"html-preview\" xmlns=\"http://www.w3.org/2000/svg\" width=\"{SNAPSHOT_WIDTH}\" height=\"{height}\" viewBox=\"0 0 {SNAPSHOT_WIDTH} {height}\">"
    );
    out.push_str(&format!("<rect width=\"{SNAPSHOT_WIDTH}\" height=\"{height}\" fill=\"#ffffff\"/>"));
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let y = PADDING + (i + 1) * LINE_HEIGHT - 5;
        out.push_str(&format!(
            "<text x=\"{PADDING}\" y=\"{y}\" font-family=\"sans-serif\" font-size=\"14\">{}</text>",
            escape_text(line)
        ));
    }
    out.push_str("</svg>");
    out
}

/// Greedy word wrap. Words longer than `width` are split.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }
        let needed = if current.is_empty() { word.chars().count() } else { current.chars().count() + 1 + word.chars().count() };
        if needed > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_inline_mode() {
        let actual = HtmlPreview::new(HtmlPreviewMode::Inline).render("<p>hi</p>", "hi");
        let expected = "<div class=\"html-preview\"><p>hi</p></div>";
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_frame_mode_escapes_document_into_srcdoc() {
        let actual = HtmlPreview::new(HtmlPreviewMode::SandboxedFrame).render("<p class=\"x\">hi</p>", "hi");
        assert!(actual.starts_with("<iframe class=\"html-preview\" sandbox=\"\""));
        assert!(actual.contains("&lt;p class=&quot;x&quot;&gt;hi&lt;/p&gt;"));
        assert!(!actual.contains("<p"));
    }

    #[test]
    fn test_frame_shell_is_shared() {
        let first = HtmlPreview::new(HtmlPreviewMode::SandboxedFrame).render("a", "a");
        let second = HtmlPreview::new(HtmlPreviewMode::SandboxedFrame).render("a", "a");
        assert_eq!(first, second);
    }

    #[test]
    fn test_snapshot_lays_out_lines() {
        let actual = HtmlPreview::new(HtmlPreviewMode::OffscreenCanvas).render("", "Title\n\na < b");
        assert!(actual.contains(">Title</text>"));
        assert!(actual.contains(">a &lt; b</text>"));
        assert!(actual.contains("height=\"92\""));
    }

    #[test]
    fn test_wrap_line() {
        let actual = wrap_line("aaa bbb ccc", 7);
        let expected = vec!["aaa bbb".to_string(), "ccc".to_string()];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let actual = wrap_line("abcdefgh", 3);
        let expected = vec!["abc".to_string(), "def".to_string(), "gh".to_string()];
        assert_eq!(actual, expected);
    }
}
