/// A fenced code block lifted out of the markdown before any other rule runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CodeBlock {
    pub code: String,
    pub lang: String,
}

/// Markdown with every fenced block replaced by a placeholder line, plus the
/// blocks themselves.
#[derive(Clone, Debug)]
pub(crate) struct FenceExtraction {
    markdown: String,
    blocks: Vec<CodeBlock>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Fence {
    marker: char,
    len: usize,
}

impl FenceExtraction {
    /// Extracts ``` and ~~~ fenced blocks, allowing any indentation before the
    /// fence. An unterminated fence runs to the end of the input.
    pub fn new(content: &str) -> Self {
        let mut blocks = Vec::new();
        let mut result = String::new();
        let mut open: Option<Fence> = None;
        let mut code_lines: Vec<&str> = Vec::new();
        let mut lang = String::new();

        for line in content.lines() {
            match (open, detect_fence(line)) {
                (None, Some((fence, info))) => {
                    lang = info;
                    open = Some(fence);
                }
                (Some(current), Some((fence, info)))
                    if info.is_empty()
                        && fence.marker == current.marker
                        && fence.len >= current.len =>
                {
                    result.push_str(&placeholder(blocks.len()));
                    result.push('\n');
                    blocks.push(CodeBlock { code: code_lines.join("\n"), lang: lang.clone() });
                    code_lines.clear();
                    open = None;
                }
                (Some(_), _) => code_lines.push(line),
                (None, None) => {
                    result.push_str(line);
                    result.push('\n');
                }
            }
        }

        if open.is_some() {
            tracing::debug!(lang = %lang, "Unterminated code fence, closing at end of input");
            result.push_str(&placeholder(blocks.len()));
            result.push('\n');
            blocks.push(CodeBlock { code: code_lines.join("\n"), lang });
        }

        Self { markdown: result, blocks }
    }

    /// Replaces the placeholder markdown, keeping the extracted blocks.
    pub fn with_markdown(self, markdown: String) -> Self {
        Self { markdown, ..self }
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    pub fn blocks(&self) -> &[CodeBlock] {
        &self.blocks
    }

    pub fn block(&self, slot: usize) -> Option<&CodeBlock> {
        self.blocks.get(slot)
    }
}

pub(crate) fn placeholder(slot: usize) -> String {
    format!("\x00{slot}\x00")
}

/// Slot number if the whole (trimmed) line is a placeholder.
pub(crate) fn parse_placeholder(line: &str) -> Option<usize> {
    line.trim()
        .strip_prefix('\x00')?
        .strip_suffix('\x00')?
        .parse()
        .ok()
}

/// Returns the fence and its info string (first word, lower-cased) when the
/// line opens or closes a fenced block.
fn detect_fence(line: &str) -> Option<(Fence, String)> {
    let trimmed = line.trim_start();
    let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    let rest = &trimmed[len..];
    if marker == '`' && rest.contains('`') {
        return None;
    }
    let info = rest
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_start_matches('{')
        .trim_end_matches('}')
        .to_lowercase();
    Some((Fence { marker, len }, info))
}
