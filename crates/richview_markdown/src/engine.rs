use std::borrow::Cow;

use derive_setters::Setters;
use richview_domain::{escape_html, escape_text};

use crate::block::{Block, BlockScanner, List};
use crate::fence::{FenceExtraction, placeholder};
use crate::inline::render_inline;
use crate::table::Table;

/// Blockquotes nested deeper than this are flattened into the innermost one.
pub const MAX_QUOTE_DEPTH: usize = 16;

/// Converts markdown to HTML. All text is escaped; the only markup in the
/// output is produced by the engine itself.
#[derive(Clone, Debug, Setters)]
#[setters(into)]
pub struct MarkdownEngine {
    /// Runs of newlines longer than this are collapsed outside code blocks.
    max_consecutive_newlines: usize,
}

impl Default for MarkdownEngine {
    fn default() -> Self {
        Self { max_consecutive_newlines: 2 }
    }
}

impl MarkdownEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses markdown into block nodes.
    pub fn parse(&self, markdown: &str) -> Vec<Block> {
        let fences = self.extract(markdown);
        BlockScanner::new(fences.markdown(), &fences).scan()
    }

    pub fn render(&self, markdown: &str) -> String {
        let fences = self.extract(markdown);
        let blocks = BlockScanner::new(fences.markdown(), &fences).scan();
        let html = render_blocks(&blocks, &fences, 0);
        restore_code_blocks(html, &fences)
    }

    fn extract(&self, markdown: &str) -> FenceExtraction {
        let normalized = markdown.replace("\r\n", "\n").replace('\r', "\n").replace('\x00', "");
        let fences = FenceExtraction::new(&normalized);
        let collapsed = collapse_newlines(fences.markdown(), self.max_consecutive_newlines);
        fences.with_markdown(collapsed)
    }
}

/// Renders markdown with the default engine settings.
pub fn render_markdown(markdown: &str) -> String {
    MarkdownEngine::default().render(markdown)
}

fn collapse_newlines(text: &str, max: usize) -> String {
    let max = max.max(1);
    let mut result = String::with_capacity(text.len());
    let mut run = 0;
    for c in text.chars() {
        if c == '\n' {
            run += 1;
            if run > max {
                continue;
            }
        } else {
            run = 0;
        }
        result.push(c);
    }
    result
}

fn render_blocks(blocks: &[Block], fences: &FenceExtraction, depth: usize) -> String {
    blocks
        .iter()
        .map(|block| render_block(block, fences, depth))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_block(block: &Block, fences: &FenceExtraction, depth: usize) -> String {
    match block {
        Block::Heading { level, text } => format!("<h{level}>{}</h{level}>", render_inline(text)),
        Block::Paragraph(text) => format!("<p>{}</p>", render_lines(text)),
        Block::CodeBlock { slot, .. } => placeholder(*slot),
        Block::List(list) => render_list(list),
        Block::Table(table) => render_table(table),
        Block::Rule => "<hr>".to_string(),
        Block::Blockquote(text) => {
            let text = if depth + 1 >= MAX_QUOTE_DEPTH {
                Cow::Owned(flatten_quote(text))
            } else {
                Cow::Borrowed(text.as_str())
            };
            let inner = BlockScanner::new(&text, fences).scan();
            format!("<blockquote>\n{}\n</blockquote>", render_blocks(&inner, fences, depth + 1))
        }
    }
}

/// Strips every leading quote marker so the text scans without further
/// blockquotes.
fn flatten_quote(text: &str) -> String {
    text.lines()
        .map(|line| line.trim_start_matches(|c: char| c == '>' || c == ' ' || c == '\t'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_lines(text: &str) -> String {
    text.lines().map(render_inline).collect::<Vec<_>>().join("<br>")
}

fn render_list(list: &List) -> String {
    let (open, close) = match (list.ordered, list.start) {
        (false, _) => ("<ul>".to_string(), "</ul>"),
        (true, 1) => ("<ol>".to_string(), "</ol>"),
        (true, start) => (format!("<ol start=\"{start}\">"), "</ol>"),
    };
    let mut html = open;
    html.push('\n');
    for item in &list.items {
        html.push_str("<li>");
        html.push_str(&render_lines(&item.text));
        for child in &item.children {
            html.push('\n');
            html.push_str(&render_list(child));
            html.push('\n');
        }
        html.push_str("</li>\n");
    }
    html.push_str(close);
    html
}

fn cell_tag(tag: &str, content: &str, alignment: Option<&str>) -> String {
    match alignment {
        Some(align) => format!("<{tag} style=\"text-align:{align}\">{}</{tag}>", render_inline(content)),
        None => format!("<{tag}>{}</{tag}>", render_inline(content)),
    }
}

fn render_table(table: &Table) -> String {
    let align = |i: usize| table.alignments.get(i).copied().flatten().map(|a| a.as_css());
    let header: String = table
        .headers
        .iter()
        .enumerate()
        .map(|(i, cell)| cell_tag("th", cell, align(i)))
        .collect();
    let mut html = format!("<table>\n<thead>\n<tr>{header}</tr>\n</thead>\n<tbody>\n");
    for row in &table.rows {
        let cells: String = row.iter().enumerate().map(|(i, cell)| cell_tag("td", cell, align(i))).collect();
        html.push_str(&format!("<tr>{cells}</tr>\n"));
    }
    html.push_str("</tbody>\n</table>");
    html
}

/// Swaps each placeholder for its escaped `<pre><code>` block. Runs after all
/// other rules so code is never touched by them.
fn restore_code_blocks(html: String, fences: &FenceExtraction) -> String {
    let mut result = html;
    for (slot, block) in fences.blocks().iter().enumerate() {
        let class = if block.lang.is_empty() {
            String::new()
        } else {
            format!(" class=\"language-{}\"", escape_html(&block.lang))
        };
        let code = format!("<pre><code{class}>{}</code></pre>", escape_text(&block.code));
        result = result.replace(&placeholder(slot), &code);
    }
    result
}
