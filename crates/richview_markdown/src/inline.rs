//! Inline markdown: code spans, links, images and emphasis.

use std::cell::RefCell;
use std::collections::HashMap;

use richview_domain::{escape_html, escape_text};

/// Links and emphasis nested deeper than this are kept as literal text.
pub(crate) const MAX_INLINE_DEPTH: usize = 32;

/// Inline element produced by [`parse_inline`]. Containers hold already
/// parsed children so each label is rendered exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Inline {
    Text(String),
    Code(String),
    Bold(Vec<Inline>),
    Italic(Vec<Inline>),
    BoldItalic(Vec<Inline>),
    Strike(Vec<Inline>),
    Link { children: Vec<Inline>, url: String, title: Option<String> },
    Image { alt: String, url: String },
}

/// Render inline markdown to escaped HTML.
pub(crate) fn render_inline(text: &str) -> String {
    render_inline_elements(&parse_inline(text))
}

pub(crate) fn render_inline_elements(elements: &[Inline]) -> String {
    let mut result = String::new();
    for element in elements {
        match element {
            Inline::Text(text) => result.push_str(&escape_text(text)),
            Inline::Code(code) => {
                result.push_str("<code>");
                result.push_str(&escape_text(code));
                result.push_str("</code>");
            }
            Inline::Bold(children) => wrap(&mut result, "b", children),
            Inline::Italic(children) => wrap(&mut result, "i", children),
            Inline::BoldItalic(children) => {
                result.push_str("<b>");
                wrap(&mut result, "i", children);
                result.push_str("</b>");
            }
            Inline::Strike(children) => wrap(&mut result, "del", children),
            Inline::Link { children, url, title } => {
                result.push_str(&format!("<a href=\"{}\"", escape_html(url)));
                if let Some(title) = title {
                    result.push_str(&format!(" title=\"{}\"", escape_html(title)));
                }
                result.push_str(" target=\"_blank\" rel=\"noopener noreferrer\">");
                result.push_str(&render_inline_elements(children));
                result.push_str("</a>");
            }
            Inline::Image { alt, url } => {
                result.push_str(&format!(
                    "<img src=\"{}\" alt=\"{}\">",
                    escape_html(url),
                    escape_html(alt)
                ));
            }
        }
    }
    result
}

fn wrap(out: &mut String, tag: &str, children: &[Inline]) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(&render_inline_elements(children));
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// URL schemes that can execute script are replaced by `#`. `data:image/` is
/// allowed for images only.
pub(crate) fn safe_url(url: &str, image: bool) -> String {
    let lowered: String = url
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_lowercase();
    let unsafe_scheme = lowered.starts_with("javascript:")
        || lowered.starts_with("vbscript:")
        || (lowered.starts_with("data:") && !(image && lowered.starts_with("data:image/")));
    if unsafe_scheme { "#".to_string() } else { url.trim().to_string() }
}

pub(crate) fn parse_inline(text: &str) -> Vec<Inline> {
    let chars: Vec<char> = text.chars().collect();
    let parser = InlineParser {
        brackets: partners(&chars, '[', ']'),
        parens: partners(&chars, '(', ')'),
        chars: &chars,
        failed_code: RefCell::default(),
        failed_closers: RefCell::default(),
    };
    parser.parse(0, chars.len(), 0)
}

/// Pairs every `left` with its balancing `right` in one pass. A backslash
/// escapes the character after it.
fn partners(chars: &[char], left: char, right: char) -> Vec<Option<usize>> {
    let mut result = vec![None; chars.len()];
    let mut open = Vec::new();
    let mut j = 0;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 1,
            c if c == left => open.push(j),
            c if c == right => {
                if let Some(start) = open.pop() {
                    result[start] = Some(j);
                }
            }
            _ => {}
        }
        j += 1;
    }
    result
}

struct InlineParser<'a> {
    chars: &'a [char],
    brackets: Vec<Option<usize>>,
    parens: Vec<Option<usize>>,
    /// `(run, end)` to the earliest start whose search for a closing run of
    /// backticks failed. Any later start in the same range fails too.
    failed_code: RefCell<HashMap<(usize, usize), usize>>,
    /// Same for emphasis closers, keyed by `(delimiter, run, end)`.
    failed_closers: RefCell<HashMap<(char, usize, usize), usize>>,
}

impl InlineParser<'_> {
    fn parse(&self, start: usize, end: usize, depth: usize) -> Vec<Inline> {
        if depth >= MAX_INLINE_DEPTH {
            return vec![Inline::Text(self.chars[start..end].iter().collect())];
        }
        let mut elements = Vec::new();
        let mut buffer = String::new();
        let mut i = start;

        while i < end {
            let c = self.chars[i];
            let matched = match c {
                '\\' if i + 1 < end && self.chars[i + 1].is_ascii_punctuation() => {
                    buffer.push(self.chars[i + 1]);
                    i += 2;
                    continue;
                }
                '`' => self.code_span(i, end),
                '!' if i + 1 < end && self.chars[i + 1] == '[' => self
                    .link(i + 1, end)
                    .map(|(label, url, _, next)| {
                        let alt: String = self.chars[label.0..label.1].iter().collect();
                        (Inline::Image { alt, url: safe_url(&url, true) }, next)
                    }),
                '[' => self.link(i, end).map(|(label, url, title, next)| {
                    let children = self.parse(label.0, label.1, depth + 1);
                    (Inline::Link { children, url: safe_url(&url, false), title }, next)
                }),
                '*' | '_' => self.emphasis(i, end, depth),
                '~' => self.strike(i, end, depth),
                _ => None,
            };

            match matched {
                Some((element, next)) => {
                    if !buffer.is_empty() {
                        elements.push(Inline::Text(std::mem::take(&mut buffer)));
                    }
                    elements.push(element);
                    i = next;
                }
                None => {
                    // Delimiter runs that do not match are emitted whole so a
                    // later character of the same run cannot open a span.
                    let run = if matches!(c, '*' | '_' | '~' | '`') { self.run_len(i, end, c) } else { 1 };
                    buffer.extend(&self.chars[i..i + run]);
                    i += run;
                }
            }
        }

        if !buffer.is_empty() {
            elements.push(Inline::Text(buffer));
        }
        elements
    }

    fn run_len(&self, i: usize, end: usize, c: char) -> usize {
        self.chars[i..end].iter().take_while(|x| **x == c).count()
    }

    fn code_span(&self, i: usize, end: usize) -> Option<(Inline, usize)> {
        let n = self.run_len(i, end, '`');
        if self.failed_code.borrow().get(&(n, end)).is_some_and(|from| *from <= i) {
            return None;
        }
        let mut j = i + n;
        while j < end {
            if self.chars[j] == '`' {
                let m = self.run_len(j, end, '`');
                if m == n {
                    let inner: String = self.chars[i + n..j].iter().collect();
                    let inner = match inner.strip_prefix(' ').and_then(|s| s.strip_suffix(' ')) {
                        Some(stripped) if !stripped.trim().is_empty() => stripped.to_string(),
                        _ => inner,
                    };
                    return Some((Inline::Code(inner), j + m));
                }
                j += m;
            } else {
                j += 1;
            }
        }
        self.failed_code.borrow_mut().insert((n, end), i);
        None
    }

    /// Parses `[label](url "title")` starting at the opening bracket. Returns
    /// the label range, url, title and the index after the closing paren.
    #[allow(clippy::type_complexity)]
    fn link(
        &self,
        open: usize,
        end: usize,
    ) -> Option<((usize, usize), String, Option<String>, usize)> {
        let close = self.matching(open, end, '[')?;
        if close + 1 >= end || self.chars[close + 1] != '(' {
            return None;
        }
        let paren_close = self.matching(close + 1, end, '(')?;
        let target: String = self.chars[close + 2..paren_close].iter().collect();
        let target = target.trim();
        let (url, title) = match target.split_once(char::is_whitespace) {
            Some((url, rest)) => {
                let rest = rest.trim();
                let title = rest
                    .strip_prefix('"')
                    .and_then(|t| t.strip_suffix('"'))
                    .or_else(|| rest.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')))
                    .map(str::to_string);
                (url.to_string(), title)
            }
            None => (target.to_string(), None),
        };
        let url = url.trim_start_matches('<').trim_end_matches('>').to_string();
        Some(((open + 1, close), url, title, paren_close + 1))
    }

    fn matching(&self, open: usize, end: usize, left: char) -> Option<usize> {
        let pairs = if left == '[' { &self.brackets } else { &self.parens };
        pairs[open].filter(|close| *close < end)
    }

    fn emphasis(&self, i: usize, end: usize, depth: usize) -> Option<(Inline, usize)> {
        let c = self.chars[i];
        let run = self.run_len(i, end, c);
        if run > 3 {
            return None;
        }
        let after = *self.chars.get(i + run).filter(|_| i + run < end)?;
        if after.is_whitespace() {
            return None;
        }
        if c == '_' && i > 0 && self.chars[i - 1].is_alphanumeric() {
            return None;
        }

        let close = self.closing_run(i + run, end, c, run)?;
        let children = self.parse(i + run, close, depth + 1);
        let element = match run {
            1 => Inline::Italic(children),
            2 => Inline::Bold(children),
            _ => Inline::BoldItalic(children),
        };
        Some((element, close + run))
    }

    /// First run of exactly `len` `c` characters after `from` that can close
    /// a span: not preceded by whitespace, and for `_` not followed by a word
    /// character.
    fn closing_run(&self, from: usize, end: usize, c: char, len: usize) -> Option<usize> {
        let key = (c, len, end);
        if self.failed_closers.borrow().get(&key).is_some_and(|failed| *failed <= from) {
            return None;
        }
        let mut j = from;
        while j < end {
            let ch = self.chars[j];
            if ch == '`' {
                // Delimiters inside code spans do not count.
                if let Some((_, next)) = self.code_span(j, end) {
                    j = next;
                    continue;
                }
            }
            if ch != c {
                j += 1;
                continue;
            }
            let run = self.run_len(j, end, c);
            let preceded_by_space = self.chars[j - 1].is_whitespace();
            let followed_by_word = j + run < end && self.chars[j + run].is_alphanumeric();
            if run == len && j > from && !preceded_by_space && !(c == '_' && followed_by_word) {
                return Some(j);
            }
            j += run;
        }
        self.failed_closers.borrow_mut().insert(key, from);
        None
    }

    fn strike(&self, i: usize, end: usize, depth: usize) -> Option<(Inline, usize)> {
        if self.run_len(i, end, '~') != 2 {
            return None;
        }
        let close = self.closing_run(i + 2, end, '~', 2)?;
        Some((Inline::Strike(self.parse(i + 2, close, depth + 1)), close + 2))
    }
}
