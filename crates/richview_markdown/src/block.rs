//! Line-oriented block scanner.

use lazy_static::lazy_static;
use regex::Regex;

use crate::fence::{FenceExtraction, parse_placeholder};
use crate::table::{Table, parse_box, parse_gfm};

lazy_static! {
    static ref HEADING: Regex = Regex::new(r"^ {0,3}(#{1,6})(?:\s+(.*?))?(?:\s+#+)?\s*$").unwrap();
    static ref RULE: Regex =
        Regex::new(r"^ {0,3}(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$").unwrap();
    static ref LIST_ITEM: Regex = Regex::new(r"^([ \t]*)([*+-]|\d{1,9}[.)])[ \t]+(.*)$").unwrap();
    static ref QUOTE: Regex = Regex::new(r"^ {0,3}>[ \t]?(.*)$").unwrap();
}

/// A block-level markdown node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    CodeBlock { slot: usize, lang: String, code: String },
    List(List),
    Table(Table),
    Rule,
    Blockquote(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct List {
    pub ordered: bool,
    pub start: u64,
    pub items: Vec<ListItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListItem {
    pub text: String,
    pub children: Vec<List>,
}

struct RawItem {
    indent: usize,
    ordered: bool,
    number: u64,
    text: String,
}

fn indent_width(s: &str) -> usize {
    s.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum()
}

fn list_item(line: &str) -> Option<RawItem> {
    let caps = LIST_ITEM.captures(line)?;
    let marker = &caps[2];
    let ordered = marker.starts_with(|c: char| c.is_ascii_digit());
    let number = if ordered { marker[..marker.len() - 1].parse().unwrap_or(1) } else { 1 };
    Some(RawItem { indent: indent_width(&caps[1]), ordered, number, text: caps[3].trim().to_string() })
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_rule(line: &str) -> bool {
    RULE.is_match(line)
}

/// Scans markdown (with fences already replaced by placeholders) into blocks.
pub(crate) struct BlockScanner<'a> {
    lines: Vec<&'a str>,
    fences: &'a FenceExtraction,
}

impl<'a> BlockScanner<'a> {
    pub fn new(markdown: &'a str, fences: &'a FenceExtraction) -> Self {
        Self { lines: markdown.lines().collect(), fences }
    }

    pub fn scan(&self) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut i = 0;
        while i < self.lines.len() {
            let line = self.lines[i];
            if is_blank(line) {
                i += 1;
                continue;
            }
            if let Some(slot) = parse_placeholder(line) {
                if let Some(code) = self.fences.block(slot) {
                    blocks.push(Block::CodeBlock { slot, lang: code.lang.clone(), code: code.code.clone() });
                }
                i += 1;
                continue;
            }
            if let Some(caps) = HEADING.captures(line) {
                let level = caps[1].len() as u8;
                let text = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
                blocks.push(Block::Heading { level, text });
                i += 1;
                continue;
            }
            if let Some((table, consumed)) = parse_gfm(&self.lines, i) {
                blocks.push(Block::Table(table));
                i += consumed;
                continue;
            }
            if let Some((table, consumed)) = parse_box(&self.lines, i) {
                blocks.push(Block::Table(table));
                i += consumed;
                continue;
            }
            if is_rule(line) {
                blocks.push(Block::Rule);
                i += 1;
                continue;
            }
            if QUOTE.is_match(line) {
                let quoted: Vec<&str> = self.lines[i..]
                    .iter()
                    .map_while(|l| QUOTE.captures(l).and_then(|c| c.get(1)).map(|m| m.as_str()))
                    .collect();
                i += quoted.len();
                blocks.push(Block::Blockquote(quoted.join("\n")));
                continue;
            }
            if list_item(line).is_some() {
                let (lists, consumed) = self.scan_list(i);
                blocks.extend(lists.into_iter().map(Block::List));
                i += consumed;
                continue;
            }

            let start = i;
            i += 1;
            while i < self.lines.len() && !self.interrupts_paragraph(i) {
                i += 1;
            }
            let text = self.lines[start..i].iter().map(|l| l.trim()).collect::<Vec<_>>().join("\n");
            blocks.push(Block::Paragraph(text));
        }
        blocks
    }

    fn interrupts_paragraph(&self, i: usize) -> bool {
        let line = self.lines[i];
        is_blank(line)
            || parse_placeholder(line).is_some()
            || HEADING.is_match(line)
            || is_rule(line)
            || QUOTE.is_match(line)
            || list_item(line).is_some()
            || parse_gfm(&self.lines, i).is_some()
            || parse_box(&self.lines, i).is_some()
    }

    fn scan_list(&self, start: usize) -> (Vec<List>, usize) {
        let mut items: Vec<RawItem> = Vec::new();
        let mut i = start;
        while i < self.lines.len() {
            let line = self.lines[i];
            if let Some(item) = list_item(line) {
                items.push(item);
                i += 1;
                continue;
            }
            if is_blank(line) {
                let next = (i..self.lines.len()).find(|k| !is_blank(self.lines[*k]));
                match next {
                    Some(k) if list_item(self.lines[k]).is_some() => {
                        i = k;
                        continue;
                    }
                    _ => break,
                }
            }
            let continuation = indent_width(&line[..line.len() - line.trim_start().len()]) >= 2
                && parse_placeholder(line).is_none();
            match items.last_mut() {
                Some(last) if continuation => {
                    last.text.push('\n');
                    last.text.push_str(line.trim());
                    i += 1;
                }
                _ => break,
            }
        }

        let mut lists = Vec::new();
        let mut pos = 0;
        while pos < items.len() {
            lists.push(build_list(&items, &mut pos));
        }
        (lists, i - start)
    }
}

fn build_list(items: &[RawItem], pos: &mut usize) -> List {
    let first = &items[*pos];
    let base = first.indent;
    let mut list = List { ordered: first.ordered, start: first.number, items: Vec::new() };

    while *pos < items.len() {
        let item = &items[*pos];
        if item.indent < base {
            break;
        }
        if item.indent >= base + 2 {
            let child = build_list(items, pos);
            match list.items.last_mut() {
                Some(last) => last.children.push(child),
                None => list.items.push(ListItem { text: String::new(), children: vec![child] }),
            }
            continue;
        }
        if item.ordered != list.ordered {
            break;
        }
        list.items.push(ListItem { text: item.text.clone(), children: Vec::new() });
        *pos += 1;
    }
    list
}
