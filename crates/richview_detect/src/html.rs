use lazy_static::lazy_static;
use regex::Regex;
use richview_domain::decode_entities;

/// Elements removed together with everything between their tags.
const STRIPPED_ELEMENTS: &[&str] = &["script", "iframe", "object", "embed", "form", "noscript"];

lazy_static! {
    static ref STRIPPED_BLOCKS: Vec<Regex> = STRIPPED_ELEMENTS
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).unwrap())
        .collect();
    static ref DANGLING_TAG: Regex =
        Regex::new(r"(?i)</?(script|iframe|object|embed|form|noscript|link|meta|base)\b[^>]*>").unwrap();
    static ref EVENT_ATTR: Regex =
        Regex::new(r#"(?i)[\s/]+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).unwrap();
    static ref SCRIPT_URL: Regex = Regex::new(
        r#"(?i)\b(href|src|action|formaction|xlink:href)\s*=\s*("\s*(?:javascript|vbscript):[^"]*"|'\s*(?:javascript|vbscript):[^']*'|(?:javascript|vbscript):[^\s>]*)"#
    )
    .unwrap();
    static ref NON_TEXT_BLOCK: Regex =
        Regex::new(r"(?is)<(style|script|head|template)\b[^>]*>.*?</(style|script|head|template)\s*>").unwrap();
    static ref BLOCK_BREAK: Regex =
        Regex::new(r"(?i)<(br|/p|/div|/li|/tr|/h[1-6]|/blockquote|/pre|/table)\b[^>]*>").unwrap();
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref OPENING_TAG: Regex = Regex::new(r"(?s)<[a-zA-Z][^>]*>").unwrap();
    static ref BLANK_RUN: Regex = Regex::new(r"\n[ \t]*(\n[ \t]*)+").unwrap();
}

/// Removes active content from untrusted HTML: executable and embedding
/// elements, inline event handlers and script URLs. Styling is kept.
pub fn sanitize_html(html: &str) -> String {
    let mut out = html.to_string();
    for block in STRIPPED_BLOCKS.iter() {
        out = block.replace_all(&out, "").into_owned();
    }
    out = DANGLING_TAG.replace_all(&out, "").into_owned();
    OPENING_TAG
        .replace_all(&out, |caps: &regex::Captures| {
            let tag = EVENT_ATTR.replace_all(&caps[0], "");
            SCRIPT_URL.replace_all(&tag, r##"$1="#""##).into_owned()
        })
        .into_owned()
}

/// Visible text of an HTML fragment: tags stripped, entities decoded, block
/// boundaries kept as line breaks.
pub fn text_content(html: &str) -> String {
    let without_blocks = NON_TEXT_BLOCK.replace_all(html, "");
    let with_breaks = BLOCK_BREAK.replace_all(&without_blocks, "\n$0");
    let stripped = TAG.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);
    let lines: Vec<&str> = decoded.lines().map(str::trim).collect();
    BLANK_RUN
        .replace_all(lines.join("\n").trim(), "\n\n")
        .into_owned()
}
