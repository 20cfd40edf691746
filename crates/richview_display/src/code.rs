use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use richview_domain::{escape_html, escape_text};

/// Token pattern for one language. Alternatives are tried left to right, so
/// comments and strings shadow keywords inside them.
struct Grammar {
    tokens: Regex,
}

const C_COMMENT: &str = r"//[^\n]*|/\*(?s:.*?)\*/";
const HASH_COMMENT: &str = r"#[^\n]*";
const QUOTED: &str = r#""(?:\\.|[^"\\\n])*"|'(?:\\.|[^'\\\n])*'"#;
const RUST_STRING: &str = r#""(?:\\.|[^"\\])*"|'(?:\\.|[^'\\\n])'"#;
const NUMBER: &str = r"\b(?:0x[0-9a-fA-F]+|\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)\b";

fn grammar(comment: Option<&str>, string: &str, keywords: &[&str]) -> Grammar {
    let keywords = keywords.join("|");
    let comment = comment.map(|c| format!("(?P<comment>{c})|")).unwrap_or_default();
    let pattern = format!(
        r"{comment}(?P<string>{string})|(?P<keyword>\b(?:{keywords})\b)|(?P<number>{NUMBER})"
    );
    // Patterns are assembled from the constant tables below.
    Grammar { tokens: Regex::new(&pattern).unwrap() }
}

lazy_static! {
    static ref GRAMMARS: HashMap<&'static str, Grammar> = {
        let mut grammars = HashMap::new();
        grammars.insert("rust", grammar(Some(C_COMMENT), RUST_STRING, &[
            "as", "async", "await", "break", "const", "continue", "crate", "else", "enum", "fn", "for", "if",
            "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "self", "Self",
            "static", "struct", "super", "trait", "type", "unsafe", "use", "where", "while", "true", "false",
        ]));
        grammars.insert("python", grammar(Some(HASH_COMMENT), &format!(r#"(?s:""".*?"""|'''.*?''')|{QUOTED}"#), &[
            "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif", "else",
            "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "None", "not",
            "or", "pass", "raise", "return", "True", "False", "try", "while", "with", "yield",
        ]));
        let js = [
            "async", "await", "break", "case", "catch", "class", "const", "continue", "default", "delete", "do",
            "else", "export", "extends", "finally", "for", "function", "if", "import", "in", "instanceof", "let",
            "new", "null", "of", "return", "switch", "this", "throw", "true", "false", "try", "typeof",
            "undefined", "var", "void", "while", "yield",
        ];
        let template = format!(r"`(?:\\.|[^`\\])*`|{QUOTED}");
        grammars.insert("javascript", grammar(Some(C_COMMENT), &template, &js));
        let ts: Vec<&str> = js
            .iter()
            .copied()
            .chain(["interface", "type", "enum", "implements", "private", "public", "readonly", "string",
                "number", "boolean", "any", "unknown", "never"])
            .collect();
        grammars.insert("typescript", grammar(Some(C_COMMENT), &template, &ts));
        grammars.insert("java", grammar(Some(C_COMMENT), QUOTED, &[
            "abstract", "boolean", "break", "case", "catch", "char", "class", "continue", "default", "do",
            "double", "else", "enum", "extends", "final", "finally", "float", "for", "if", "implements",
            "import", "instanceof", "int", "interface", "long", "new", "null", "package", "private",
            "protected", "public", "return", "static", "super", "switch", "this", "throw", "throws", "true",
            "false", "try", "void", "while",
        ]));
        let c = [
            "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else", "enum",
            "extern", "float", "for", "goto", "if", "int", "long", "return", "short", "signed", "sizeof",
            "static", "struct", "switch", "typedef", "union", "unsigned", "void", "volatile", "while",
            "include", "define", "NULL",
        ];
        grammars.insert("c", grammar(Some(C_COMMENT), QUOTED, &c));
        let cpp: Vec<&str> = c
            .iter()
            .copied()
            .chain(["class", "namespace", "template", "typename", "public", "private", "protected", "virtual",
                "new", "delete", "using", "nullptr", "auto", "true", "false", "std"])
            .collect();
        grammars.insert("cpp", grammar(Some(C_COMMENT), QUOTED, &cpp));
        grammars.insert("go", grammar(Some(C_COMMENT), &format!(r"`[^`]*`|{QUOTED}"), &[
            "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough", "for",
            "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return", "select",
            "struct", "switch", "type", "var", "nil", "true", "false",
        ]));
        grammars.insert("sql", grammar(Some(r"--[^\n]*|/\*(?s:.*?)\*/"), QUOTED, &[
            "(?i:select)", "(?i:from)", "(?i:where)", "(?i:insert)", "(?i:into)", "(?i:values)", "(?i:update)",
            "(?i:set)", "(?i:delete)", "(?i:create)", "(?i:table)", "(?i:drop)", "(?i:alter)", "(?i:join)",
            "(?i:left)", "(?i:right)", "(?i:inner)", "(?i:outer)", "(?i:on)", "(?i:group)", "(?i:by)",
            "(?i:order)", "(?i:having)", "(?i:limit)", "(?i:and)", "(?i:or)", "(?i:not)", "(?i:null)",
            "(?i:as)", "(?i:distinct)", "(?i:union)", "(?i:primary)", "(?i:key)",
        ]));
        grammars.insert("bash", grammar(Some(HASH_COMMENT), QUOTED, &[
            "if", "then", "else", "elif", "fi", "for", "while", "do", "done", "case", "esac", "function",
            "in", "return", "export", "local", "echo", "exit",
        ]));
        grammars.insert("json", grammar(None, r#""(?:\\.|[^"\\])*""#, &["true", "false", "null"]));
        grammars.insert("css", grammar(Some(r"/\*(?s:.*?)\*/"), QUOTED, &[
            "important", "media", "import", "keyframes", "from", "to", "inherit", "initial", "none", "auto",
        ]));
        grammars
    };
    static ref MARKUP: Regex = Regex::new(
        r#"(?P<comment><!--(?s:.*?)-->)|(?P<string>"[^"]*"|'[^']*')|(?P<keyword></?[\w:.-]+|/?>|<\?[\w-]+|\?>)"#
    )
    .unwrap();
}

fn canonical(lang: &str) -> &str {
    match lang {
        "rs" => "rust",
        "py" | "python3" => "python",
        "js" | "jsx" | "node" | "mjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "h" => "c",
        "c++" | "cc" | "cxx" | "hpp" => "cpp",
        "golang" => "go",
        "sh" | "shell" | "zsh" | "console" => "bash",
        "htm" | "svg" => "html",
        other => other,
    }
}

/// Colours source code with per-language keyword, string, comment and number
/// patterns. Output is escaped HTML with `hl-*` span classes.
#[derive(Clone, Debug, Default)]
pub struct CodeHighlighter;

impl CodeHighlighter {
    pub fn new() -> Self {
        Self
    }

    /// Whether `lang` has a pattern table.
    pub fn supports(&self, lang: &str) -> bool {
        let lang = canonical(lang);
        GRAMMARS.contains_key(lang) || matches!(lang, "xml" | "html")
    }

    /// Highlighted code without the surrounding block.
    pub fn highlight(&self, code: &str, lang: &str) -> String {
        let lang = canonical(lang);
        if matches!(lang, "xml" | "html") {
            return highlight_with(&MARKUP, code);
        }
        match GRAMMARS.get(lang) {
            Some(grammar) => highlight_with(&grammar.tokens, code),
            None => escape_text(code),
        }
    }

    /// `<pre><code>` block for `code`. Unknown languages are escaped only.
    pub fn render(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.map(|l| canonical(&l.to_lowercase()).to_string());
        let body = match &lang {
            Some(lang) => self.highlight(code, lang),
            None => escape_text(code),
        };
        match lang {
            Some(lang) => format!("<pre><code class=\"language-{}\">{body}</code></pre>", escape_html(&lang)),
            None => format!("<pre><code>{body}</code></pre>"),
        }
    }
}

fn highlight_with(tokens: &Regex, code: &str) -> String {
    let mut out = String::with_capacity(code.len() * 2);
    let mut last = 0;
    for caps in tokens.captures_iter(code) {
        let Some((class, m)) = ["comment", "string", "keyword", "number"]
            .iter()
            .find_map(|name| caps.name(name).map(|m| (*name, m)))
        else {
            continue;
        };
        if m.as_str().is_empty() {
            continue;
        }
        out.push_str(&escape_text(&code[last..m.start()]));
        out.push_str(&format!("<span class=\"hl-{class}\">{}</span>", escape_text(m.as_str())));
        last = m.end();
    }
    out.push_str(&escape_text(&code[last..]));
    out
}
