use lazy_static::lazy_static;
use regex::Regex;

/// Per-language signature patterns. Earlier entries win ties.
const SIGNATURES: &[(&str, &[&str])] = &[
    (
        "rust",
        &[
            r"\bfn\s+\w+\s*[<(]",
            r"\blet\s+mut\b",
            r"\bimpl\b.*\{",
            r"\bpub\s+(fn|struct|enum|mod|trait)\b",
            r"\w+!\(",
            r"&mut\s",
            r"^\s*use\s+[\w:]+(::\{[^}]*\})?;",
        ],
    ),
    (
        "typescript",
        &[
            r":\s*(string|number|boolean|void)\b",
            r"^\s*(export\s+)?interface\s+\w+",
            r"^\s*(export\s+)?type\s+\w+\s*=",
        ],
    ),
    (
        "javascript",
        &[
            r"\bfunction\s*\w*\s*\(",
            r"\b(const|let|var)\s+\w+\s*=",
            r"=>",
            r"\bconsole\.log\(",
            r"\bdocument\.\w+",
            r"\brequire\(",
            r"\bnew\s+Chart\s*\(",
        ],
    ),
    (
        "python",
        &[
            r"^\s*def\s+\w+\s*\(.*\)\s*(->\s*[\w\[\], ]+)?:\s*$",
            r"^\s*(import\s+\w+|from\s+[\w.]+\s+import\b)",
            r"\bself\.\w+",
            r"\bprint\(",
            r"^\s*(elif|except|class\s+\w+.*:)\b",
        ],
    ),
    (
        "java",
        &[
            r"\bpublic\s+(static\s+)?(final\s+)?(class|void|interface)\b",
            r"\bSystem\.out\.",
            r"\b(private|protected)\s+\w+(<[^>]*>)?\s+\w+\s*[;=]",
        ],
    ),
    (
        "go",
        &[r"\bfunc\s+(\(\w+\s+\*?\w+\)\s*)?\w+\(", r"^package\s+\w+", r":=", r"\bfmt\.\w+"],
    ),
    (
        "cpp",
        &[r"\bstd::\w+", r"\bcout\s*<<", r"^\s*template\s*<", r"^\s*#include\s*<\w+>"],
    ),
    (
        "c",
        &[r"^\s*#include\s*<\w+\.h>", r"\bint\s+main\s*\(", r"\bprintf\s*\(", r"\bmalloc\("],
    ),
    (
        "sql",
        &[
            r"(?i)\bselect\b.+\bfrom\b",
            r"(?i)\binsert\s+into\b",
            r"(?i)\bcreate\s+table\b",
            r"(?i)\bupdate\s+\w+\s+set\b",
            r"(?i)\bwhere\b.+=",
        ],
    ),
    (
        "bash",
        &[
            r"^#!.*\b(ba|z)?sh\b",
            r"^\s*(echo|export|cd|sudo|apt(-get)?|npm|pip|cargo|git|curl)\s",
            r"\$\{\w+\}",
            r"^\s*(fi|done|esac)\s*$",
        ],
    ),
    (
        "css",
        &[
            r"^\s*[.#]?[\w-]+(\s*[,>]\s*[.#]?[\w-]+)*\s*\{\s*$",
            r"^\s*[\w-]+\s*:\s*[^;{}]+;\s*$",
            r"@media\b",
        ],
    ),
];

lazy_static! {
    static ref COMPILED: Vec<(&'static str, Vec<Regex>)> = SIGNATURES
        .iter()
        .map(|(lang, patterns)| {
            let regexes = patterns
                .iter()
                .map(|p| Regex::new(&format!("(?m){p}")).unwrap())
                .collect();
            (*lang, regexes)
        })
        .collect();
}

/// Signature hits per language, best first. Languages without hits are
/// omitted.
pub(crate) fn language_hits(code: &str) -> Vec<(&'static str, usize)> {
    let mut hits: Vec<(&'static str, usize)> = COMPILED
        .iter()
        .map(|(lang, regexes)| (*lang, regexes.iter().filter(|r| r.is_match(code)).count()))
        .filter(|(_, count)| *count > 0)
        .collect();
    // Stable sort keeps table order on ties.
    hits.sort_by(|a, b| b.1.cmp(&a.1));
    hits
}

/// Best-effort guess of the programming language of a code snippet.
pub fn guess_language(code: &str) -> Option<&'static str> {
    language_hits(code).first().map(|(lang, _)| *lang)
}
