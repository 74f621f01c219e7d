use crate::error::HighlightError;
use html_escape::encode_text;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};

/// A highlighting engine that can turn code into classified HTML.
///
/// The built-in lexer implements this, and richer engines plug in through the
/// same seam. An engine that cannot handle a language returns an error and the
/// caller falls back to [`highlight`].
pub trait CodeHighlighter: Send + Sync {
    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError>;
}

/// The dependency-free lexer behind [`highlight`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinHighlighter;

impl CodeHighlighter for BuiltinHighlighter {
    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError> {
        Ok(highlight(code, language))
    }
}

/// Reserved words and builtin names for one language.
#[derive(Debug)]
pub struct LanguageProfile {
    pub name: &'static str,
    keywords: HashSet<&'static str>,
    builtins: HashSet<&'static str>,
}

impl LanguageProfile {
    fn new(name: &'static str, keywords: &[&'static str], builtins: &[&'static str]) -> Self {
        Self {
            name,
            keywords: keywords.iter().copied().collect(),
            builtins: builtins.iter().copied().collect(),
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.keywords.contains(word)
    }

    pub fn is_builtin(&self, word: &str) -> bool {
        self.builtins.contains(word)
    }
}

const GENERIC_KEYWORDS: &[&str] = &[
    "abstract", "async", "await", "boolean", "break", "byte", "case", "catch", "char", "class",
    "const", "continue", "debugger", "default", "delete", "do", "double", "else", "enum",
    "export", "extends", "false", "final", "finally", "float", "for", "from", "func",
    "function", "goto", "if", "implements", "import", "in", "instanceof", "int", "interface",
    "let", "long", "native", "new", "nil", "null", "package", "private", "protected", "public",
    "return", "short", "static", "struct", "super", "switch", "synchronized", "this", "throw",
    "throws", "transient", "true", "try", "type", "typeof", "undefined", "var", "void",
    "volatile", "while", "with", "yield", "def", "elif", "except", "lambda", "pass", "raise",
    "None", "True", "False", "and", "or", "not", "is", "as", "fn", "mut", "impl", "trait", "pub",
    "mod", "use", "crate", "match", "loop", "move", "ref", "self", "Self", "where", "unsafe",
    "print",
];

const GENERIC_BUILTINS: &[&str] = &[
    "String", "Integer", "Boolean", "Double", "Float", "Long", "Object", "Array", "List", "Map",
    "Set", "Math", "Promise", "Date", "Error", "console", "fmt", "Vec", "Option", "Result", "Box",
    "int", "str", "float", "bool", "dict", "tuple", "bytes", "len", "range", "System", "Scanner",
    "StringBuilder", "ArrayList", "HashMap",
];

static GENERIC: Lazy<LanguageProfile> =
    Lazy::new(|| LanguageProfile::new("generic", GENERIC_KEYWORDS, GENERIC_BUILTINS));

static PROFILES: Lazy<HashMap<&'static str, LanguageProfile>> = Lazy::new(|| {
    let profiles = [
        LanguageProfile::new(
            "python",
            &[
                "False", "None", "True", "and", "as", "assert", "async", "await", "break",
                "class", "continue", "def", "del", "elif", "else", "except", "finally", "for",
                "from", "global", "if", "import", "in", "is", "lambda", "nonlocal", "not", "or",
                "pass", "raise", "return", "try", "while", "with", "yield", "print", "exec",
                "match", "case", "self",
            ],
            &[
                "int", "str", "float", "bool", "dict", "list", "tuple", "set", "bytes", "len",
                "range", "type", "object", "open", "input", "enumerate", "zip", "map", "filter",
                "sorted", "isinstance", "super", "Exception", "ValueError", "TypeError",
                "KeyError",
            ],
        ),
        LanguageProfile::new(
            "rust",
            &[
                "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else",
                "enum", "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop",
                "match", "mod", "move", "mut", "pub", "ref", "return", "self", "Self", "static",
                "struct", "super", "trait", "true", "type", "unsafe", "use", "where", "while",
            ],
            &[
                "Vec", "Option", "Result", "Box", "String", "Some", "None", "Ok", "Err", "Rc",
                "Arc", "HashMap", "HashSet", "str", "bool", "char", "u8", "u16", "u32", "u64",
                "usize", "i8", "i16", "i32", "i64", "isize", "f32", "f64", "println", "format",
            ],
        ),
        LanguageProfile::new(
            "javascript",
            &[
                "async", "await", "break", "case", "catch", "class", "const", "continue",
                "debugger", "default", "delete", "do", "else", "export", "extends", "false",
                "finally", "for", "from", "function", "if", "import", "in", "instanceof", "let",
                "new", "null", "of", "return", "static", "super", "switch", "this", "throw",
                "true", "try", "typeof", "undefined", "var", "void", "while", "with", "yield",
            ],
            &[
                "Array", "Object", "String", "Number", "Boolean", "Map", "Set", "Math", "JSON",
                "Promise", "Date", "Error", "RegExp", "Symbol", "console", "window", "document",
            ],
        ),
        LanguageProfile::new(
            "typescript",
            &[
                "abstract", "any", "as", "async", "await", "boolean", "break", "case", "catch",
                "class", "const", "continue", "declare", "default", "do", "else", "enum",
                "export", "extends", "false", "finally", "for", "from", "function", "if",
                "implements", "import", "in", "interface", "keyof", "let", "namespace", "never",
                "new", "null", "number", "private", "protected", "public", "readonly", "return",
                "string", "super", "switch", "this", "throw", "true", "try", "type", "typeof",
                "undefined", "unknown", "var", "void", "while",
            ],
            &[
                "Array", "Object", "String", "Number", "Boolean", "Map", "Set", "Math", "JSON",
                "Promise", "Date", "Error", "Record", "Partial", "Readonly", "console",
            ],
        ),
        LanguageProfile::new(
            "java",
            &[
                "abstract", "boolean", "break", "byte", "case", "catch", "char", "class",
                "const", "continue", "default", "do", "double", "else", "enum", "extends",
                "false", "final", "finally", "float", "for", "if", "implements", "import",
                "instanceof", "int", "interface", "long", "native", "new", "null", "package",
                "private", "protected", "public", "return", "short", "static", "super", "switch",
                "synchronized", "this", "throw", "throws", "transient", "true", "try", "var",
                "void", "volatile", "while",
            ],
            &[
                "String", "Integer", "Boolean", "Double", "Float", "Long", "Object", "List",
                "Map", "Set", "System", "Scanner", "StringBuilder", "ArrayList", "HashMap",
                "Math", "Exception",
            ],
        ),
        LanguageProfile::new(
            "go",
            &[
                "break", "case", "chan", "const", "continue", "default", "defer", "else",
                "fallthrough", "for", "func", "go", "goto", "if", "import", "interface", "map",
                "package", "range", "return", "select", "struct", "switch", "type", "var", "nil",
                "true", "false",
            ],
            &[
                "int", "int64", "uint", "float64", "string", "bool", "byte", "rune", "error",
                "make", "new", "len", "cap", "append", "copy", "panic", "recover", "fmt",
            ],
        ),
        LanguageProfile::new(
            "c",
            &[
                "auto", "break", "case", "char", "const", "continue", "default", "do", "double",
                "else", "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long",
                "register", "return", "short", "signed", "sizeof", "static", "struct", "switch",
                "typedef", "union", "unsigned", "void", "volatile", "while", "NULL",
            ],
            &[
                "size_t", "printf", "scanf", "malloc", "free", "memcpy", "strlen", "FILE",
                "uint8_t", "uint32_t", "int32_t", "int64_t",
            ],
        ),
        LanguageProfile::new(
            "cpp",
            &[
                "auto", "bool", "break", "case", "catch", "char", "class", "const", "constexpr",
                "continue", "default", "delete", "do", "double", "else", "enum", "explicit",
                "extern", "false", "float", "for", "friend", "if", "inline", "int", "long",
                "namespace", "new", "noexcept", "nullptr", "operator", "override", "private",
                "protected", "public", "return", "short", "signed", "sizeof", "static",
                "struct", "switch", "template", "this", "throw", "true", "try", "typedef",
                "typename", "union", "unsigned", "using", "virtual", "void", "volatile",
                "while",
            ],
            &[
                "std", "string", "vector", "map", "set", "unordered_map", "cout", "cin", "endl",
                "size_t", "unique_ptr", "shared_ptr", "printf",
            ],
        ),
        LanguageProfile::new(
            "bash",
            &[
                "if", "then", "else", "elif", "fi", "case", "esac", "for", "while", "until", "do",
                "done", "in", "function", "return", "local", "export", "readonly", "select",
            ],
            &[
                "echo", "cd", "ls", "grep", "sed", "awk", "cat", "printf", "read", "source",
                "exit", "set", "unset", "test",
            ],
        ),
        LanguageProfile::new(
            "sql",
            &[
                "SELECT", "FROM", "WHERE", "INSERT", "INTO", "VALUES", "UPDATE", "SET",
                "DELETE", "CREATE", "TABLE", "DROP", "ALTER", "JOIN", "LEFT", "RIGHT", "INNER",
                "OUTER", "ON", "GROUP", "BY", "ORDER", "HAVING", "LIMIT", "AS", "AND", "OR",
                "NOT", "NULL", "IS", "IN", "DISTINCT", "UNION", "select", "from", "where",
                "insert", "into", "values", "update", "set", "delete", "create", "table", "join",
                "on", "group", "by", "order", "limit", "as", "and", "or", "not", "null",
            ],
            &[
                "COUNT", "SUM", "AVG", "MIN", "MAX", "INTEGER", "TEXT", "VARCHAR", "count",
                "sum", "avg", "min", "max",
            ],
        ),
    ];
    profiles
        .into_iter()
        .map(|profile| (profile.name, profile))
        .collect()
});

/// Lowercases a fence tag and resolves common aliases (`py` → `python`).
pub fn normalize_language(tag: &str) -> String {
    let lower = tag.trim().to_lowercase();
    let canonical = match lower.as_str() {
        "py" | "py3" | "python3" => "python",
        "rs" => "rust",
        "js" | "jsx" | "mjs" | "node" => "javascript",
        "ts" | "tsx" => "typescript",
        "golang" => "go",
        "h" => "c",
        "c++" | "cc" | "cxx" | "hpp" => "cpp",
        "sh" | "shell" | "zsh" | "console" => "bash",
        "psql" | "mysql" | "sqlite" => "sql",
        _ => return lower,
    };
    canonical.to_string()
}

/// The profile for a fence tag, or the language-agnostic union when the tag
/// is empty or unknown.
pub fn language_profile(tag: &str) -> &'static LanguageProfile {
    let normalized = normalize_language(tag);
    PROFILES.get(normalized.as_str()).unwrap_or(&*GENERIC)
}

/// Highlights `code` with the built-in lexer. Always returns escaped HTML.
pub fn highlight(code: &str, language: &str) -> String {
    if code.is_empty() {
        return String::new();
    }
    scan(code, language_profile(language))
}

/// Highlights with `engine` when one is present, falling back to the
/// built-in lexer when it is absent, fails or panics.
pub fn highlight_with(engine: Option<&dyn CodeHighlighter>, code: &str, language: &str) -> String {
    if let Some(engine) = engine {
        match panic::catch_unwind(AssertUnwindSafe(|| engine.highlight(code, language))) {
            Ok(Ok(html)) => return html,
            Ok(Err(err)) => {
                log::debug!("using built-in highlighter for `{}`: {}", language, err);
            }
            Err(_) => {
                log::debug!("highlighting engine panicked on `{}`, using built-in", language);
            }
        }
    }
    highlight(code, language)
}

const NUMBER_TAIL: &[u8] = b".xXabcdefABCDEFLlUu_";

fn scan(code: &str, profile: &LanguageProfile) -> String {
    let bytes = code.as_bytes();
    let mut out = String::with_capacity(code.len() + code.len() / 2);
    let mut i = 0;

    while i < code.len() {
        let rest = &code[i..];
        let Some(ch) = rest.chars().next() else {
            break;
        };

        if ch == '"' || ch == '\'' {
            let end = string_end(code, i, ch);
            push_span(&mut out, "hl-s", &code[i..end]);
            i = end;
            continue;
        }

        let hash_comment = ch == '#' && (i == 0 || matches!(bytes[i - 1], b' ' | b'\n' | b'\t'));
        if rest.starts_with("//") || hash_comment {
            let end = rest.find('\n').map_or(code.len(), |idx| i + idx);
            push_span(&mut out, "hl-c", &code[i..end]);
            i = end;
            continue;
        }

        if rest.starts_with("/*") {
            let end = rest[2..]
                .find("*/")
                .map_or(code.len(), |idx| i + 2 + idx + 2);
            push_span(&mut out, "hl-c", &code[i..end]);
            i = end;
            continue;
        }

        let leading_dot = ch == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
        if ch.is_ascii_digit() || leading_dot {
            let len = rest
                .bytes()
                .take_while(|b| b.is_ascii_digit() || NUMBER_TAIL.contains(b))
                .count();
            push_span(&mut out, "hl-n", &rest[..len]);
            i += len;
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let len = rest
                .char_indices()
                .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
                .map_or(rest.len(), |(idx, _)| idx);
            let word = &rest[..len];
            if profile.is_keyword(word) {
                push_span(&mut out, "hl-k", word);
            } else if profile.is_builtin(word) {
                push_span(&mut out, "hl-t", word);
            } else {
                out.push_str(&encode_text(word));
            }
            i += len;
            continue;
        }

        let len = ch.len_utf8();
        out.push_str(&encode_text(&rest[..len]));
        i += len;
    }

    out
}

// Byte offset just past the closing quote, or the end of input when the
// literal is unterminated.
fn string_end(code: &str, start: usize, quote: char) -> usize {
    let body_start = start + quote.len_utf8();
    let mut chars = code[body_start..].char_indices();
    while let Some((idx, ch)) = chars.next() {
        if ch == '\\' {
            chars.next();
            continue;
        }
        if ch == quote {
            return body_start + idx + ch.len_utf8();
        }
    }
    code.len()
}

fn push_span(out: &mut String, class: &str, text: &str) {
    out.push_str("<span class=\"");
    out.push_str(class);
    out.push_str("\">");
    out.push_str(&encode_text(text));
    out.push_str("</span>");
}

#[cfg(test)]
mod tests {
    use super::{
        BuiltinHighlighter, CodeHighlighter, highlight, highlight_with, language_profile,
        normalize_language,
    };
    use crate::error::HighlightError;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    struct FailingEngine;

    impl CodeHighlighter for FailingEngine {
        fn highlight(&self, _code: &str, language: &str) -> Result<String, HighlightError> {
            Err(HighlightError::UnknownLanguage(language.to_string()))
        }
    }

    struct PanickingEngine;

    impl CodeHighlighter for PanickingEngine {
        fn highlight(&self, _code: &str, _language: &str) -> Result<String, HighlightError> {
            panic!("engine exploded");
        }
    }

    struct UpperEngine;

    impl CodeHighlighter for UpperEngine {
        fn highlight(&self, code: &str, _language: &str) -> Result<String, HighlightError> {
            Ok(code.to_uppercase())
        }
    }

    #[test]
    fn python_print_is_reserved() {
        assert_eq!(
            highlight("print(1)", "python"),
            "<span class=\"hl-k\">print</span>(<span class=\"hl-n\">1</span>)"
        );
    }

    #[test]
    fn strings_are_escaped_and_wrapped() {
        assert_eq!(
            highlight("x = \"a<b\"", "python"),
            "x = <span class=\"hl-s\">\"a&lt;b\"</span>"
        );
    }

    #[test]
    fn escaped_quote_does_not_close_string() {
        assert_eq!(
            highlight(r#"'it\'s' x"#, "js"),
            r#"<span class="hl-s">'it\'s'</span> x"#
        );
    }

    #[test]
    fn unterminated_string_consumes_rest() {
        assert_eq!(
            highlight("s = \"open\nnext", "python"),
            "s = <span class=\"hl-s\">\"open\nnext</span>"
        );
    }

    #[test]
    fn line_comments() {
        assert_eq!(
            highlight("a // note\nb", ""),
            "a <span class=\"hl-c\">// note</span>\nb"
        );
        assert_eq!(
            highlight("# title\nx", "bash"),
            "<span class=\"hl-c\"># title</span>\nx"
        );
    }

    #[test]
    fn hash_inside_word_is_not_a_comment() {
        assert_eq!(highlight("a#b", "text"), "a#b");
    }

    #[test]
    fn block_comment_may_be_unterminated() {
        assert_eq!(
            highlight("x /* a */ y", "c"),
            "x <span class=\"hl-c\">/* a */</span> y"
        );
        assert_eq!(
            highlight("x /* open", "c"),
            "x <span class=\"hl-c\">/* open</span>"
        );
    }

    #[test]
    fn numbers_take_hex_and_suffixes() {
        assert_eq!(
            highlight("0xFFu .5", "c"),
            "<span class=\"hl-n\">0xFFu</span> <span class=\"hl-n\">.5</span>"
        );
    }

    #[test]
    fn builtins_use_type_class() {
        assert_eq!(
            highlight("Vec", "rust"),
            "<span class=\"hl-t\">Vec</span>"
        );
    }

    #[test]
    fn unknown_language_uses_union() {
        assert_eq!(
            highlight("fn def", "klingon"),
            "<span class=\"hl-k\">fn</span> <span class=\"hl-k\">def</span>"
        );
    }

    #[test]
    fn profiles_are_language_specific() {
        // `fn` is not a Python keyword.
        assert_eq!(highlight("fn", "python"), "fn");
    }

    #[test]
    fn stray_markup_is_escaped() {
        assert_eq!(highlight("<a & b>", ""), "&lt;a &amp; b&gt;");
    }

    #[test]
    fn empty_code_stays_empty() {
        assert_eq!(highlight("", "python"), "");
    }

    #[rstest]
    #[case("py", "python")]
    #[case("PY", "python")]
    #[case("js", "javascript")]
    #[case("rs", "rust")]
    #[case("c++", "cpp")]
    #[case("shell", "bash")]
    #[case("haskell", "haskell")]
    fn aliases_normalize(#[case] tag: &str, #[case] expected: &str) {
        assert_eq!(normalize_language(tag), expected);
    }

    #[test]
    fn profile_lookup_falls_back_to_generic() {
        assert_eq!(language_profile("Py").name, "python");
        assert_eq!(language_profile("").name, "generic");
    }

    #[test]
    fn engine_failure_falls_back() {
        assert_eq!(
            highlight_with(Some(&FailingEngine), "print(1)", "python"),
            highlight("print(1)", "python")
        );
    }

    #[test]
    fn engine_panic_falls_back() {
        assert_eq!(
            highlight_with(Some(&PanickingEngine), "print(1)", "python"),
            highlight("print(1)", "python")
        );
    }

    #[test]
    fn engine_success_wins() {
        assert_eq!(highlight_with(Some(&UpperEngine), "abc", "x"), "ABC");
        assert_eq!(
            BuiltinHighlighter.highlight("abc", "x").unwrap(),
            highlight("abc", "x")
        );
    }
}
