use std::num::NonZeroUsize;
use std::sync::Mutex;

use cardmark_core::{CodeHighlighter, HighlightError, normalize_language};
use lru::LruCache;
use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme as SyntectTheme, ThemeSet};
use syntect::html::{IncludeBackground, styled_line_to_highlighted_html};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::Theme;

type CacheKey = (Theme, String, String); // (theme, syntax name, code)
type Cache = Mutex<LruCache<CacheKey, String>>;

const CACHE_SIZE: usize = 256;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);
static HIGHLIGHT_CACHE: Lazy<Cache> = Lazy::new(|| {
    Mutex::new(LruCache::new(
        NonZeroUsize::new(CACHE_SIZE).expect("cache size is non-zero"),
    ))
});

/// syntect with inline styles from a theme matching [`Theme`].
///
/// Languages syntect has no grammar for are reported as
/// [`HighlightError::UnknownLanguage`] so the caller can use the built-in
/// lexer instead of plain text.
#[derive(Debug, Clone, Copy)]
pub struct SyntectHighlighter {
    theme: Theme,
}

impl SyntectHighlighter {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    pub fn supports(language: &str) -> bool {
        find_syntax(language).is_some()
    }
}

impl CodeHighlighter for SyntectHighlighter {
    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError> {
        let syntax =
            find_syntax(language).ok_or_else(|| HighlightError::UnknownLanguage(language.to_string()))?;

        let cache_key = (self.theme, syntax.name.clone(), code.to_string());
        if let Some(cached) = HIGHLIGHT_CACHE
            .lock()
            .ok()
            .and_then(|mut cache| cache.get(&cache_key).cloned())
        {
            return Ok(cached);
        }

        let theme = pick_theme(self.theme, &THEME_SET)
            .ok_or_else(|| HighlightError::Engine("no syntect themes loaded".to_string()))?;
        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut out = String::with_capacity(code.len() * 4);
        for line in LinesWithEndings::from(code) {
            out.push_str(&highlight_line(line, &mut highlighter)?);
        }

        if let Ok(mut cache) = HIGHLIGHT_CACHE.lock() {
            cache.put(cache_key, out.clone());
        }
        Ok(out)
    }
}

fn find_syntax(language: &str) -> Option<&'static SyntaxReference> {
    let language = language.trim();
    if language.is_empty() {
        return None;
    }
    SYNTAX_SET
        .find_syntax_by_token(&normalize_language(language))
        .or_else(|| SYNTAX_SET.find_syntax_by_token(language))
}

fn pick_theme(theme: Theme, theme_set: &ThemeSet) -> Option<&SyntectTheme> {
    let candidates = match theme {
        Theme::Dark => ["Monokai Extended Bright", "Monokai Extended", "base16-ocean.dark"],
        Theme::Light => ["InspiredGitHub", "Solarized (light)", "base16-ocean.light"],
        Theme::Auto => ["InspiredGitHub", "Solarized (light)", "base16-ocean.light"],
    };
    candidates
        .iter()
        .find_map(|name| theme_set.themes.get(*name))
        .or_else(|| theme_set.themes.values().next())
}

fn highlight_line(line: &str, highlighter: &mut HighlightLines) -> Result<String, HighlightError> {
    let ranges = highlighter
        .highlight_line(line, &SYNTAX_SET)
        .map_err(|err| HighlightError::Engine(err.to_string()))?;
    let html = styled_line_to_highlighted_html(&ranges, IncludeBackground::No)
        .map_err(|err| HighlightError::Engine(err.to_string()))?;
    Ok(strip_font_weight(&html))
}

// Bold runs in code blocks shift column alignment.
fn strip_font_weight(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(pos) = rest.find("font-weight:") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + "font-weight:".len()..];
        let end = match tail.find(';') {
            Some(index) => index + 1,
            None => {
                rest = "";
                break;
            }
        };
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}
