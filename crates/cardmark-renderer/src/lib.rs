mod highlight;
mod runtime;

use std::collections::BTreeMap;
use std::sync::Arc;

use cardmark_core::{RenderOptions, highlight_with};

pub use highlight::SyntectHighlighter;
pub use runtime::{DiagramRuntime, RUNTIME_ENV};

const BASE_CSS: &str = include_str!("../assets/cardmark.css");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Theme {
    Auto,
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Some(Theme::Auto),
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

/// Which engine colors fenced code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HighlightBackend {
    /// syntect, falling back to the built-in lexer for languages it lacks.
    #[default]
    Syntect,
    /// The built-in lexer only.
    Builtin,
}

/// Renders notes with a theme stylesheet, a highlighting engine and an
/// optional diagram runtime.
#[derive(Debug, Clone)]
pub struct Renderer {
    theme: Theme,
    custom_vars: BTreeMap<String, String>,
    backend: HighlightBackend,
    diagram_runtime: Option<Arc<str>>,
    inline_css: bool,
}

impl Renderer {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            custom_vars: BTreeMap::new(),
            backend: HighlightBackend::default(),
            diagram_runtime: None,
            inline_css: true,
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_vars.insert(key.into(), value.into());
        self
    }

    pub fn with_highlight(mut self, backend: HighlightBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_diagram_runtime(mut self, runtime: Option<Arc<str>>) -> Self {
        self.diagram_runtime = runtime;
        self
    }

    /// Leaves the `<style>` block out of [`Renderer::render`] output.
    pub fn without_stylesheet(mut self) -> Self {
        self.inline_css = false;
        self
    }

    /// Theme variables followed by the base rules, without a `<style>` wrapper.
    pub fn css(&self) -> String {
        let mut out = String::new();
        let (light_vars, dark_vars) = default_theme_vars();

        match self.theme {
            Theme::Auto => {
                out.push_str(&root_block(&light_vars, true));
                out.push_str("@media (prefers-color-scheme: dark) {\n");
                out.push_str(&indent_root_block(&dark_vars));
                out.push_str("}\n");
            }
            Theme::Light => {
                out.push_str(&root_block(&light_vars, true));
            }
            Theme::Dark => {
                out.push_str(&root_block(&dark_vars, true));
            }
        }

        if !self.custom_vars.is_empty() {
            out.push_str(&root_block(&self.custom_vars, false));
        }

        out.push_str(BASE_CSS);
        out
    }

    /// The stylesheet placed ahead of every rendered note.
    pub fn stylesheet(&self) -> String {
        format!("<style>\n{}</style>\n", self.css())
    }

    pub fn render(&self, text: &str, cloze_mode: bool) -> String {
        let stylesheet = self.inline_css.then(|| self.stylesheet());
        let syntect = SyntectHighlighter::new(self.theme);

        let mut options = RenderOptions::new()
            .with_cloze_mode(cloze_mode)
            .with_diagram_runtime(self.diagram_runtime.as_deref());
        if let Some(stylesheet) = stylesheet.as_deref() {
            options = options.with_stylesheet(stylesheet);
        }
        if self.backend == HighlightBackend::Syntect {
            options = options.with_highlighter(&syntect);
        }
        cardmark_core::render(text, &options)
    }

    /// Highlights one snippet with this renderer's engine. Languages syntect
    /// has no grammar for go straight to the built-in lexer.
    pub fn highlight(&self, code: &str, language: &str) -> String {
        match self.backend {
            HighlightBackend::Syntect if SyntectHighlighter::supports(language) => {
                highlight_with(Some(&SyntectHighlighter::new(self.theme)), code, language)
            }
            _ => highlight_with(None, code, language),
        }
    }

    pub fn embed_html(&self, html: &str, with_inline_css: bool) -> String {
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n");
        out.push_str("<html lang=\"en\">\n");
        out.push_str("<head>\n");
        out.push_str("  <meta charset=\"utf-8\" />\n");
        out.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n");
        if with_inline_css {
            out.push_str("  <style>\n");
            out.push_str(&self.css());
            out.push_str("\n  </style>\n");
        }
        out.push_str("</head>\n");
        out.push_str("<body class=\"cardmark\">\n");
        out.push_str(html);
        if !html.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("</body>\n");
        out.push_str("</html>\n");
        out
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(Theme::default())
    }
}

fn default_theme_vars() -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let light = BTreeMap::from([
        ("--cardmark-accent".to_string(), "#0969da".to_string()),
        ("--cardmark-border".to_string(), "#d0d7de".to_string()),
        ("--cardmark-code-bg".to_string(), "#f6f8fa".to_string()),
        ("--cardmark-code-fg".to_string(), "#24292f".to_string()),
        ("--cardmark-header-bg".to_string(), "#eaeef2".to_string()),
        ("--cardmark-hl-comment".to_string(), "#6e7781".to_string()),
        ("--cardmark-hl-keyword".to_string(), "#cf222e".to_string()),
        ("--cardmark-hl-number".to_string(), "#0550ae".to_string()),
        ("--cardmark-hl-string".to_string(), "#0a3069".to_string()),
        ("--cardmark-hl-type".to_string(), "#8250df".to_string()),
        ("--cardmark-inline-code-bg".to_string(), "rgba(175, 184, 193, 0.2)".to_string()),
        ("--cardmark-inline-code-fg".to_string(), "#cf222e".to_string()),
        ("--cardmark-muted".to_string(), "#6e7781".to_string()),
        ("--cardmark-quote-bg".to_string(), "rgba(9, 105, 218, 0.08)".to_string()),
        ("--cardmark-quote-fg".to_string(), "#57606a".to_string()),
        ("--cardmark-stripe-bg".to_string(), "rgba(0, 0, 0, 0.03)".to_string()),
    ]);

    let dark = BTreeMap::from([
        ("--cardmark-accent".to_string(), "#569cd6".to_string()),
        ("--cardmark-border".to_string(), "#444".to_string()),
        ("--cardmark-code-bg".to_string(), "#1e1e1e".to_string()),
        ("--cardmark-code-fg".to_string(), "#d4d4d4".to_string()),
        ("--cardmark-header-bg".to_string(), "#2d2d2d".to_string()),
        ("--cardmark-hl-comment".to_string(), "#6a9955".to_string()),
        ("--cardmark-hl-keyword".to_string(), "#569cd6".to_string()),
        ("--cardmark-hl-number".to_string(), "#b5cea8".to_string()),
        ("--cardmark-hl-string".to_string(), "#ce9178".to_string()),
        ("--cardmark-hl-type".to_string(), "#4ec9b0".to_string()),
        ("--cardmark-inline-code-bg".to_string(), "rgba(110, 118, 129, 0.4)".to_string()),
        ("--cardmark-inline-code-fg".to_string(), "#e06c75".to_string()),
        ("--cardmark-muted".to_string(), "#808080".to_string()),
        ("--cardmark-quote-bg".to_string(), "rgba(86, 156, 214, 0.1)".to_string()),
        ("--cardmark-quote-fg".to_string(), "#9cdcfe".to_string()),
        ("--cardmark-stripe-bg".to_string(), "rgba(255, 255, 255, 0.05)".to_string()),
    ]);

    (light, dark)
}

fn format_vars(vars: &BTreeMap<String, String>, indent: &str) -> String {
    let mut out = String::new();
    for (key, value) in vars {
        out.push_str(indent);
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push_str(";\n");
    }
    out
}

fn root_block(vars: &BTreeMap<String, String>, include_color_scheme: bool) -> String {
    let mut out = String::new();
    out.push_str(":root {\n");
    if include_color_scheme {
        out.push_str("  color-scheme: light dark;\n");
    }
    out.push_str(&format_vars(vars, "  "));
    out.push_str("}\n");
    out
}

fn indent_root_block(vars: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    out.push_str("  :root {\n");
    out.push_str("    color-scheme: light dark;\n");
    out.push_str(&format_vars(vars, "    "));
    out.push_str("  }\n");
    out
}
