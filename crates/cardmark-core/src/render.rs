use crate::emit::emit_blocks;
use crate::error::RenderError;
use crate::highlight::CodeHighlighter;
use crate::normalize::normalize;
use crate::parser::parse_blocks;
use crate::placeholder::PlaceholderTable;
use crate::protect::protect;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

const DIAGRAM_INIT: &str = include_str!("../assets/diagram-init.js");

/// Per-call settings for [`render`].
#[derive(Clone, Copy, Default)]
pub struct RenderOptions<'a> {
    /// Treat host cloze spans as opaque and mask them inside diagrams.
    pub cloze_mode: bool,
    /// Theme CSS placed verbatim ahead of the output.
    pub stylesheet: Option<&'a str>,
    /// Diagram runtime source. Without it diagram fences render as code.
    pub diagram_runtime: Option<&'a str>,
    /// Preferred highlighting engine; the built-in lexer covers its misses.
    pub highlighter: Option<&'a dyn CodeHighlighter>,
}

impl<'a> RenderOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cloze_mode(mut self, cloze_mode: bool) -> Self {
        self.cloze_mode = cloze_mode;
        self
    }

    pub fn with_stylesheet(mut self, stylesheet: &'a str) -> Self {
        self.stylesheet = Some(stylesheet);
        self
    }

    pub fn with_diagram_runtime(mut self, runtime: Option<&'a str>) -> Self {
        self.diagram_runtime = runtime;
        self
    }

    pub fn with_highlighter(mut self, highlighter: &'a dyn CodeHighlighter) -> Self {
        self.highlighter = Some(highlighter);
        self
    }
}

/// Renders a note to HTML.
///
/// Never fails. Whitespace-only input comes back as is, and when the pipeline
/// errors or panics the failure is logged and the input is returned
/// unchanged.
pub fn render(markdown: &str, options: &RenderOptions<'_>) -> String {
    if markdown.trim().is_empty() {
        return markdown.to_string();
    }

    recover(markdown, || try_render(markdown, options))
}

// Runs `pipeline`, handing back `markdown` when it errors or panics.
fn recover<F>(markdown: &str, pipeline: F) -> String
where
    F: FnOnce() -> Result<String, RenderError>,
{
    let err = match panic::catch_unwind(AssertUnwindSafe(pipeline)) {
        Ok(Ok(html)) => return html,
        Ok(Err(err)) => err,
        Err(payload) => RenderError::Panicked(panic_message(payload.as_ref())),
    };
    log::warn!("render failed, returning input unchanged: {}", err);
    markdown.to_string()
}

/// The pipeline behind [`render`], with failures surfaced.
pub fn try_render(markdown: &str, options: &RenderOptions<'_>) -> Result<String, RenderError> {
    let mut table = PlaceholderTable::new();
    let protected = protect(markdown, options, &mut table)?;
    let normalized = normalize(&protected.text);
    let blocks = parse_blocks(&normalized, &table);
    let body = emit_blocks(&blocks, &mut table)?;
    let body = table.restore(body.trim())?;

    let mut html = String::with_capacity(body.len() + 256);
    if let Some(stylesheet) = options.stylesheet {
        html.push_str(stylesheet);
    }
    for style in &protected.styles {
        html.push_str(style);
    }
    html.push_str(&body);
    if protected.has_diagram {
        if let Some(runtime) = options.diagram_runtime {
            html.push_str("\n<script>");
            html.push_str(runtime);
            html.push_str("</script>\n<script>\n");
            html.push_str(DIAGRAM_INIT);
            html.push_str("</script>\n");
        }
    }

    if html.trim().is_empty() {
        return Err(RenderError::EmptyOutput);
    }
    Ok(html)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
