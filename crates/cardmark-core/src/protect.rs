use crate::ast::FragmentKind;
use crate::cloze::{CLOZE_SPAN, ClozeMap, mask_clozes};
use crate::error::RenderError;
use crate::highlight::highlight_with;
use crate::placeholder::PlaceholderTable;
use crate::render::RenderOptions;
use html_escape::{decode_html_entities, encode_double_quoted_attribute, encode_text};
use once_cell::sync::Lazy;
use regex::Regex;

/// Fence tag of blocks drawn by the external diagram runtime.
pub const DIAGRAM_LANGUAGE: &str = "mermaid";

const FENCE: &str = "```";

// Inline code spans match first so a style tag quoted in code stays text.
static STYLE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(?P<code>`[^`\n]+`)|<style[^>]*>.*?</style>").expect("valid regex")
});
static IMAGE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img[^>]+>").expect("valid regex"));
// Markup a rich-text editor wraps around code lines. Anything else that looks
// like a tag (`Vec<u8>`) is left for escaping.
static EDITOR_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)</?(?:br|div|p|span|font|b|i|u|s|strong|em|strike|del|code|pre|a|sub|sup|li|ul|ol|blockquote|h[1-6]|table|thead|tbody|tr|td|th)\b[^>]*>",
    )
    .expect("valid regex")
});

/// Text with every untouchable region swapped for a placeholder token.
#[derive(Debug)]
pub struct Protected {
    pub text: String,
    /// Host `<style>` blocks, re-emitted verbatim ahead of the body.
    pub styles: Vec<String>,
    /// Set when at least one diagram container was emitted.
    pub has_diagram: bool,
}

/// Pulls style blocks, fenced code, pasted images and (in cloze mode) cloze
/// spans out of `text`, registering the final HTML of each in `table`.
pub fn protect(
    text: &str,
    options: &RenderOptions<'_>,
    table: &mut PlaceholderTable,
) -> Result<Protected, RenderError> {
    let (text, has_diagram) = protect_fences(text, options, table)?;
    let mut styles = Vec::new();
    let text = STYLE_BLOCK.replace_all(&text, |caps: &regex::Captures<'_>| {
        if caps.name("code").is_some() {
            return caps[0].to_string();
        }
        styles.push(caps[0].to_string());
        String::new()
    });

    let text = table.extract(&text, &IMAGE_TAG, FragmentKind::Inline, |caps, _| {
        Ok(caps[0].to_string())
    })?;
    let text = if options.cloze_mode {
        table.extract(&text, &CLOZE_SPAN, FragmentKind::Inline, |caps, _| {
            Ok(caps[0].to_string())
        })?
    } else {
        text
    };

    Ok(Protected {
        text,
        styles,
        has_diagram,
    })
}

// The first closing fence ends a block. An opening fence without a closing
// one takes the rest of the document.
fn protect_fences(
    text: &str,
    options: &RenderOptions<'_>,
    table: &mut PlaceholderTable,
) -> Result<(String, bool), RenderError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut has_diagram = false;

    while let Some(open) = rest.find(FENCE) {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + FENCE.len()..];
        let tag_len = after_open
            .char_indices()
            .find(|(_, ch)| !is_tag_char(*ch))
            .map_or(after_open.len(), |(idx, _)| idx);
        let language = after_open[..tag_len].to_lowercase();
        let tail = &after_open[tag_len..];
        let (body, next) = match tail.find(FENCE) {
            Some(close) => (&tail[..close], &tail[close + FENCE.len()..]),
            None => (tail, ""),
        };

        let (html, is_diagram) = fence_html(&language, body, options, table)?;
        has_diagram |= is_diagram;
        let token = table.insert(html, FragmentKind::Block);
        out.push_str(&token);
        rest = next;
    }

    out.push_str(rest);
    Ok((out, has_diagram))
}

fn fence_html(
    language: &str,
    body: &str,
    options: &RenderOptions<'_>,
    table: &mut PlaceholderTable,
) -> Result<(String, bool), RenderError> {
    if language == DIAGRAM_LANGUAGE {
        if options.diagram_runtime.is_some() {
            return diagram_html(body, options.cloze_mode).map(|html| (html, true));
        }
        log::debug!("no diagram runtime available, rendering diagram source as code");
    }

    let body = if options.cloze_mode {
        shield_clozes(body, table)
    } else {
        body.to_string()
    };
    let code = clean_code(&body);

    let mut html = String::from("<pre><code");
    if !language.is_empty() {
        html.push_str(" class=\"language-");
        html.push_str(&encode_double_quoted_attribute(language));
        html.push('"');
    }
    html.push('>');
    if language == DIAGRAM_LANGUAGE {
        html.push_str(&encode_text(&code));
    } else {
        html.push_str(&highlight_with(options.highlighter, &code, language));
    }
    html.push_str("</code></pre>");
    Ok((html, false))
}

fn diagram_html(body: &str, cloze_mode: bool) -> Result<String, RenderError> {
    let (body, clozes) = if cloze_mode {
        mask_clozes(body)
    } else {
        (body.to_string(), ClozeMap::default())
    };
    let code = clean_code(&body);

    let mut html = String::from("<div class=\"mermaid\"");
    if !clozes.is_empty() {
        html.push_str(" data-cloze-map=\"");
        html.push_str(&encode_double_quoted_attribute(&clozes.to_json()?));
        html.push('"');
    }
    html.push('>');
    html.push_str(&encode_text(&code));
    html.push_str("</div>");
    Ok(html)
}

// Cloze spans inside ordinary code survive as placeholder tokens. Tokens are
// plain identifiers, so every lexer passes them through untouched.
fn shield_clozes(body: &str, table: &mut PlaceholderTable) -> String {
    CLOZE_SPAN
        .replace_all(body, |caps: &regex::Captures<'_>| {
            table.insert(caps[0].to_string(), FragmentKind::Inline)
        })
        .into_owned()
}

/// Editor tags become line breaks, entities decode, blank lines go.
fn clean_code(body: &str) -> String {
    let text = EDITOR_TAG.replace_all(body, "\n");
    let text = text.replace("&nbsp;", " ");
    let text = decode_html_entities(&text);
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_tag_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '+' | '#' | '-')
}

#[cfg(test)]
mod tests {
    use super::{clean_code, protect};
    use crate::ast::FragmentKind;
    use crate::placeholder::PlaceholderTable;
    use crate::render::RenderOptions;
    use pretty_assertions::assert_eq;

    const RUNTIME: &str = "window.mermaid = {};";

    fn with_runtime() -> RenderOptions<'static> {
        RenderOptions {
            diagram_runtime: Some(RUNTIME),
            ..Default::default()
        }
    }

    #[test]
    fn fenced_code_becomes_one_block_token() {
        let mut table = PlaceholderTable::new();
        let protected = protect(
            "before\n```python\nprint(1)\n```\nafter",
            &RenderOptions::default(),
            &mut table,
        )
        .unwrap();
        let lines: Vec<&str> = protected.text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "before");
        assert_eq!(lines[2], "after");
        let fragment = table.fragment(lines[1]).expect("token line");
        assert_eq!(fragment.kind, FragmentKind::Block);
        assert_eq!(
            fragment.html,
            "<pre><code class=\"language-python\"><span class=\"hl-k\">print</span>(<span class=\"hl-n\">1</span>)</code></pre>"
        );
        assert!(!protected.has_diagram);
    }

    #[test]
    fn first_closing_fence_wins() {
        let mut table = PlaceholderTable::new();
        let protected = protect("```\na\n```\nmid\n```\nb\n```", &RenderOptions::default(), &mut table)
            .unwrap();
        assert_eq!(table.len(), 2);
        assert!(protected.text.contains("\nmid\n"));
    }

    #[test]
    fn unterminated_fence_takes_the_rest() {
        let mut table = PlaceholderTable::new();
        let protected =
            protect("text\n```js\nlet a = 1;\n**x**", &RenderOptions::default(), &mut table).unwrap();
        assert_eq!(table.len(), 1);
        assert!(protected.text.starts_with("text\n"));
        let token = protected.text.trim_start_matches("text\n");
        let html = &table.fragment(token).expect("token").html;
        assert!(html.contains("**x**"));
    }

    #[test]
    fn editor_markup_in_code_is_flattened() {
        assert_eq!(
            clean_code("<div>if a &lt; b:</div><div>&nbsp;&nbsp;pass</div><br>"),
            "if a < b:\n  pass"
        );
        assert_eq!(clean_code("\nlet v: Vec<u8> = x;\n"), "let v: Vec<u8> = x;");
    }

    #[test]
    fn diagrams_need_a_runtime() {
        let source = "```mermaid\ngraph TD; A-->B\n```";

        let mut table = PlaceholderTable::new();
        let protected = protect(source, &with_runtime(), &mut table).unwrap();
        assert!(protected.has_diagram);
        let html = &table.fragment(&protected.text).expect("token").html;
        assert_eq!(html, "<div class=\"mermaid\">graph TD; A--&gt;B</div>");

        let mut table = PlaceholderTable::new();
        let protected = protect(source, &RenderOptions::default(), &mut table).unwrap();
        assert!(!protected.has_diagram);
        let html = &table.fragment(&protected.text).expect("token").html;
        assert_eq!(
            html,
            "<pre><code class=\"language-mermaid\">graph TD; A--&gt;B</code></pre>"
        );
    }

    #[test]
    fn cloze_in_diagram_is_masked() {
        let options = RenderOptions {
            cloze_mode: true,
            ..with_runtime()
        };
        let mut table = PlaceholderTable::new();
        let source = "```mermaid\nA --> <span class=\"cloze\" data-ordinal=\"1\">[...]</span>\n```";
        let protected = protect(source, &options, &mut table).unwrap();
        let html = &table.fragment(&protected.text).expect("token").html;
        assert!(html.starts_with("<div class=\"mermaid\" data-cloze-map=\"[{&quot;placeholder&quot;:&quot;CZ0Zx&quot;"));
        assert!(html.ends_with(">A --&gt; CZ0Zx</div>"));
    }

    #[test]
    fn cloze_in_code_survives_highlighting() {
        let options = RenderOptions {
            cloze_mode: true,
            ..Default::default()
        };
        let mut table = PlaceholderTable::new();
        let span = "<span class=\"cloze\" data-ordinal=\"1\">[...]</span>";
        let source = format!("```python\nx = {}\n```", span);
        let protected = protect(&source, &options, &mut table).unwrap();
        let restored = table.restore(&protected.text).unwrap();
        assert_eq!(
            restored,
            format!("<pre><code class=\"language-python\">x = {}</code></pre>", span)
        );
    }

    #[test]
    fn images_styles_and_clozes_are_lifted() {
        let options = RenderOptions {
            cloze_mode: true,
            ..Default::default()
        };
        let mut table = PlaceholderTable::new();
        let source = "<style>.a{}</style>see <img src=\"a_b_c.png\"> and <span class=\"cloze\">x_y_z</span>";
        let protected = protect(source, &options, &mut table).unwrap();
        assert_eq!(protected.styles, vec!["<style>.a{}</style>".to_string()]);
        assert!(!protected.text.contains('<'));
        assert!(!protected.text.contains('_'));
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.restore(&protected.text).unwrap(),
            "see <img src=\"a_b_c.png\"> and <span class=\"cloze\">x_y_z</span>"
        );
    }

    #[test]
    fn style_tags_inside_code_stay_code() {
        let mut table = PlaceholderTable::new();
        let source = "```html\n<style>body{color:red}</style>\n```\nsee `<style>a{}</style>` here";
        let protected = protect(source, &RenderOptions::default(), &mut table).unwrap();
        assert!(protected.styles.is_empty());
        assert!(protected.text.ends_with("\nsee `<style>a{}</style>` here"));
        let token = protected.text.lines().next().expect("token line");
        assert_eq!(
            table.fragment(token).expect("token").html,
            "<pre><code class=\"language-html\">&lt;style&gt;body{color:red}&lt;/style&gt;</code></pre>"
        );
    }

    #[test]
    fn clozes_pass_through_without_cloze_mode() {
        let mut table = PlaceholderTable::new();
        let source = "a <span class=\"cloze\">b</span>";
        let protected = protect(source, &RenderOptions::default(), &mut table).unwrap();
        assert_eq!(protected.text, source);
    }
}
