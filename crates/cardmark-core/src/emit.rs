use crate::ast::{Block, List, ListKind};
use crate::error::RenderError;
use crate::inline::parse_inline;
use crate::placeholder::PlaceholderTable;
use crate::table::render_table;
use once_cell::sync::Lazy;
use regex::Regex;

const BLOCK_TAGS: &str = "pre|ul|ol|li|h[1-6]|hr|blockquote|table|thead|tbody|tr|th|td|div";

static OPENS_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)^</?(?:{})\b", BLOCK_TAGS)).expect("valid regex"));
static CLOSES_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)(?:</(?:{})>|<hr[^>]*>)$", BLOCK_TAGS)).expect("valid regex")
});

/// One output line (or multi-line block) and how it meets its neighbours.
struct Emitted {
    html: String,
    opens_block: bool,
    closes_block: bool,
}

impl Emitted {
    fn block(html: String) -> Self {
        Self {
            html,
            opens_block: true,
            closes_block: true,
        }
    }
}

/// Renders parsed blocks and joins them.
///
/// Line breaks become `<br>` except next to block-level HTML, where a bare
/// newline is enough.
pub fn emit_blocks(blocks: &[Block], table: &mut PlaceholderTable) -> Result<String, RenderError> {
    let mut entries = Vec::with_capacity(blocks.len());
    for block in blocks {
        emit_block(block, table, &mut entries)?;
    }

    let mut out = String::new();
    let mut previous: Option<&Emitted> = None;
    for entry in &entries {
        if let Some(prev) = previous {
            if prev.closes_block || entry.opens_block {
                out.push('\n');
            } else {
                out.push_str("<br>\n");
            }
        }
        out.push_str(&entry.html);
        previous = Some(entry);
    }
    Ok(out)
}

fn emit_block(
    block: &Block,
    table: &mut PlaceholderTable,
    entries: &mut Vec<Emitted>,
) -> Result<(), RenderError> {
    match block {
        Block::Header { level, content } => {
            let content = parse_inline(content, table)?;
            entries.push(Emitted::block(format!(
                "<h{level}>{content}</h{level}>"
            )));
        }
        Block::HorizontalRule => entries.push(Emitted::block("<hr>".to_string())),
        Block::BlockQuote { lines } => {
            let lines = lines
                .iter()
                .map(|line| parse_inline(line, table))
                .collect::<Result<Vec<_>, _>>()?;
            entries.push(Emitted::block(format!(
                "<blockquote>{}</blockquote>",
                lines.join("<br>")
            )));
        }
        Block::List(list) => entries.push(Emitted::block(emit_list(list, table)?)),
        Block::Table { rows } => match render_table(rows, |cell| parse_inline(cell, table))? {
            Some(html) => entries.push(Emitted::block(html)),
            None => {
                for row in rows {
                    entries.push(emit_plain(row, table)?);
                }
            }
        },
        Block::Placeholder { token } => {
            let is_block = table
                .fragment(token)
                .is_some_and(|fragment| fragment.kind.is_block());
            entries.push(Emitted {
                html: token.clone(),
                opens_block: is_block,
                closes_block: is_block,
            });
        }
        Block::Plain { text } => entries.push(emit_plain(text, table)?),
    }
    Ok(())
}

fn emit_list(list: &List, table: &mut PlaceholderTable) -> Result<String, RenderError> {
    let tag = match list.kind {
        ListKind::Ordered => "ol",
        ListKind::Unordered => "ul",
    };
    let mut html = format!("<{}", tag);
    if let Some(start) = list.start {
        html.push_str(&format!(" start=\"{}\"", start));
    }
    html.push_str(">\n");
    for item in &list.items {
        html.push_str("<li>");
        html.push_str(&parse_inline(item, table)?);
        html.push_str("</li>\n");
    }
    html.push_str(&format!("</{}>", tag));
    Ok(html)
}

// Block-ness of a plain line is read from its source text: raw block tags at
// either end, or a block fragment token there.
fn emit_plain(text: &str, table: &mut PlaceholderTable) -> Result<Emitted, RenderError> {
    let head = text.trim_start();
    let tail = text.trim_end();
    let opens_block = OPENS_BLOCK.is_match(head)
        || table.leading(head).is_some_and(|f| f.kind.is_block());
    let closes_block = CLOSES_BLOCK.is_match(tail)
        || table.trailing(tail).is_some_and(|f| f.kind.is_block());
    Ok(Emitted {
        html: parse_inline(text, table)?,
        opens_block,
        closes_block,
    })
}
