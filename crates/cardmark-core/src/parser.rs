use crate::ast::{Block, List, ListKind};
use crate::placeholder::PlaceholderTable;

// Characters an editor leaves in front of a header marker.
const INVISIBLE_PREFIX: &[char] = &[
    '\u{0}', '\u{1}', '\u{2}', '\u{3}', '\u{4}', '\u{5}', '\u{6}', '\u{7}', '\u{8}', '\u{b}',
    '\u{c}', '\u{e}', '\u{f}', '\u{10}', '\u{11}', '\u{12}', '\u{13}', '\u{14}', '\u{15}',
    '\u{16}', '\u{17}', '\u{18}', '\u{19}', '\u{1a}', '\u{1b}', '\u{1c}', '\u{1d}', '\u{1e}',
    '\u{1f}', '\u{200b}', '\u{200c}', '\u{200d}', '\u{feff}', '\u{a0}',
];

#[derive(Debug)]
enum Line<'a> {
    Placeholder(&'a str),
    Header(u8, &'a str),
    Rule,
    Quote(&'a str),
    Item(ListKind, Option<u64>, &'a str),
    TableRow(&'a str),
    Plain(&'a str),
}

// The single open group. Opening another kind flushes it first.
enum Group {
    Quote(Vec<String>),
    List(List),
    Table(Vec<String>),
}

/// Splits normalized text into blocks, one pass over its lines.
pub fn parse_blocks(text: &str, table: &PlaceholderTable) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut group: Option<Group> = None;

    for raw in text.split('\n') {
        let line = classify(raw, table);
        group = match (group.take(), line) {
            (Some(Group::Quote(mut lines)), Line::Quote(content)) => {
                lines.push(content.to_string());
                Some(Group::Quote(lines))
            }
            (Some(Group::List(mut list)), Line::Item(kind, _, content)) if list.kind == kind => {
                list.items.push(content.to_string());
                Some(Group::List(list))
            }
            (Some(Group::Table(mut rows)), Line::TableRow(row)) => {
                rows.push(row.to_string());
                Some(Group::Table(rows))
            }
            (open, line) => {
                if let Some(open) = open {
                    flush(open, &mut blocks);
                }
                start(line, &mut blocks)
            }
        };
    }

    if let Some(open) = group {
        flush(open, &mut blocks);
    }
    blocks
}

fn start(line: Line<'_>, blocks: &mut Vec<Block>) -> Option<Group> {
    match line {
        Line::Quote(content) => Some(Group::Quote(vec![content.to_string()])),
        Line::Item(kind, number, content) => Some(Group::List(List {
            kind,
            start: number.filter(|n| *n != 1),
            items: vec![content.to_string()],
        })),
        Line::TableRow(row) => Some(Group::Table(vec![row.to_string()])),
        Line::Placeholder(token) => {
            blocks.push(Block::Placeholder {
                token: token.to_string(),
            });
            None
        }
        Line::Header(level, content) => {
            blocks.push(Block::Header {
                level,
                content: content.to_string(),
            });
            None
        }
        Line::Rule => {
            blocks.push(Block::HorizontalRule);
            None
        }
        Line::Plain(text) => {
            blocks.push(Block::Plain {
                text: text.to_string(),
            });
            None
        }
    }
}

fn flush(group: Group, blocks: &mut Vec<Block>) {
    match group {
        Group::Quote(lines) => blocks.push(Block::BlockQuote { lines }),
        Group::List(list) => blocks.push(Block::List(list)),
        // A lone pipe line is not a table.
        Group::Table(rows) if rows.len() < 2 => {
            blocks.extend(rows.into_iter().map(|text| Block::Plain { text }));
        }
        Group::Table(rows) => blocks.push(Block::Table { rows }),
    }
}

fn classify<'a>(line: &'a str, table: &PlaceholderTable) -> Line<'a> {
    let trimmed = line.trim();
    if !trimmed.is_empty() && table.fragment(trimmed).is_some() {
        return Line::Placeholder(trimmed);
    }
    if let Some((level, content)) = header(line) {
        return Line::Header(level, content);
    }
    if is_rule(line) {
        return Line::Rule;
    }
    if let Some(rest) = line.strip_prefix('>') {
        return Line::Quote(rest.strip_prefix(' ').unwrap_or(rest));
    }
    if let Some(content) = unordered_item(line) {
        return Line::Item(ListKind::Unordered, None, content);
    }
    if let Some((number, content)) = ordered_item(line) {
        return Line::Item(ListKind::Ordered, Some(number), content);
    }
    if trimmed.starts_with('|') {
        return Line::TableRow(line);
    }
    Line::Plain(line)
}

fn header(line: &str) -> Option<(u8, &str)> {
    let line = line
        .trim_start_matches(INVISIBLE_PREFIX)
        .trim_start_matches([' ', '\t']);
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let content = rest.trim();
    (!content.is_empty()).then_some((hashes as u8, content))
}

fn is_rule(line: &str) -> bool {
    let line = line.trim_end();
    let Some(first) = line.chars().next() else {
        return false;
    };
    matches!(first, '-' | '*' | '_') && line.len() >= 3 && line.chars().all(|ch| ch == first)
}

fn unordered_item(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(['-', '*', '+'])?;
    item_content(rest)
}

// Numbers past `u64::MAX` saturate rather than losing the start.
fn ordered_item(line: &str) -> Option<(u64, &str)> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix('.')?;
    let content = item_content(rest)?;
    let number = line[..digits].parse().unwrap_or(u64::MAX);
    Some((number, content))
}

// Marker must be followed by whitespace and then something to show.
fn item_content(rest: &str) -> Option<&str> {
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let content = rest.trim_start();
    (!content.is_empty()).then_some(content)
}
