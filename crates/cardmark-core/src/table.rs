use crate::error::RenderError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Align {
    None,
    Left,
    Center,
    Right,
}

impl Align {
    fn style(self) -> &'static str {
        match self {
            Align::None => "",
            Align::Left => " style=\"text-align: left\"",
            Align::Center => " style=\"text-align: center\"",
            Align::Right => " style=\"text-align: right\"",
        }
    }
}

/// Converts a run of pipe lines to a `<table>`.
///
/// Separator rows are dropped (their alignment applies to the columns), the
/// first remaining row is the header and the rest form the body. Returns
/// `None` when no row carries data, in which case the caller keeps the lines.
pub fn render_table<F>(rows: &[String], mut inline: F) -> Result<Option<String>, RenderError>
where
    F: FnMut(&str) -> Result<String, RenderError>,
{
    let mut aligns: Vec<Align> = Vec::new();
    let mut data: Vec<Vec<String>> = Vec::new();
    for row in rows {
        match parse_separator(row) {
            Some(found) => {
                if aligns.iter().all(|align| *align == Align::None) {
                    aligns = found;
                }
            }
            None => data.push(split_cells(row)),
        }
    }

    let Some((header, body)) = data.split_first() else {
        return Ok(None);
    };

    let mut html = String::from("<table><thead><tr>");
    push_cells(&mut html, header, "th", &aligns, &mut inline)?;
    html.push_str("</tr></thead>");
    if !body.is_empty() {
        html.push_str("<tbody>");
        for cells in body {
            html.push_str("<tr>");
            push_cells(&mut html, cells, "td", &aligns, &mut inline)?;
            html.push_str("</tr>");
        }
        html.push_str("</tbody>");
    }
    html.push_str("</table>");
    Ok(Some(html))
}

fn push_cells<F>(
    html: &mut String,
    cells: &[String],
    tag: &str,
    aligns: &[Align],
    inline: &mut F,
) -> Result<(), RenderError>
where
    F: FnMut(&str) -> Result<String, RenderError>,
{
    for (idx, cell) in cells.iter().enumerate() {
        let align = aligns.get(idx).copied().unwrap_or(Align::None);
        html.push('<');
        html.push_str(tag);
        html.push_str(align.style());
        html.push('>');
        html.push_str(&inline(cell)?);
        html.push_str("</");
        html.push_str(tag);
        html.push('>');
    }
    Ok(())
}

/// Splits a row into trimmed cells after removing one outer pipe on each
/// side. `\|` and pipes inside backtick code do not split.
pub fn split_cells(row: &str) -> Vec<String> {
    let row = row.trim();
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = match row.strip_suffix('|') {
        Some(inner) if !inner.ends_with('\\') => inner,
        _ => row,
    };

    let mut cells = Vec::new();
    let mut buf = String::new();
    let mut chars = row.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' if chars.peek().is_some_and(|(_, next)| *next == '|') => {
                buf.push('|');
                chars.next();
            }
            '`' => {
                let run = row[idx..].bytes().take_while(|b| *b == b'`').count();
                let after = idx + run;
                match closing_run(&row[after..], run) {
                    Some(len) => {
                        buf.push_str(&row[idx..after + len + run]);
                        while chars.peek().is_some_and(|(pos, _)| *pos < after + len + run) {
                            chars.next();
                        }
                    }
                    None => {
                        buf.push_str(&row[idx..after]);
                        while chars.peek().is_some_and(|(pos, _)| *pos < after) {
                            chars.next();
                        }
                    }
                }
            }
            '|' => cells.push(std::mem::take(&mut buf).trim().to_string()),
            _ => buf.push(ch),
        }
    }
    cells.push(buf.trim().to_string());
    cells
}

// Byte offset of a backtick run of exactly `run` length in `text`.
fn closing_run(text: &str, run: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let len = bytes[i..].iter().take_while(|b| **b == b'`').count();
            if len == run {
                return Some(i);
            }
            i += len;
        } else {
            i += 1;
        }
    }
    None
}

// A row whose cells hold nothing but `-`, `:` and whitespace. Blank rows
// count too and are dropped along with the real separator.
fn parse_separator(row: &str) -> Option<Vec<Align>> {
    let cells = split_cells(row);
    let mut aligns = Vec::with_capacity(cells.len());
    for cell in &cells {
        let cell = cell.trim();
        if !cell.chars().all(|ch| matches!(ch, '-' | ':') || ch.is_whitespace()) {
            return None;
        }
        let align = match (cell.starts_with(':'), cell.ends_with(':')) {
            (true, true) => Align::Center,
            (true, false) => Align::Left,
            (false, true) => Align::Right,
            (false, false) => Align::None,
        };
        aligns.push(align);
    }
    Some(aligns)
}

#[cfg(test)]
mod tests {
    use super::{Align, parse_separator, render_table, split_cells};
    use crate::error::RenderError;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn identity(cell: &str) -> Result<String, RenderError> {
        Ok(cell.to_string())
    }

    fn rows(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| line.to_string()).collect()
    }

    #[rstest]
    #[case("| a | b |", &["a", "b"])]
    #[case("|a|b", &["a", "b"])]
    #[case("| a | |", &["a", ""])]
    #[case(r"| a \| b | c |", &["a | b", "c"])]
    #[case("| `x | y` | z |", &["`x | y`", "z"])]
    #[case("| `open | z |", &["`open", "z"])]
    fn cells(#[case] row: &str, #[case] expected: &[&str]) {
        assert_eq!(split_cells(row), expected);
    }

    #[rstest]
    #[case("|---|---|", Some(vec![Align::None, Align::None]))]
    #[case("| :-- | :-: | --: |", Some(vec![Align::Left, Align::Center, Align::Right]))]
    #[case("| - - |", Some(vec![Align::None]))]
    #[case("| a | --- |", None)]
    #[case("| :: |", Some(vec![Align::Center]))]
    #[case("|  |  |", Some(vec![Align::None, Align::None]))]
    #[case("| : |", Some(vec![Align::Center]))]
    #[case("| -a- |", None)]
    fn separators(#[case] row: &str, #[case] expected: Option<Vec<Align>>) {
        assert_eq!(parse_separator(row), expected);
    }

    #[test]
    fn header_and_body_rows() {
        let html = render_table(&rows(&["| a | b |", "|---|---|", "| 1 | 2 |"]), identity)
            .unwrap()
            .unwrap();
        assert_eq!(
            html,
            "<table><thead><tr><th>a</th><th>b</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>"
        );
    }

    #[test]
    fn alignment_reaches_every_row() {
        let html = render_table(&rows(&["| a | b |", "|:--|--:|", "| 1 |"]), identity)
            .unwrap()
            .unwrap();
        assert_eq!(
            html,
            "<table><thead><tr><th style=\"text-align: left\">a</th><th style=\"text-align: right\">b</th></tr></thead><tbody><tr><td style=\"text-align: left\">1</td></tr></tbody></table>"
        );
    }

    #[test]
    fn header_only_table_has_no_body() {
        let html = render_table(&rows(&["| a |", "|---|"]), identity)
            .unwrap()
            .unwrap();
        assert_eq!(html, "<table><thead><tr><th>a</th></tr></thead></table>");
    }

    #[test]
    fn blank_and_colon_rows_are_dropped() {
        let html = render_table(
            &rows(&["| a | b |", "| --- | --: |", "|  |  |", "| :: | :: |", "| 1 | 2 |"]),
            identity,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            html,
            "<table><thead><tr><th>a</th><th style=\"text-align: right\">b</th></tr></thead><tbody><tr><td>1</td><td style=\"text-align: right\">2</td></tr></tbody></table>"
        );
    }

    #[test]
    fn separators_alone_are_not_a_table() {
        assert_eq!(render_table(&rows(&["|---|", "|---|"]), identity).unwrap(), None);
    }

    #[test]
    fn cells_go_through_the_inline_pass() {
        let html = render_table(&rows(&["| a |", "| b |"]), |cell| Ok(format!("<i>{}</i>", cell)))
            .unwrap()
            .unwrap();
        assert!(html.contains("<th><i>a</i></th>"));
        assert!(html.contains("<td><i>b</i></td>"));
    }
}
