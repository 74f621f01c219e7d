use crate::ast::FragmentKind;
use crate::error::RenderError;
use crate::placeholder::PlaceholderTable;
use html_escape::{encode_double_quoted_attribute, encode_text};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));
static RAW_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("valid regex"));
static IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("valid regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"));
static STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~([^~]+)~~").expect("valid regex"));
static BOLD_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex"));
static BOLD_UNDERSCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__([^_]+)__").expect("valid regex"));

/// Applies the inline rules to one run of text.
///
/// Order is fixed: code spans, raw tag shielding, images, links,
/// strikethrough, bold, italic. Everything a rule emits that a later rule
/// could match again (code, images, link openers, pre-existing tags) goes into
/// `table` and comes back only at restoration.
pub fn parse_inline(text: &str, table: &mut PlaceholderTable) -> Result<String, RenderError> {
    if text.is_empty() {
        return Ok(String::new());
    }

    let text = table.extract(text, &CODE_SPAN, FragmentKind::Inline, |caps, _| {
        Ok(format!(
            "<code class=\"inline\">{}</code>",
            encode_text(&caps[1])
        ))
    })?;
    let text = table.extract(&text, &RAW_TAG, FragmentKind::Inline, |caps, _| {
        Ok(caps[0].to_string())
    })?;
    let text = table.extract(&text, &IMAGE, FragmentKind::Inline, |caps, _| {
        Ok(format!(
            "<img src=\"{}\" alt=\"{}\">",
            encode_double_quoted_attribute(&caps[2]),
            encode_double_quoted_attribute(&caps[1])
        ))
    })?;
    let text = LINK
        .replace_all(&text, |caps: &Captures<'_>| {
            let open = format!("<a href=\"{}\">", encode_double_quoted_attribute(&caps[2]));
            format!("{}{}</a>", table.insert(open, FragmentKind::Inline), &caps[1])
        })
        .into_owned();

    let text = STRIKE.replace_all(&text, "<del>$1</del>");
    let text = BOLD_STAR.replace_all(&text, "<strong>$1</strong>");
    let text = BOLD_UNDERSCORE.replace_all(&text, "<strong>$1</strong>");
    let text = italic(&text, '*');
    Ok(italic(&text, '_'))
}

// `d…d` where neither delimiter touches another `d`, so the inner markers of
// a bold run are never taken for italics.
fn italic(text: &str, delim: char) -> String {
    let width = delim.len_utf8();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut search = 0;

    while let Some(rel) = text[search..].find(delim) {
        let open = search + rel;
        let inner = open + width;
        let close = text[inner..].find(delim).map(|rel| inner + rel);
        match close {
            Some(close)
                if close > inner
                    && !text[..open].ends_with(delim)
                    && !text[close + width..].starts_with(delim) =>
            {
                out.push_str(&text[last..open]);
                out.push_str("<em>");
                out.push_str(&text[inner..close]);
                out.push_str("</em>");
                last = close + width;
                search = last;
            }
            _ => search = inner,
        }
    }

    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::parse_inline;
    use crate::placeholder::PlaceholderTable;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn inline(text: &str) -> String {
        let mut table = PlaceholderTable::new();
        let parsed = parse_inline(text, &mut table).unwrap();
        table.restore(&parsed).unwrap()
    }

    #[rstest]
    #[case("**bold** and *italic*", "<strong>bold</strong> and <em>italic</em>")]
    #[case("__bold__ and _italic_", "<strong>bold</strong> and <em>italic</em>")]
    #[case("~~gone~~", "<del>gone</del>")]
    #[case("a * b * c", "a <em> b </em> c")]
    #[case("2 * 3", "2 * 3")]
    #[case("**", "**")]
    #[case("plain text", "plain text")]
    fn emphasis(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(inline(input), expected);
    }

    // Bold takes the inner pair first and the outer single stars become
    // italics, so the nesting is inverted compared to CommonMark.
    #[test]
    fn triple_asterisks_nest_emphasis_inside_out() {
        assert_eq!(inline("***both***"), "<em><strong>both</strong></em>");
    }

    // Known limitation: underscores inside identifiers still pair up.
    #[test]
    fn underscores_inside_words_pair_up() {
        assert_eq!(inline("snake_case_name"), "snake<em>case</em>name");
    }

    #[test]
    fn code_spans_are_escaped_and_opaque() {
        assert_eq!(
            inline("use `a **b** <c>` here"),
            "use <code class=\"inline\">a **b** &lt;c&gt;</code> here"
        );
    }

    #[test]
    fn images_come_before_links() {
        assert_eq!(
            inline("![a cat](cat_1.png) and [docs](https://x.dev/a_b_c)"),
            "<img src=\"cat_1.png\" alt=\"a cat\"> and <a href=\"https://x.dev/a_b_c\">docs</a>"
        );
    }

    #[test]
    fn link_text_is_still_formatted() {
        assert_eq!(
            inline("[**bold** link](u)"),
            "<a href=\"u\"><strong>bold</strong> link</a>"
        );
    }

    #[test]
    fn attributes_are_escaped() {
        assert_eq!(
            inline("[x](a\"onmouseover=\"b)"),
            "<a href=\"a&quot;onmouseover=&quot;b\">x</a>"
        );
    }

    #[test]
    fn raw_tags_keep_their_attributes() {
        assert_eq!(
            inline("<span class=\"my_class\" data-x=\"*\">*hi*</span>"),
            "<span class=\"my_class\" data-x=\"*\"><em>hi</em></span>"
        );
    }
}
