use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;

static BREAK_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static CONTAINER_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:</?(?:div|p)(?:\s[^>]*)?>)+").expect("valid regex"));
static RULE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n?(<hr(?:\s[^>]*)?/?>)\n?").expect("valid regex"));
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Flattens editor markup into plain lines.
///
/// Line breaks and `div`/`p` wrappers become newlines, `&nbsp;` becomes a
/// space, the remaining entities are decoded, literal `<hr>` tags are put on
/// their own line, and runs of blank lines collapse to one.
/// Each run of adjacent wrapper tags counts as a single line boundary.
pub fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = BREAK_TAG.replace_all(&text, "\n");
    let text = text.replace("&nbsp;", " ");
    let text = decode_html_entities(&text);
    let text = CONTAINER_TAG.replace_all(&text, "\n");
    let text = RULE_TAG.replace_all(&text, "\n$1\n");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::normalize;
    use pretty_assertions::assert_eq;

    #[test]
    fn breaks_become_newlines() {
        assert_eq!(normalize("a<br>b<BR/>c<br />d"), "a\nb\nc\nd");
    }

    #[test]
    fn nbsp_and_entities() {
        assert_eq!(normalize("a&nbsp;b &lt;i&gt; &amp; &quot;q&quot;"), "a b <i> & \"q\"");
    }

    #[test]
    fn containers_flatten() {
        assert_eq!(
            normalize("<div># Title</div><div>body</div>"),
            "# Title\nbody"
        );
        assert_eq!(normalize("<div>a</div><div><br></div><div>b</div>"), "a\n\nb");
        assert_eq!(normalize("<p class=\"x\">one</p>two"), "one\ntwo");
    }

    #[test]
    fn pre_is_not_a_paragraph_tag() {
        assert_eq!(normalize("<pre>x</pre>"), "<pre>x</pre>");
    }

    #[test]
    fn rules_get_their_own_line() {
        assert_eq!(normalize("above<hr>below"), "above\n<hr>\nbelow");
        assert_eq!(normalize("above<hr id=answer>below"), "above\n<hr id=answer>\nbelow");
    }

    #[test]
    fn blank_runs_collapse_and_ends_trim() {
        assert_eq!(normalize("\n\n a\n\n\n\n\nb \n\n"), "a\n\nb");
    }

    #[test]
    fn carriage_returns() {
        assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn idempotent_on_normalized_text() {
        let inputs = [
            "<div>## Head</div><div>a<br>b</div><hr><div>- item</div>",
            "plain text",
            "x&nbsp;&nbsp;y<br><br><br><br>z",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {:?}", input);
        }
    }
}
