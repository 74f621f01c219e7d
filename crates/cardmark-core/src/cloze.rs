use html_escape::{decode_html_entities, encode_text};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Host-injected cloze markup: `<span class="cloze" ...>shown text</span>`.
pub(crate) static CLOZE_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<span\s+class="(cloze(?:-inactive)?)"[^>]*>(.*?)</span>"#)
        .expect("valid regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClozeEntry {
    pub placeholder: String,
    pub html: String,
}

/// Placeholders substituted into one diagram's source, with the SVG-safe
/// fragment each one is swapped back to once the diagram has been drawn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClozeMap {
    entries: Vec<ClozeEntry>,
}

impl ClozeMap {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ClozeEntry] {
        &self.entries
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Replaces each cloze span in diagram source with a plain placeholder of the
/// same visible length, so the diagram lays out as if the cloze text were
/// there.
pub fn mask_clozes(source: &str) -> (String, ClozeMap) {
    let stem = placeholder_stem(source);
    let mut map = ClozeMap::default();
    let masked = CLOZE_SPAN.replace_all(source, |caps: &regex::Captures<'_>| {
        let class = caps.get(1).map_or("cloze", |m| m.as_str());
        let inner = caps.get(2).map_or("", |m| m.as_str());
        let stripped = TAG.replace_all(inner, "");
        let visible = decode_html_entities(&stripped);
        let placeholder = cloze_placeholder(&stem, map.entries.len(), visible.chars().count());
        map.entries.push(ClozeEntry {
            placeholder: placeholder.clone(),
            html: format!(
                "<tspan class=\"{}\">{}</tspan>",
                class.to_lowercase(),
                encode_text(&visible)
            ),
        });
        placeholder
    });
    (masked.into_owned(), map)
}

// `CZ`, extended with `Q` until neither the raw nor the decoded source
// contains it. Literal diagram text can then never spell a placeholder.
fn placeholder_stem(source: &str) -> String {
    let decoded = decode_html_entities(source);
    let mut stem = String::from("CZ");
    while source.contains(stem.as_str()) || decoded.contains(stem.as_str()) {
        stem.push('Q');
    }
    stem
}

// `<stem><n>Z` padded with `x` up to the visible width. The index sits
// between the stem and `Z`, so no placeholder contains another.
fn cloze_placeholder(stem: &str, index: usize, width: usize) -> String {
    let mut placeholder = format!("{}{}Z", stem, index);
    while placeholder.len() < width {
        placeholder.push('x');
    }
    placeholder
}
