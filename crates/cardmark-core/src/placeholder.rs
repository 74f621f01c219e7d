use crate::ast::FragmentKind;
use crate::error::RenderError;
use regex::{Captures, Regex};
use uuid::Uuid;

const TOKEN_PREFIX: &str = "CMPROT";
const TOKEN_SUFFIX: &str = "TORPMC";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub html: String,
    pub kind: FragmentKind,
}

/// Maps placeholder tokens to the HTML that replaces them at the end of a
/// render call.
///
/// Tokens look like `CMPROT<nonce><index>TORPMC`. The nonce is fresh for every
/// table and the index has a fixed minimum width, so no token is a substring of
/// another and literal input text cannot spell a live token.
#[derive(Debug)]
pub struct PlaceholderTable {
    marker: String,
    fragments: Vec<Fragment>,
}

impl PlaceholderTable {
    pub fn new() -> Self {
        let nonce = Uuid::new_v4().simple().to_string();
        Self {
            marker: format!("{}{}", TOKEN_PREFIX, nonce),
            fragments: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Registers `html` and returns the token standing in for it.
    pub fn insert(&mut self, html: impl Into<String>, kind: FragmentKind) -> String {
        let token = self.token_for(self.fragments.len());
        self.fragments.push(Fragment {
            html: html.into(),
            kind,
        });
        token
    }

    /// Looks up a token that must match exactly (no surrounding text).
    pub fn fragment(&self, token: &str) -> Option<&Fragment> {
        let (index, digits) = self.parse_token(token)?;
        if token.len() != self.marker.len() + digits + TOKEN_SUFFIX.len() {
            return None;
        }
        self.fragments.get(index)
    }

    /// Fragment of the token `text` starts with, if any.
    pub fn leading(&self, text: &str) -> Option<&Fragment> {
        let (index, _) = self.parse_token(text)?;
        self.fragments.get(index)
    }

    /// Fragment of the token `text` ends with, if any.
    pub fn trailing(&self, text: &str) -> Option<&Fragment> {
        let pos = text.rfind(&self.marker)?;
        self.fragment(&text[pos..])
    }

    /// Replaces every match of `pattern` with a fresh token whose fragment is
    /// produced by `build`.
    pub fn extract<F>(
        &mut self,
        text: &str,
        pattern: &Regex,
        kind: FragmentKind,
        mut build: F,
    ) -> Result<String, RenderError>
    where
        F: FnMut(&Captures<'_>, &mut Self) -> Result<String, RenderError>,
    {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            let html = build(&caps, self)?;
            let token = self.insert(html, kind);
            out.push_str(&token);
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    /// Substitutes every token in `text` with its fragment.
    ///
    /// Fragments may themselves carry tokens registered earlier (a cloze span
    /// inside a code block, inline code inside a header), so substitution
    /// repeats until nothing is left, bounded by the table size.
    pub fn restore(&self, text: &str) -> Result<String, RenderError> {
        let mut current = text.to_string();
        for _ in 0..=self.fragments.len() {
            let (next, replaced) = self.restore_once(&current);
            current = next;
            if !replaced {
                break;
            }
        }
        if let Some(pos) = current.find(&self.marker) {
            let tail = &current[pos..];
            let end = tail
                .find(TOKEN_SUFFIX)
                .map(|idx| idx + TOKEN_SUFFIX.len())
                .unwrap_or(tail.len());
            return Err(RenderError::UnresolvedPlaceholder {
                token: tail[..end].to_string(),
            });
        }
        Ok(current)
    }

    fn restore_once(&self, text: &str) -> (String, bool) {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        let mut replaced = false;
        while let Some(pos) = rest.find(&self.marker) {
            out.push_str(&rest[..pos]);
            let candidate = &rest[pos..];
            match self.parse_token(candidate) {
                Some((index, digits)) if index < self.fragments.len() => {
                    out.push_str(&self.fragments[index].html);
                    rest = &candidate[self.marker.len() + digits + TOKEN_SUFFIX.len()..];
                    replaced = true;
                }
                _ => {
                    out.push_str(&self.marker);
                    rest = &candidate[self.marker.len()..];
                }
            }
        }
        out.push_str(rest);
        (out, replaced)
    }

    // Returns (index, digit count) for text starting with a token.
    fn parse_token(&self, text: &str) -> Option<(usize, usize)> {
        let after = text.strip_prefix(self.marker.as_str())?;
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 || !after[digits..].starts_with(TOKEN_SUFFIX) {
            return None;
        }
        let index = after[..digits].parse().ok()?;
        Some((index, digits))
    }

    fn token_for(&self, index: usize) -> String {
        format!("{}{:06}{}", self.marker, index, TOKEN_SUFFIX)
    }
}

impl Default for PlaceholderTable {
    fn default() -> Self {
        Self::new()
    }
}
