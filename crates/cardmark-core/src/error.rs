use thiserror::Error;

/// Failures inside the rendering pipeline.
///
/// None of these reach callers of [`crate::render`]; they are logged there and
/// the original input is returned instead.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("placeholder {token} survived restoration")]
    UnresolvedPlaceholder { token: String },
    #[error("pipeline produced empty output for non-empty input")]
    EmptyOutput,
    #[error("failed to encode cloze map: {0}")]
    ClozeMap(#[from] serde_json::Error),
    #[error("pipeline panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("no syntax registered for language `{0}`")]
    UnknownLanguage(String),
    #[error("highlighting engine failed: {0}")]
    Engine(String),
}
