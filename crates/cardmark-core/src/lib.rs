mod ast;
mod cloze;
mod emit;
mod error;
mod highlight;
mod inline;
mod normalize;
mod parser;
mod placeholder;
mod protect;
mod render;
mod table;

pub use ast::{Block, FragmentKind, List, ListKind};
pub use cloze::{ClozeEntry, ClozeMap, mask_clozes};
pub use error::{HighlightError, RenderError};
pub use highlight::{
    BuiltinHighlighter, CodeHighlighter, LanguageProfile, highlight, highlight_with,
    language_profile, normalize_language,
};
pub use normalize::normalize;
pub use parser::parse_blocks;
pub use placeholder::{Fragment, PlaceholderTable};
pub use protect::{DIAGRAM_LANGUAGE, Protected, protect};
pub use render::{RenderOptions, render, try_render};
pub use table::{Align, render_table, split_cells};
