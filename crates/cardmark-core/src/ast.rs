/// One logical block produced by the line scanner.
///
/// Content is kept raw; inline parsing happens when the block is emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    Header { level: u8, content: String },
    HorizontalRule,
    BlockQuote { lines: Vec<String> },
    List(List),
    Table { rows: Vec<String> },
    Placeholder { token: String },
    Plain { text: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct List {
    pub kind: ListKind,
    // First marker number of an ordered list.
    pub start: Option<u64>,
    pub items: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListKind {
    Ordered,
    Unordered,
}

/// How a protected fragment behaves when it stands alone on a line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FragmentKind {
    /// Block-level HTML (code containers, diagrams): no line break around it.
    Block,
    /// Inline HTML (images, cloze spans, inline code).
    Inline,
}

impl FragmentKind {
    pub fn is_block(self) -> bool {
        matches!(self, FragmentKind::Block)
    }
}
