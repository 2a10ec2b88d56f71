use serde::{Deserialize, Serialize};

/// An LSP-conformant position: zero-based line, UTF-16 code-unit column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Position {
    /// Zero-based line number.
    pub line: u32,
    /// Zero-based UTF-16 code-unit column within the line.
    pub character: u32,
}

impl Position {
    /// Build a position from a line/character pair.
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[cfg(feature = "lsp-compat")]
impl From<Position> for lsp_types::Position {
    fn from(p: Position) -> Self {
        Self { line: p.line, character: p.character }
    }
}

#[cfg(feature = "lsp-compat")]
impl From<lsp_types::Position> for Position {
    fn from(p: lsp_types::Position) -> Self {
        Self { line: p.line, character: p.character }
    }
}
