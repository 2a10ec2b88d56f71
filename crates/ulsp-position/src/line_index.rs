use thiserror::Error;

use crate::Position;

/// Errors raised while converting between byte offsets and LSP positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LineIndexError {
    /// A position query named a line past the end of the document.
    #[error("line {line} is out of range")]
    LineOutOfRange {
        /// The requested, out-of-range line number.
        line: u32,
    },
}

/// Byte-offset index over a text buffer, answering `(line, UTF-16 column)
/// ⇄ byte offset` queries.
///
/// Line boundaries are `\n`-delimited (§4.G): the byte immediately after a
/// `\n` starts the next line. A `\r\n` ending is a single boundary — the
/// line's visible content stops before the `\r`, so there is no addressable
/// position *inside* a CRLF pair; requests that would land there clamp to
/// the end of the line's content.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line, including a trailing entry
    /// for the (possibly empty) line after a final `\n`.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build an index over `text`.
    pub fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut line_starts = vec![0usize];
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Number of lines, counting a trailing empty line after a final `\n`.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range `[start, end)` of the visible content of `line`, excluding
    /// any trailing `\r\n` or `\n`. Returns `None` if `line` is out of range.
    fn line_content_range(&self, text: &str, line: usize) -> Option<(usize, usize)> {
        let start = *self.line_starts.get(line)?;
        let raw_end = self.line_starts.get(line + 1).copied().unwrap_or(text.len());
        let bytes = text.as_bytes();
        let mut end = raw_end;
        if end > start && bytes[end - 1] == b'\n' {
            end -= 1;
            if end > start && bytes[end - 1] == b'\r' {
                end -= 1;
            }
        }
        Some((start, end))
    }

    /// Convert a byte offset into an LSP `(line, UTF-16 column)` position.
    ///
    /// The offset is clamped into `[0, text.len()]`; an offset that lands on
    /// a line's `\r` (or in a multi-byte rune that isn't on a char
    /// boundary) resolves to that line's last pre-`\r` column.
    pub fn offset_to_position(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insertion) => insertion.saturating_sub(1),
        };
        let Some((start, end)) = self.line_content_range(text, line) else {
            return Position::new(line as u32, 0);
        };
        let clamped = offset.min(end).max(start);
        let character = text[start..clamped].encode_utf16().count() as u32;
        Position::new(line as u32, character)
    }

    /// Convert an LSP `(line, UTF-16 column)` position into a byte offset.
    ///
    /// A column past the end of the line's content clamps to the end of
    /// the content (never into the `\r\n`/`\n` terminator). A column that
    /// would land mid-surrogate-pair stops at that rune's starting byte.
    pub fn position_to_offset(
        &self,
        text: &str,
        position: Position,
    ) -> Result<usize, LineIndexError> {
        let line = position.line as usize;
        let Some((start, end)) = self.line_content_range(text, line) else {
            return Err(LineIndexError::LineOutOfRange { line: position.line });
        };

        let line_text = &text[start..end];
        let mut utf16_count: u32 = 0;
        for (byte_offset, ch) in line_text.char_indices() {
            if utf16_count >= position.character {
                return Ok(start + byte_offset);
            }
            let units = ch.len_utf16() as u32;
            if utf16_count < position.character && position.character < utf16_count + units {
                // Requested column lands mid-surrogate-pair: stop before it.
                return Ok(start + byte_offset);
            }
            utf16_count += units;
        }
        Ok(end)
    }
}
