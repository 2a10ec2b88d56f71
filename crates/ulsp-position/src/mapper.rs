use crate::diff::{DiffOp, compute_edit_script, reverse_edit_script};
use crate::line_index::{LineIndex, LineIndexError};
use crate::position::Position;

/// Bidirectional translator between positions in a document's *base*
/// snapshot and its *current* text (§4.G).
///
/// Built once per `(base, current)` pair and reused for every position
/// query against that pair; the Document Store invalidates it whenever
/// either text changes.
#[derive(Debug, Clone)]
pub struct PositionMapper {
    identity: bool,
    base_text: String,
    current_text: String,
    base_index: LineIndex,
    current_index: LineIndex,
    /// base → current
    forward: Vec<DiffOp>,
    /// current → base
    reverse: Vec<DiffOp>,
}

impl PositionMapper {
    /// Build a mapper between `base` and `current`. If the two are equal,
    /// both mapping directions become the identity and no edit script is
    /// computed.
    pub fn new(base: &str, current: &str) -> Self {
        let identity = base == current;
        let forward = if identity { Vec::new() } else { compute_edit_script(base, current) };
        let reverse = if identity { Vec::new() } else { reverse_edit_script(&forward) };
        Self {
            identity,
            base_text: base.to_string(),
            current_text: current.to_string(),
            base_index: LineIndex::new(base),
            current_index: LineIndex::new(current),
            forward,
            reverse,
        }
    }

    /// The identity mapper used for documents with no base snapshot yet:
    /// `current` maps to itself in both directions.
    pub fn identity(current: &str) -> Self {
        Self::new(current, current)
    }

    /// Map a position in the current text back to the base text.
    ///
    /// `in_new_region` is `true` when `pos` falls inside text that was
    /// inserted since the base snapshot and therefore has no base
    /// counterpart.
    pub fn map_current_to_base(
        &self,
        pos: Position,
    ) -> Result<(Position, bool), LineIndexError> {
        if self.identity {
            self.current_index.position_to_offset(&self.current_text, pos)?;
            return Ok((pos, false));
        }
        walk(
            &self.current_text,
            &self.base_text,
            &self.reverse,
            &self.current_index,
            &self.base_index,
            pos,
        )
    }

    /// Map a position in the base text forward to the current text.
    ///
    /// Always succeeds for a valid base position (or fails with
    /// [`LineIndexError::LineOutOfRange`]); whether the position landed in
    /// a region later deleted is not exposed — callers that need that must
    /// use [`PositionMapper::map_current_to_base`] in the other direction.
    pub fn map_base_to_current(&self, pos: Position) -> Result<Position, LineIndexError> {
        if self.identity {
            self.base_index.position_to_offset(&self.base_text, pos)?;
            return Ok(pos);
        }
        let (target, _in_deleted_region) = walk(
            &self.base_text,
            &self.current_text,
            &self.forward,
            &self.base_index,
            &self.current_index,
            pos,
        )?;
        Ok(target)
    }
}

/// Walk `script` (source → target) to translate `pos`, a position in
/// `source_text`, into a position in `target_text`.
fn walk(
    source_text: &str,
    target_text: &str,
    script: &[DiffOp],
    source_index: &LineIndex,
    target_index: &LineIndex,
    pos: Position,
) -> Result<(Position, bool), LineIndexError> {
    let source_offset = source_index.position_to_offset(source_text, pos)?;

    let mut src_bytes = 0usize;
    let mut dst_bytes = 0usize;

    for op in script {
        let src_before = src_bytes;
        let dst_before = dst_bytes;
        let (consumes_source, consumes_target, len) = match op {
            DiffOp::Equal(t) => (true, true, t.len()),
            DiffOp::Delete(t) => (true, false, t.len()),
            DiffOp::Insert(t) => (false, true, t.len()),
        };
        if consumes_source {
            src_bytes += len;
        }
        if consumes_target {
            dst_bytes += len;
        }

        if consumes_source && src_bytes > source_offset {
            return Ok(match op {
                DiffOp::Delete(_) => {
                    (target_index.offset_to_position(target_text, dst_before), true)
                }
                _ => {
                    let target_offset = dst_before + (source_offset - src_before);
                    (target_index.offset_to_position(target_text, target_offset), false)
                }
            });
        }
    }

    // Source offset lands at or past the end of every source-consuming op:
    // the position is at the very end of the source text.
    Ok((target_index.offset_to_position(target_text, dst_bytes), false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mapper_round_trips_every_position() {
        let mapper = PositionMapper::identity("hello\nworld");
        for pos in [Position::new(0, 0), Position::new(0, 5), Position::new(1, 3)] {
            assert_eq!(mapper.map_current_to_base(pos).unwrap(), (pos, false));
            assert_eq!(mapper.map_base_to_current(pos).unwrap(), pos);
        }
    }

    #[test]
    fn s3_position_mapper_across_deletion() {
        let mapper = PositionMapper::new("Line 1\nLine 2\nLine 3", "Line 1\nLine 3");
        let (mapped, in_new_region) =
            mapper.map_current_to_base(Position::new(1, 5)).unwrap();
        assert_eq!(mapped, Position::new(2, 5));
        assert!(!in_new_region);
    }

    #[test]
    fn s4_position_mapper_into_insertion() {
        let mapper = PositionMapper::new("", "Hello\nWorld");
        let (mapped, in_new_region) =
            mapper.map_current_to_base(Position::new(1, 1)).unwrap();
        assert_eq!(mapped, Position::new(0, 0));
        assert!(in_new_region);
    }

    #[test]
    fn weak_inverse_round_trip() {
        let mapper = PositionMapper::new("hello world", "hello brave world");
        // "world" in base starts at byte 6 -> (0, 6); after the insertion of
        // "brave " it's still outside the inserted region so the inverse
        // should hold.
        let base_pos = Position::new(0, 9); // "wor|ld" inside "world"
        let current_pos = mapper.map_base_to_current(base_pos).unwrap();
        let (back, in_new_region) = mapper.map_current_to_base(current_pos).unwrap();
        assert!(!in_new_region);
        assert_eq!(back, base_pos);
    }

    #[test]
    fn position_past_end_of_text_maps_to_end_of_target() {
        let mapper = PositionMapper::new("abc", "abcdef");
        let (mapped, in_new_region) =
            mapper.map_current_to_base(Position::new(0, 6)).unwrap();
        assert!(!in_new_region);
        assert_eq!(mapped, Position::new(0, 3));
    }

    #[test]
    fn out_of_range_line_propagates() {
        let mapper = PositionMapper::new("a", "b");
        assert!(mapper.map_base_to_current(Position::new(9, 0)).is_err());
    }
}
