//! Bidirectional `base ⇄ current` position mapping for the Document Store.
//!
//! A document entry that has been edited since its last re-anchor (§4.F)
//! carries a *base* snapshot alongside its current text. This crate answers
//! "where did this position in one version land in the other" in
//! LSP-conformant UTF-16 coordinates, including whether a position fell
//! inside a region that has no counterpart in the other version.
//!
//! [`PositionMapper`] is the bidirectional translator; [`LineIndex`] does the
//! UTF-8-byte/UTF-16-column bookkeeping it's built on.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod diff;
mod line_index;
mod mapper;
mod position;

pub use diff::{DiffOp, compute_edit_script};
pub use line_index::{LineIndex, LineIndexError};
pub use mapper::PositionMapper;
pub use position::Position;
