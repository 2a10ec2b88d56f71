/// One step of an edit script between a source and a target text.
///
/// Concatenating the non-[`Insert`](DiffOp::Insert) texts reconstructs the
/// source; concatenating the non-[`Delete`](DiffOp::Delete) texts
/// reconstructs the target (§4.G).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    /// Text present, unchanged, in both source and target.
    Equal(String),
    /// Text present only in the target.
    Insert(String),
    /// Text present only in the source.
    Delete(String),
}

/// Build the forward edit script from `base` to `current`.
///
/// This is a prefix/suffix diff: the longest common prefix and (disjoint)
/// longest common suffix are split off as `Equal` runs, and whatever
/// remains in between becomes one `Delete` (the base's middle) followed by
/// one `Insert` (the current's middle). This is not a minimal diff, but it
/// satisfies the edit-script invariant of §4.G for any pair of texts, and
/// it degrades gracefully for the common LSP case of one contiguous
/// incremental edit.
pub fn compute_edit_script(base: &str, current: &str) -> Vec<DiffOp> {
    let prefix_len = common_prefix_len(base, current);
    let base_rest = &base[prefix_len..];
    let current_rest = &current[prefix_len..];

    let suffix_len = common_suffix_len(base_rest, current_rest);
    let base_mid = &base_rest[..base_rest.len() - suffix_len];
    let current_mid = &current_rest[..current_rest.len() - suffix_len];

    let mut ops = Vec::with_capacity(4);
    if prefix_len > 0 {
        ops.push(DiffOp::Equal(base[..prefix_len].to_string()));
    }
    if !base_mid.is_empty() {
        ops.push(DiffOp::Delete(base_mid.to_string()));
    }
    if !current_mid.is_empty() {
        ops.push(DiffOp::Insert(current_mid.to_string()));
    }
    if suffix_len > 0 {
        ops.push(DiffOp::Equal(base_rest[base_rest.len() - suffix_len..].to_string()));
    }
    ops
}

/// Swap `Insert` and `Delete` in a forward script to get the reverse
/// (`current → base`) script. `Equal` runs are shared between the two
/// directions unchanged.
pub fn reverse_edit_script(forward: &[DiffOp]) -> Vec<DiffOp> {
    forward
        .iter()
        .map(|op| match op {
            DiffOp::Equal(text) => DiffOp::Equal(text.clone()),
            DiffOp::Insert(text) => DiffOp::Delete(text.clone()),
            DiffOp::Delete(text) => DiffOp::Insert(text.clone()),
        })
        .collect()
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    let mut boundary = 0;
    for ((ai, ac), (_, bc)) in a.char_indices().zip(b.char_indices()) {
        if ac != bc {
            break;
        }
        boundary = ai + ac.len_utf8();
    }
    boundary
}

fn common_suffix_len(a: &str, b: &str) -> usize {
    let mut len = 0;
    for (ac, bc) in a.chars().rev().zip(b.chars().rev()) {
        if ac != bc {
            break;
        }
        len += ac.len_utf8();
    }
    len
}
