//! Point-edit and tree-patch deltas: canonical ordering, encoding, decoding and apply.
//!
//! Wire shapes (canonical JSON arrays):
//! - point edit op: `{"i":idx,"n":new,"o":old}`
//! - tree-patch op: `{"p":[seg,...],"v":value}` where each seg is a string key or
//!   a non-negative integer index.
//!
//! Point edits sort by `(idx, new)`; tree-patch ops sort by path with indices
//! before keys at the same position. Construction canonicalizes, so every
//! `PointEditDelta` / `TreePatch` in memory is already in canonical order.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::canon::{self, canon_serialize};
use crate::config::{CodecConfig, MixedPathPolicy, NoOpPolicy};
use crate::error::{ApplyError, EncodingError};
use crate::value::Value;

/// One `(idx, old, new)` edit of a flat integer state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PointEdit {
    pub idx: usize,
    pub old: i64,
    pub new: i64,
}

impl PointEdit {
    pub fn new(idx: usize, old: i64, new: i64) -> Self {
        Self { idx, old, new }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WirePointOp {
    i: u64,
    n: i64,
    o: i64,
}

/// Canonically ordered set of point edits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PointEditDelta {
    ops: Vec<PointEdit>,
}

impl PointEditDelta {
    pub fn new(mut ops: Vec<PointEdit>, config: &CodecConfig) -> Result<Self, EncodingError> {
        ops.sort_by_key(|op| (op.idx, op.new));
        for pair in ops.windows(2) {
            if pair[0].idx == pair[1].idx {
                return Err(EncodingError::DuplicateIndex(pair[0].idx));
            }
        }
        if config.noop_policy == NoOpPolicy::Reject {
            if let Some(op) = ops.iter().find(|op| op.old == op.new) {
                return Err(EncodingError::NoOpEdit(op.idx));
            }
        }
        Ok(Self { ops })
    }

    pub fn ops(&self) -> &[PointEdit] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        let wire: Vec<WirePointOp> = self
            .ops
            .iter()
            .map(|op| WirePointOp {
                i: op.idx as u64,
                n: op.new,
                o: op.old,
            })
            .collect();
        canon_serialize(&wire)
    }

    /// Check every precondition against `state` without touching it.
    pub fn check(&self, state: &[i64]) -> Result<(), ApplyError> {
        for op in &self.ops {
            let actual = *state.get(op.idx).ok_or(ApplyError::IndexOutOfRange {
                idx: op.idx,
                len: state.len(),
            })?;
            if actual != op.old {
                return Err(ApplyError::Precondition {
                    idx: op.idx,
                    expected: op.old,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Apply to a copy of `state`.
    pub fn apply(&self, state: &[i64]) -> Result<Vec<i64>, ApplyError> {
        let mut next = state.to_vec();
        self.apply_in_place(&mut next)?;
        Ok(next)
    }

    /// Apply in place. On error `state` is untouched.
    pub fn apply_in_place(&self, state: &mut [i64]) -> Result<(), ApplyError> {
        self.check(state)?;
        for op in &self.ops {
            state[op.idx] = op.new;
        }
        Ok(())
    }
}

/// A tree-patch path segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSeg {
    Index(usize),
    Key(String),
}

impl PathSeg {
    fn is_index(&self) -> bool {
        matches!(self, PathSeg::Index(_))
    }
}

impl From<usize> for PathSeg {
    fn from(i: usize) -> Self {
        PathSeg::Index(i)
    }
}

impl From<&str> for PathSeg {
    fn from(k: &str) -> Self {
        PathSeg::Key(k.to_string())
    }
}

impl Ord for PathSeg {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PathSeg::Index(a), PathSeg::Index(b)) => a.cmp(b),
            (PathSeg::Key(a), PathSeg::Key(b)) => a.cmp(b),
            (PathSeg::Index(_), PathSeg::Key(_)) => Ordering::Less,
            (PathSeg::Key(_), PathSeg::Index(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for PathSeg {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Path into a value tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(pub Vec<PathSeg>);

impl Path {
    pub fn segments(&self) -> &[PathSeg] {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render_segments(&self.0, f)
    }
}

fn render_segments(segs: &[PathSeg], f: &mut impl fmt::Write) -> fmt::Result {
    f.write_char('[')?;
    for (n, seg) in segs.iter().enumerate() {
        if n > 0 {
            f.write_char(',')?;
        }
        match seg {
            PathSeg::Index(i) => write!(f, "{i}")?,
            PathSeg::Key(k) => write!(f, "{k:?}")?,
        }
    }
    f.write_char(']')
}

fn render_prefix(segs: &[PathSeg]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = render_segments(segs, &mut out);
    out
}

/// `(path, value)`: set the node at `path` to `value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchOp {
    pub path: Path,
    pub value: Value,
}

impl PatchOp {
    pub fn new(path: Vec<PathSeg>, value: Value) -> Self {
        Self {
            path: Path(path),
            value,
        }
    }
}

#[derive(Serialize)]
struct WirePatchOpRef<'a> {
    p: &'a [PathSeg],
    v: &'a Value,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WirePatchOp {
    p: Vec<PathSeg>,
    v: Value,
}

/// Canonically ordered set of tree-patch ops.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreePatch {
    ops: Vec<PatchOp>,
}

impl TreePatch {
    pub fn new(mut ops: Vec<PatchOp>, config: &CodecConfig) -> Result<Self, EncodingError> {
        if ops.iter().any(|op| op.path.0.is_empty()) {
            return Err(EncodingError::EmptyPath);
        }
        ops.sort_by(|a, b| a.path.cmp(&b.path));
        // Paths sharing a prefix are contiguous after sorting, so any key/index
        // clash shows up between neighbours.
        for pair in ops.windows(2) {
            let (a, b) = (&pair[0].path.0, &pair[1].path.0);
            if a == b {
                return Err(EncodingError::DuplicatePath(pair[0].path.to_string()));
            }
            if config.mixed_path_policy == MixedPathPolicy::Reject {
                if let Some(pos) = a.iter().zip(b.iter()).position(|(x, y)| x != y) {
                    if a[pos].is_index() != b[pos].is_index() {
                        return Err(EncodingError::MixedPath(render_prefix(&a[..pos])));
                    }
                }
            }
        }
        Ok(Self { ops })
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        let wire: Vec<WirePatchOpRef<'_>> = self
            .ops
            .iter()
            .map(|op| WirePatchOpRef {
                p: &op.path.0,
                v: &op.value,
            })
            .collect();
        canon_serialize(&wire)
    }

    /// Apply to a copy of `root`.
    pub fn apply(&self, root: &Value) -> Result<Value, ApplyError> {
        let mut next = root.clone();
        for op in &self.ops {
            let slot = walk_mut(&mut next, &op.path.0)?;
            *slot = op.value.clone();
        }
        Ok(next)
    }

    /// Apply in place. On error `root` is untouched.
    pub fn apply_in_place(&self, root: &mut Value) -> Result<(), ApplyError> {
        let next = self.apply(root)?;
        *root = next;
        Ok(())
    }

    /// Read a patch over a flat integer list as point edits against `state`.
    ///
    /// Every path must be a single index and every value an integer. `old` comes
    /// from `state`; setting an element to its current value is kept as a no-op.
    pub fn as_point_edits(&self, state: &[i64]) -> Result<PointEditDelta, ApplyError> {
        let ops = self
            .ops
            .iter()
            .map(|op| match (op.path.segments(), &op.value) {
                ([PathSeg::Index(idx)], Value::Int(new)) => state
                    .get(*idx)
                    .map(|&old| PointEdit::new(*idx, old, *new))
                    .ok_or_else(|| ApplyError::PathNotFound {
                        path: op.path.to_string(),
                    }),
                _ => Err(ApplyError::KindMismatch),
            })
            .collect::<Result<Vec<_>, _>>()?;
        // Single-index paths are already in index order.
        Ok(PointEditDelta { ops })
    }
}

fn walk_mut<'v>(root: &'v mut Value, path: &[PathSeg]) -> Result<&'v mut Value, ApplyError> {
    let mut node = root;
    for (depth, seg) in path.iter().enumerate() {
        let next = match (node, seg) {
            (Value::Map(map), PathSeg::Key(k)) => map.get_mut(k),
            (Value::List(items), PathSeg::Index(i)) => items.get_mut(*i),
            _ => None,
        };
        node = next.ok_or_else(|| ApplyError::PathNotFound {
            path: render_prefix(&path[..=depth]),
        })?;
    }
    Ok(node)
}

/// Look up the node at `path` without modifying anything.
pub fn resolve<'v>(root: &'v Value, path: &[PathSeg]) -> Option<&'v Value> {
    path.iter().try_fold(root, |node, seg| match (node, seg) {
        (Value::Map(map), PathSeg::Key(k)) => map.get(k),
        (Value::List(items), PathSeg::Index(i)) => items.get(*i),
        _ => None,
    })
}

/// Either kind of delta.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delta {
    PointEdit(PointEditDelta),
    TreePatch(TreePatch),
}

impl Delta {
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        match self {
            Delta::PointEdit(d) => d.encode(),
            Delta::TreePatch(d) => d.encode(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Delta::PointEdit(d) => d.len(),
            Delta::TreePatch(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply to a value. Point edits require a flat integer list.
    pub fn apply(&self, root: &Value) -> Result<Value, ApplyError> {
        match self {
            Delta::PointEdit(d) => {
                let state = root.as_int_list().ok_or(ApplyError::NotAStateVector)?;
                Ok(Value::int_list(&d.apply(&state)?))
            }
            Delta::TreePatch(d) => d.apply(root),
        }
    }
}

impl From<PointEditDelta> for Delta {
    fn from(d: PointEditDelta) -> Self {
        Delta::PointEdit(d)
    }
}

impl From<TreePatch> for Delta {
    fn from(d: TreePatch) -> Self {
        Delta::TreePatch(d)
    }
}

/// Canonical bytes of a point-edit delta given in any op order.
pub fn encode_point_edits(ops: &[PointEdit], config: &CodecConfig) -> Result<Vec<u8>, EncodingError> {
    PointEditDelta::new(ops.to_vec(), config)?.encode()
}

/// Canonical bytes of a tree-patch delta given in any op order.
pub fn encode_tree_patch(ops: &[PatchOp], config: &CodecConfig) -> Result<Vec<u8>, EncodingError> {
    TreePatch::new(ops.to_vec(), config)?.encode()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireOp {
    Point(WirePointOp),
    Patch(WirePatchOp),
}

/// Decode delta bytes. The op shape selects the kind; an empty array is an
/// empty point edit. The result is canonically ordered.
pub fn decode(bytes: &[u8], config: &CodecConfig) -> Result<Delta, EncodingError> {
    let wire: Vec<WireOp> = serde_json::from_slice(bytes)?;
    let mut points = Vec::new();
    let mut patches = Vec::new();
    for op in wire {
        match op {
            WireOp::Point(p) => points.push(point_from_wire(p)?),
            WireOp::Patch(p) => patches.push(PatchOp::new(p.p, p.v)),
        }
    }
    match (points.is_empty(), patches.is_empty()) {
        (_, true) => Ok(Delta::PointEdit(PointEditDelta::new(points, config)?)),
        (true, false) => Ok(Delta::TreePatch(TreePatch::new(patches, config)?)),
        (false, false) => Err(EncodingError::MalformedDelta(
            "point edits and tree-patch ops mixed in one delta".into(),
        )),
    }
}

/// Decode, rejecting bytes that are not the canonical encoding of the result.
pub fn decode_canonical(bytes: &[u8], config: &CodecConfig) -> Result<Delta, EncodingError> {
    let delta = decode(bytes, config)?;
    let again = delta.encode()?;
    if again != bytes {
        let offset = bytes
            .iter()
            .zip(&again)
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| bytes.len().min(again.len()));
        return Err(EncodingError::NonCanonical { offset });
    }
    Ok(delta)
}

pub fn decode_point_edits(bytes: &[u8], config: &CodecConfig) -> Result<PointEditDelta, EncodingError> {
    let wire: Vec<WirePointOp> = serde_json::from_slice(bytes)?;
    let ops = wire
        .into_iter()
        .map(point_from_wire)
        .collect::<Result<Vec<_>, _>>()?;
    PointEditDelta::new(ops, config)
}

pub fn decode_tree_patch(bytes: &[u8], config: &CodecConfig) -> Result<TreePatch, EncodingError> {
    let wire: Vec<WirePatchOp> = serde_json::from_slice(bytes)?;
    let ops = wire.into_iter().map(|op| PatchOp::new(op.p, op.v)).collect();
    TreePatch::new(ops, config)
}

fn point_from_wire(op: WirePointOp) -> Result<PointEdit, EncodingError> {
    let idx = usize::try_from(op.i)
        .map_err(|_| EncodingError::MalformedDelta(format!("index {} exceeds usize", op.i)))?;
    Ok(PointEdit::new(idx, op.o, op.n))
}

/// Canonical bytes of a value, for snapshot frames and state digests.
pub fn encode_state(state: &[i64]) -> Result<Vec<u8>, EncodingError> {
    canon_serialize(state)
}

/// Inverse of [`encode_state`].
pub fn decode_state(bytes: &[u8]) -> Result<Vec<i64>, EncodingError> {
    canon::decode(bytes)?.as_int_list().ok_or_else(|| {
        EncodingError::UnsupportedShape("snapshot is not a flat integer list".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map;
    use proptest::prelude::*;

    fn cfg() -> CodecConfig {
        CodecConfig::default()
    }

    #[test]
    fn test_point_edit_wire_shape() {
        let bytes = encode_point_edits(&[PointEdit::new(7, 1, 2), PointEdit::new(3, 5, 4)], &cfg())
            .unwrap();
        assert_eq!(bytes, br#"[{"i":3,"n":4,"o":5},{"i":7,"n":2,"o":1}]"#.to_vec());
    }

    #[test]
    fn test_point_edit_rejects_noop_by_default() {
        let ops = vec![PointEdit::new(1, 4, 4)];
        assert!(matches!(
            PointEditDelta::new(ops.clone(), &cfg()),
            Err(EncodingError::NoOpEdit(1))
        ));
        assert!(PointEditDelta::new(ops, &cfg().allowing_noops()).is_ok());
    }

    #[test]
    fn test_point_edit_rejects_duplicate_index() {
        let ops = vec![PointEdit::new(2, 0, 1), PointEdit::new(2, 1, 3)];
        assert!(matches!(
            PointEditDelta::new(ops, &cfg()),
            Err(EncodingError::DuplicateIndex(2))
        ));
    }

    #[test]
    fn test_point_edit_apply_checks_old() {
        let d = PointEditDelta::new(vec![PointEdit::new(0, 1, 9), PointEdit::new(2, 3, 8)], &cfg())
            .unwrap();
        assert_eq!(d.apply(&[1, 2, 3]).unwrap(), vec![9, 2, 8]);

        let mut state = vec![1, 2, 4];
        let err = d.apply_in_place(&mut state).unwrap_err();
        assert_eq!(
            err,
            ApplyError::Precondition {
                idx: 2,
                expected: 3,
                actual: 4
            }
        );
        assert_eq!(state, vec![1, 2, 4], "failed apply must not mutate");

        assert!(matches!(
            d.apply(&[1]),
            Err(ApplyError::IndexOutOfRange { idx: 2, len: 1 })
        ));
    }

    #[test]
    fn test_tree_patch_orders_paths() {
        let ops = vec![
            PatchOp::new(vec!["b".into()], Value::Int(1)),
            PatchOp::new(vec!["a".into(), 10usize.into()], Value::Int(2)),
            PatchOp::new(vec!["a".into(), 2usize.into()], Value::Int(3)),
        ];
        let bytes = encode_tree_patch(&ops, &cfg()).unwrap();
        assert_eq!(
            bytes,
            br#"[{"p":["a",2],"v":3},{"p":["a",10],"v":2},{"p":["b"],"v":1}]"#.to_vec()
        );
    }

    #[test]
    fn test_tree_patch_mixed_paths_policy() {
        let ops = vec![
            PatchOp::new(vec!["x".into(), "k".into()], Value::Int(1)),
            PatchOp::new(vec!["x".into(), 0usize.into()], Value::Int(2)),
        ];
        assert!(matches!(
            TreePatch::new(ops.clone(), &cfg()),
            Err(EncodingError::MixedPath(p)) if p == "[\"x\"]"
        ));

        let lenient = CodecConfig {
            mixed_path_policy: MixedPathPolicy::IndexBeforeKey,
            ..cfg()
        };
        let patch = TreePatch::new(ops, &lenient).unwrap();
        assert_eq!(patch.ops()[0].path.0[1], PathSeg::Index(0));
    }

    #[test]
    fn test_tree_patch_rejects_duplicate_and_empty_paths() {
        let dup = vec![
            PatchOp::new(vec!["a".into()], Value::Int(1)),
            PatchOp::new(vec!["a".into()], Value::Int(2)),
        ];
        assert!(matches!(
            TreePatch::new(dup, &cfg()),
            Err(EncodingError::DuplicatePath(_))
        ));
        assert!(matches!(
            TreePatch::new(vec![PatchOp::new(vec![], Value::Int(1))], &cfg()),
            Err(EncodingError::EmptyPath)
        ));
    }

    #[test]
    fn test_tree_patch_apply_and_missing_path() {
        let root = map! {
            "plan" => Value::List(vec![map! { "op" => "scan" }, map! { "op" => "join" }]),
            "ver" => 1i64,
        };
        let patch = TreePatch::new(
            vec![
                PatchOp::new(vec!["plan".into(), 1usize.into(), "op".into()], "hash_join".into()),
                PatchOp::new(vec!["ver".into()], Value::Int(2)),
            ],
            &cfg(),
        )
        .unwrap();
        let next = patch.apply(&root).unwrap();
        assert_eq!(
            resolve(&next, &[PathSeg::from("plan"), 1usize.into(), "op".into()]),
            Some(&Value::from("hash_join"))
        );
        assert_ne!(next, root);

        let missing = TreePatch::new(
            vec![PatchOp::new(vec!["plan".into(), 5usize.into()], Value::Int(0))],
            &cfg(),
        )
        .unwrap();
        let mut target = root.clone();
        assert_eq!(
            missing.apply_in_place(&mut target),
            Err(ApplyError::PathNotFound {
                path: "[\"plan\",5]".into()
            })
        );
        assert_eq!(target, root);
    }

    #[test]
    fn test_tree_patch_as_point_edits() {
        let patch = TreePatch::new(
            vec![
                PatchOp::new(vec![2usize.into()], Value::Int(9)),
                PatchOp::new(vec![0usize.into()], Value::Int(4)),
            ],
            &cfg(),
        )
        .unwrap();
        let edits = patch.as_point_edits(&[4, 5, 6]).unwrap();
        assert_eq!(edits.ops(), &[PointEdit::new(0, 4, 4), PointEdit::new(2, 6, 9)]);

        assert_eq!(
            patch.as_point_edits(&[4, 5]),
            Err(ApplyError::PathNotFound { path: "[2]".into() })
        );
        let nested = TreePatch::new(vec![PatchOp::new(vec!["a".into()], Value::Int(1))], &cfg()).unwrap();
        assert_eq!(nested.as_point_edits(&[0]), Err(ApplyError::KindMismatch));
        let text = TreePatch::new(vec![PatchOp::new(vec![0usize.into()], "x".into())], &cfg()).unwrap();
        assert_eq!(text.as_point_edits(&[0]), Err(ApplyError::KindMismatch));
    }

    #[test]
    fn test_decode_dispatches_on_shape() {
        let point = decode(br#"[{"i":1,"n":2,"o":0}]"#, &cfg()).unwrap();
        assert!(matches!(point, Delta::PointEdit(ref d) if d.len() == 1));

        let patch = decode(br#"[{"p":["a",0],"v":"x"}]"#, &cfg()).unwrap();
        assert!(matches!(patch, Delta::TreePatch(ref d) if d.len() == 1));

        assert_eq!(decode(b"[]", &cfg()).unwrap(), Delta::PointEdit(PointEditDelta::default()));

        assert!(decode(br#"[{"i":1,"n":2,"o":0},{"p":["a"],"v":1}]"#, &cfg()).is_err());
        assert!(decode(br#"[{"i":-1,"n":2,"o":0}]"#, &cfg()).is_err());
        assert!(decode(br#"[{"i":1,"n":2,"o":0,"x":1}]"#, &cfg()).is_err());
    }

    #[test]
    fn test_decode_canonical_rejects_reordered_ops() {
        let ok = br#"[{"i":1,"n":2,"o":0},{"i":4,"n":1,"o":0}]"#;
        assert!(decode_canonical(ok, &cfg()).is_ok());
        let swapped = br#"[{"i":4,"n":1,"o":0},{"i":1,"n":2,"o":0}]"#;
        assert!(decode(swapped, &cfg()).is_ok());
        assert!(matches!(
            decode_canonical(swapped, &cfg()),
            Err(EncodingError::NonCanonical { .. })
        ));
    }

    #[test]
    fn test_state_codec() {
        let bytes = encode_state(&[1, -2, 3]).unwrap();
        assert_eq!(bytes, b"[1,-2,3]".to_vec());
        assert_eq!(decode_state(&bytes).unwrap(), vec![1, -2, 3]);
        assert!(decode_state(br#"["a"]"#).is_err());
    }

    fn point_ops() -> impl Strategy<Value = Vec<PointEdit>> {
        prop::collection::btree_map(0usize..512, (-50i64..50, -50i64..50), 0..24).prop_map(|m| {
            m.into_iter()
                .map(|(idx, (old, bump))| PointEdit::new(idx, old, old + bump.max(1)))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]

        #[test]
        fn point_edit_order_invariance(ops in point_ops(), seed in any::<u64>()) {
            let mut shuffled = ops.clone();
            let mut rng = crate::lock::Xorshift64::new(seed);
            rng.shuffle(&mut shuffled);
            prop_assert_eq!(
                encode_point_edits(&ops, &cfg()).unwrap(),
                encode_point_edits(&shuffled, &cfg()).unwrap()
            );
        }

        #[test]
        fn point_edit_round_trip(ops in point_ops()) {
            let delta = PointEditDelta::new(ops, &cfg()).unwrap();
            let bytes = delta.encode().unwrap();
            let back = decode_canonical(&bytes, &cfg()).unwrap();
            prop_assert_eq!(back.encode().unwrap(), bytes);
            prop_assert_eq!(back, Delta::PointEdit(delta));
        }
    }
}
