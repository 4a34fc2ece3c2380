//! Deterministic stream generation for lock scenarios.

use std::collections::BTreeMap;

use crate::canon::canon;
use crate::config::CodecConfig;
use crate::delta::{encode_state, resolve, PatchOp, PathSeg, PointEdit, PointEditDelta, TreePatch};
use crate::error::{FrameError, Result};
use crate::frame::write_frame;
use crate::lock::Xorshift64;
use crate::stream::Stream;
use crate::value::Value;

/// A stream in both distributable forms.
#[derive(Clone, Debug)]
pub struct Workload {
    /// Template frame followed by canonical delta frames.
    pub delta_stream: Stream,
    /// Template frame followed by one full canonical state per update.
    pub snapshot_stream: Vec<u8>,
}

impl Workload {
    fn new(template: Vec<u8>) -> Result<Self> {
        let mut snapshot_stream = Vec::new();
        write_frame(&mut snapshot_stream, &template)?;
        Ok(Self {
            delta_stream: Stream::new(template),
            snapshot_stream,
        })
    }

    fn push(&mut self, delta: Vec<u8>, snapshot: &[u8]) -> std::result::Result<(), FrameError> {
        self.delta_stream.push_delta(delta);
        write_frame(&mut self.snapshot_stream, snapshot)
    }
}

/// Flat integer state with point-edit updates.
#[derive(Clone, Debug)]
pub struct VectorWorkload {
    pub state0: Vec<i64>,
    pub deltas: Vec<PointEditDelta>,
    pub streams: Workload,
}

/// `k_updates` deltas of `m` edits each over `n_agents` values drawn from
/// `[0, value_range)`. Every edit changes its value.
pub fn vector_workload(
    rng: &mut Xorshift64,
    n_agents: usize,
    k_updates: usize,
    m_edits: usize,
    value_range: u64,
    config: &CodecConfig,
) -> Result<VectorWorkload> {
    let value_range = value_range.max(2);
    let state0: Vec<i64> = (0..n_agents).map(|_| rng.below(value_range) as i64).collect();
    let mut streams = Workload::new(encode_state(&state0)?)?;
    let mut state = state0.clone();
    let mut deltas = Vec::with_capacity(k_updates);
    for _ in 0..k_updates {
        let ops: Vec<PointEdit> = rng
            .sample_distinct(n_agents, m_edits)
            .into_iter()
            .map(|idx| {
                let old = state[idx];
                let new = (old as u64 + 1 + rng.below(value_range - 1)) % value_range;
                PointEdit::new(idx, old, new as i64)
            })
            .collect();
        let delta = PointEditDelta::new(ops, config)?;
        delta.apply_in_place(&mut state)?;
        streams.push(delta.encode()?, &encode_state(&state)?)?;
        deltas.push(delta);
    }
    Ok(VectorWorkload {
        state0,
        deltas,
        streams,
    })
}

/// Nested mapping template with tree-patch updates.
#[derive(Clone, Debug)]
pub struct TreeWorkload {
    pub template: Value,
    pub patches: Vec<TreePatch>,
    pub final_state: Value,
    pub streams: Workload,
}

/// A template of `headers` top-level sections, each a binary tree of `depth`
/// levels ending in small integer lists.
pub fn tree_template(rng: &mut Xorshift64, depth: usize, headers: usize, value_range: u64) -> Value {
    let sections = (0..headers)
        .map(|h| (format!("h{h:02}"), tree_node(rng, depth, value_range)))
        .collect();
    Value::Map(sections)
}

fn tree_node(rng: &mut Xorshift64, depth: usize, value_range: u64) -> Value {
    if depth == 0 {
        return Value::List((0..4).map(|_| Value::Int(rng.below(value_range) as i64)).collect());
    }
    let mut node = BTreeMap::new();
    node.insert("kind".to_string(), Value::Str(format!("d{depth}")));
    node.insert("left".to_string(), tree_node(rng, depth - 1, value_range));
    node.insert("right".to_string(), tree_node(rng, depth - 1, value_range));
    Value::Map(node)
}

/// Paths of every integer leaf, in canonical order.
pub fn int_leaf_paths(root: &Value) -> Vec<Vec<PathSeg>> {
    let mut out = Vec::new();
    collect_leaves(root, &mut Vec::new(), &mut out);
    out
}

fn collect_leaves(node: &Value, prefix: &mut Vec<PathSeg>, out: &mut Vec<Vec<PathSeg>>) {
    match node {
        Value::Int(_) => out.push(prefix.clone()),
        Value::Str(_) => {}
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                prefix.push(PathSeg::Index(i));
                collect_leaves(item, prefix, out);
                prefix.pop();
            }
        }
        Value::Map(entries) => {
            for (k, item) in entries {
                prefix.push(PathSeg::Key(k.clone()));
                collect_leaves(item, prefix, out);
                prefix.pop();
            }
        }
    }
}

/// `k_updates` patches, each setting `m_edits` distinct integer leaves to new values.
pub fn tree_workload(
    rng: &mut Xorshift64,
    depth: usize,
    headers: usize,
    k_updates: usize,
    m_edits: usize,
    value_range: u64,
    config: &CodecConfig,
) -> Result<TreeWorkload> {
    let value_range = value_range.max(2);
    let template = tree_template(rng, depth, headers, value_range);
    let leaves = int_leaf_paths(&template);
    let mut streams = Workload::new(canon(&template)?)?;
    let mut state = template.clone();
    let mut patches = Vec::with_capacity(k_updates);
    for _ in 0..k_updates {
        let ops: Vec<PatchOp> = rng
            .sample_distinct(leaves.len(), m_edits)
            .into_iter()
            .map(|leaf| {
                let path = leaves[leaf].clone();
                let old = resolve(&state, &path).and_then(Value::as_int).unwrap_or(0);
                let new = (old as u64 + 1 + rng.below(value_range - 1)) % value_range;
                PatchOp::new(path, Value::Int(new as i64))
            })
            .collect();
        let patch = TreePatch::new(ops, config)?;
        patch.apply_in_place(&mut state)?;
        streams.push(patch.encode()?, &canon(&state)?)?;
        patches.push(patch);
    }
    Ok(TreeWorkload {
        template,
        patches,
        final_state: state,
        streams,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_FRAME_LEN;
    use crate::delta::decode_state;
    use crate::frame::split_frames;

    #[test]
    fn test_vector_workload_is_deterministic_and_consistent() {
        let cfg = CodecConfig::default();
        let a = vector_workload(&mut Xorshift64::new(5), 32, 20, 2, 100, &cfg).unwrap();
        let b = vector_workload(&mut Xorshift64::new(5), 32, 20, 2, 100, &cfg).unwrap();
        assert_eq!(a.streams.snapshot_stream, b.streams.snapshot_stream);
        assert_eq!(a.streams.delta_stream, b.streams.delta_stream);

        let frames = split_frames(&a.streams.snapshot_stream, DEFAULT_MAX_FRAME_LEN).unwrap();
        assert_eq!(frames.len(), 21);
        assert_eq!(decode_state(frames[0]).unwrap(), a.state0);
        let last = crate::aggregate::naive::materialize(&a.state0, &a.deltas).unwrap();
        assert_eq!(decode_state(frames[20]).unwrap(), last);
        assert!(a.deltas.iter().all(|d| d.len() == 2));
        assert!(last.iter().all(|&v| (0..100).contains(&v)));
    }

    #[test]
    fn test_tree_template_shape() {
        let t = tree_template(&mut Xorshift64::new(1), 2, 3, 10);
        // 3 headers x 4 leaf lists x 4 ints
        assert_eq!(int_leaf_paths(&t).len(), 48);
        let paths = int_leaf_paths(&t);
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn test_tree_workload_replays_to_final_state() {
        let cfg = CodecConfig::default();
        let w = tree_workload(&mut Xorshift64::new(9), 2, 2, 10, 3, 50, &cfg).unwrap();
        let mut state = w.template.clone();
        for patch in &w.patches {
            assert_eq!(patch.len(), 3);
            state = patch.apply(&state).unwrap();
        }
        assert_eq!(state, w.final_state);
    }
}
