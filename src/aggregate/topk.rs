//! Ordered index for top-K queries over a scope.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// One entry of a top-K answer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranked {
    pub idx: usize,
    pub value: i64,
}

/// Values over a scope, kept sorted by `(value desc, idx asc)`.
#[derive(Clone, Debug, Default)]
pub struct TopKIndex {
    values: HashMap<usize, i64>,
    ordered: BTreeSet<(Reverse<i64>, usize)>,
}

impl TopKIndex {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, i64)>) -> Self {
        let mut index = Self::default();
        for (idx, value) in pairs {
            if let Some(prev) = index.values.insert(idx, value) {
                index.ordered.remove(&(Reverse(prev), idx));
            }
            index.ordered.insert((Reverse(value), idx));
        }
        index
    }

    pub fn get(&self, idx: usize) -> Option<i64> {
        self.values.get(&idx).copied()
    }

    /// Replace the value at a tracked index. Untracked indices are ignored.
    pub fn update(&mut self, idx: usize, value: i64) {
        if let Some(slot) = self.values.get_mut(&idx) {
            self.ordered.remove(&(Reverse(*slot), idx));
            *slot = value;
            self.ordered.insert((Reverse(value), idx));
        }
    }

    /// The `k` largest values, ties broken by ascending index.
    pub fn top(&self, k: usize) -> Vec<Ranked> {
        self.ordered
            .iter()
            .take(k)
            .map(|&(Reverse(value), idx)| Ranked { idx, value })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Top-K by partial sort, the reference the ordered index must agree with.
pub fn top_k_naive(pairs: impl IntoIterator<Item = (usize, i64)>, k: usize) -> Vec<Ranked> {
    let mut all: Vec<Ranked> = pairs
        .into_iter()
        .map(|(idx, value)| Ranked { idx, value })
        .collect();
    let key = |r: &Ranked| (Reverse(r.value), r.idx);
    if k < all.len() {
        all.select_nth_unstable_by_key(k, key);
        all.truncate(k);
    }
    all.sort_by_key(key);
    all
}
