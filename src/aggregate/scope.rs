//! Query scopes and the per-aggregator view of values inside them.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::AggregateError;

/// Which indices an aggregator answers for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryScope {
    /// `[0, n_agents)`.
    Global,
    /// An explicit index set, owned by the query issuer.
    IndexSet(Arc<BTreeSet<usize>>),
    /// Inclusive window `[lo, hi]`.
    Range { lo: usize, hi: usize },
}

impl QueryScope {
    pub fn index_set(indices: impl IntoIterator<Item = usize>) -> Self {
        QueryScope::IndexSet(Arc::new(indices.into_iter().collect()))
    }

    pub fn range(lo: usize, hi: usize) -> Self {
        QueryScope::Range { lo, hi }
    }

    pub fn contains(&self, idx: usize) -> bool {
        match self {
            QueryScope::Global => true,
            QueryScope::IndexSet(set) => set.contains(&idx),
            QueryScope::Range { lo, hi } => (*lo..=*hi).contains(&idx),
        }
    }

    pub fn validate(&self, n_agents: usize) -> Result<(), AggregateError> {
        match self {
            QueryScope::Global => Ok(()),
            QueryScope::IndexSet(set) => match set.iter().next_back() {
                Some(&max) if max >= n_agents => Err(AggregateError::ScopeMismatch(format!(
                    "index {max} outside {n_agents} agents"
                ))),
                _ => Ok(()),
            },
            QueryScope::Range { lo, hi } => {
                if lo > hi || *hi >= n_agents {
                    Err(AggregateError::ScopeMismatch(format!(
                        "window [{lo},{hi}] invalid for {n_agents} agents"
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Indices in scope, ascending.
    pub fn indices(&self, n_agents: usize) -> Vec<usize> {
        match self {
            QueryScope::Global => (0..n_agents).collect(),
            QueryScope::IndexSet(set) => set.iter().copied().filter(|&i| i < n_agents).collect(),
            QueryScope::Range { lo, hi } => (*lo..=(*hi).min(n_agents.saturating_sub(1))).collect(),
        }
    }

    /// Inclusive bounds, when the scope is contiguous.
    pub fn window(&self, n_agents: usize) -> Option<(usize, usize)> {
        match self {
            QueryScope::Global if n_agents > 0 => Some((0, n_agents - 1)),
            QueryScope::Range { lo, hi } => Some((*lo, *hi)),
            _ => None,
        }
    }
}

/// The last value an aggregator saw for every index in its scope.
#[derive(Clone, Debug)]
pub(crate) enum ScopeView {
    Dense { offset: usize, values: Vec<i64> },
    Sparse(HashMap<usize, i64>),
}

impl ScopeView {
    pub(crate) fn seed(scope: &QueryScope, state: &[i64]) -> Self {
        match scope.window(state.len()) {
            Some((lo, hi)) => ScopeView::Dense {
                offset: lo,
                values: state[lo..=hi].to_vec(),
            },
            None => ScopeView::Sparse(
                scope
                    .indices(state.len())
                    .into_iter()
                    .map(|i| (i, state[i]))
                    .collect(),
            ),
        }
    }

    pub(crate) fn get(&self, idx: usize) -> Option<i64> {
        match self {
            ScopeView::Dense { offset, values } => idx
                .checked_sub(*offset)
                .and_then(|i| values.get(i))
                .copied(),
            ScopeView::Sparse(map) => map.get(&idx).copied(),
        }
    }

    pub(crate) fn set(&mut self, idx: usize, value: i64) {
        match self {
            ScopeView::Dense { offset, values } => {
                if let Some(slot) = idx.checked_sub(*offset).and_then(|i| values.get_mut(i)) {
                    *slot = value;
                }
            }
            ScopeView::Sparse(map) => {
                if let Some(slot) = map.get_mut(&idx) {
                    *slot = value;
                }
            }
        }
    }

    pub(crate) fn iter(&self) -> Box<dyn Iterator<Item = (usize, i64)> + '_> {
        match self {
            ScopeView::Dense { offset, values } => {
                Box::new(values.iter().enumerate().map(move |(i, v)| (offset + i, *v)))
            }
            ScopeView::Sparse(map) => Box::new(map.iter().map(|(i, v)| (*i, *v))),
        }
    }
}
