//! Ground truth: full materialization and from-scratch recomputation.

use crate::delta::PointEditDelta;
use crate::error::{AggregateError, ApplyError};

use super::{top_k_naive, AggregateKind, AggregateValue, QueryScope};

/// Replay `deltas` over `state0`.
pub fn materialize(state0: &[i64], deltas: &[PointEditDelta]) -> Result<Vec<i64>, ApplyError> {
    let mut state = state0.to_vec();
    for delta in deltas {
        delta.apply_in_place(&mut state)?;
    }
    Ok(state)
}

/// Recompute an aggregate over a fully materialized state.
pub fn naive_value(
    kind: &AggregateKind,
    scope: &QueryScope,
    state: &[i64],
) -> Result<AggregateValue, AggregateError> {
    scope.validate(state.len())?;
    let indices = scope.indices(state.len());
    let term = |i: usize| -> Option<i128> {
        let v = i128::from(state[i]);
        match kind {
            AggregateKind::Sum | AggregateKind::RangeSum => Some(v),
            AggregateKind::WeightedDot(w) => v.checked_mul(i128::from(w[i])),
            AggregateKind::NormSq => v.checked_mul(v),
            AggregateKind::TopK(_) => None,
        }
    };
    Ok(match kind {
        AggregateKind::TopK(k) => {
            AggregateValue::TopK(top_k_naive(indices.iter().map(|&i| (i, state[i])), *k))
        }
        _ => AggregateValue::Scalar(
            indices
                .iter()
                .try_fold(0i128, |acc, &i| acc.checked_add(term(i)?))
                .ok_or(AggregateError::Overflow(kind.name()))?,
        ),
    })
}
