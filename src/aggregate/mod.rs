//! Exact aggregates maintained from the point-edit stream.
//!
//! Every aggregator is seeded once from a full state and afterwards only sees
//! `(idx, old, new)` edits. Linear kinds keep `base + correction`; top-K keeps an
//! ordered index over its scope; range sums keep a Fenwick tree over the whole
//! state. Each aggregator keeps its own view of the values in its scope, checks
//! every edit's `old` against that view, and poisons itself on a mismatch.

mod fenwick;
pub mod naive;
mod scope;
mod topk;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use fenwick::Fenwick;
pub use scope::QueryScope;
pub use topk::{top_k_naive, Ranked, TopKIndex};

use crate::crypto::Digest;
use crate::delta::{PointEdit, PointEditDelta};
use crate::error::AggregateError;
use scope::ScopeView;

/// What an aggregator computes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AggregateKind {
    Sum,
    /// `Σ state[i] * w[i]`; `w` spans all `n_agents` indices.
    WeightedDot(Arc<[i64]>),
    NormSq,
    TopK(usize),
    /// Sum over the scope's window, served from a Fenwick tree over the full state.
    RangeSum,
}

impl AggregateKind {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateKind::Sum => "sum",
            AggregateKind::WeightedDot(_) => "weighted_dot",
            AggregateKind::NormSq => "norm_sq",
            AggregateKind::TopK(_) => "topk",
            AggregateKind::RangeSum => "range_sum",
        }
    }

    /// Contribution of one index for the linear kinds.
    fn term(&self, idx: usize, v: i64) -> Option<i128> {
        let v = i128::from(v);
        match self {
            AggregateKind::Sum => Some(v),
            AggregateKind::WeightedDot(w) => v.checked_mul(i128::from(w[idx])),
            AggregateKind::NormSq => v.checked_mul(v),
            AggregateKind::TopK(_) | AggregateKind::RangeSum => Some(0),
        }
    }

    fn overflow(&self) -> AggregateError {
        AggregateError::Overflow(self.name())
    }
}

/// An aggregator's answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateValue {
    Scalar(i128),
    TopK(Vec<Ranked>),
}

impl AggregateValue {
    pub fn as_scalar(&self) -> Option<i128> {
        match self {
            AggregateValue::Scalar(v) => Some(*v),
            AggregateValue::TopK(_) => None,
        }
    }
}

impl fmt::Display for AggregateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateValue::Scalar(v) => write!(f, "{v}"),
            AggregateValue::TopK(items) => {
                f.write_str("[")?;
                for (n, r) in items.iter().enumerate() {
                    if n > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}:{}", r.idx, r.value)?;
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Clone, Debug)]
enum Accumulator {
    Linear {
        base: i128,
        correction: i128,
        view: ScopeView,
    },
    TopK {
        k: usize,
        index: TopKIndex,
    },
    Range {
        lo: usize,
        hi: usize,
        base: i128,
        bit: Fenwick,
    },
}

/// One live query.
#[derive(Clone, Debug)]
pub struct Aggregator {
    kind: AggregateKind,
    scope: QueryScope,
    n_agents: usize,
    template_hash: Digest,
    acc: Accumulator,
    poisoned: bool,
    edits_applied: u64,
}

impl Aggregator {
    pub fn new(
        kind: AggregateKind,
        scope: QueryScope,
        state: &[i64],
        template_hash: Digest,
    ) -> Result<Self, AggregateError> {
        let n_agents = state.len();
        scope.validate(n_agents)?;
        if let AggregateKind::WeightedDot(w) = &kind {
            if w.len() != n_agents {
                return Err(AggregateError::ScopeMismatch(format!(
                    "{} weights for {n_agents} agents",
                    w.len()
                )));
            }
        }
        let acc = seed(&kind, &scope, state)?;
        Ok(Self {
            kind,
            scope,
            n_agents,
            template_hash,
            acc,
            poisoned: false,
            edits_applied: 0,
        })
    }

    pub fn kind(&self) -> &AggregateKind {
        &self.kind
    }

    pub fn scope(&self) -> &QueryScope {
        &self.scope
    }

    pub fn template_hash(&self) -> &Digest {
        &self.template_hash
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn edits_applied(&self) -> u64 {
        self.edits_applied
    }

    /// Value computed from the seeding state, before any correction.
    pub fn base_value(&self) -> Option<i128> {
        match &self.acc {
            Accumulator::Linear { base, .. } | Accumulator::Range { base, .. } => Some(*base),
            Accumulator::TopK { .. } => None,
        }
    }

    pub fn value_now(&self) -> AggregateValue {
        match &self.acc {
            Accumulator::Linear {
                base, correction, ..
            } => AggregateValue::Scalar(base + correction),
            Accumulator::TopK { k, index } => AggregateValue::TopK(index.top(*k)),
            Accumulator::Range { lo, hi, bit, .. } => AggregateValue::Scalar(bit.range(*lo, *hi)),
        }
    }

    /// Fold one edit.
    pub fn on_edit(&mut self, idx: usize, old: i64, new: i64) -> Result<(), AggregateError> {
        self.on_edits(&[PointEdit::new(idx, old, new)])
    }

    /// Fold a whole delta. Either every op is folded or none is.
    pub fn on_delta(&mut self, delta: &PointEditDelta) -> Result<(), AggregateError> {
        self.on_edits(delta.ops())
    }

    fn on_edits(&mut self, ops: &[PointEdit]) -> Result<(), AggregateError> {
        match self.check(ops) {
            Ok(next) => {
                self.commit(ops, next);
                Ok(())
            }
            Err(e) => {
                if e != AggregateError::Poisoned {
                    self.poison(&e);
                }
                Err(e)
            }
        }
    }

    /// Validate ops against this aggregator's view without folding them.
    ///
    /// Returns the correction the linear kinds will hold once `ops` are
    /// committed. Ops target distinct indices, so each one's `old` is the
    /// view's value at check time.
    pub(crate) fn check(&self, ops: &[PointEdit]) -> Result<Option<i128>, AggregateError> {
        if self.poisoned {
            return Err(AggregateError::Poisoned);
        }
        let mut next = match &self.acc {
            Accumulator::Linear { correction, .. } => Some(*correction),
            Accumulator::TopK { .. } | Accumulator::Range { .. } => None,
        };
        for op in ops {
            if op.idx >= self.n_agents {
                return Err(AggregateError::IndexOutOfRange {
                    idx: op.idx,
                    n_agents: self.n_agents,
                });
            }
            let seen = match &self.acc {
                Accumulator::Linear { view, .. } => view.get(op.idx),
                Accumulator::TopK { index, .. } => index.get(op.idx),
                // The tree spans every index, so every edit is checked.
                Accumulator::Range { bit, .. } => i64::try_from(bit.point(op.idx)).ok(),
            };
            let Some(actual) = seen else {
                continue;
            };
            if actual != op.old {
                return Err(AggregateError::Precondition {
                    idx: op.idx,
                    expected: op.old,
                    actual,
                });
            }
            if let Some(corr) = next {
                next = Some(self.shifted(corr, op)?);
            }
        }
        if let (Accumulator::Linear { base, .. }, Some(corr)) = (&self.acc, next) {
            base.checked_add(corr).ok_or_else(|| self.kind.overflow())?;
        }
        Ok(next)
    }

    /// `corr` moved by one edit's change in contribution.
    fn shifted(&self, corr: i128, op: &PointEdit) -> Result<i128, AggregateError> {
        let kind = &self.kind;
        let new = kind.term(op.idx, op.new).ok_or_else(|| kind.overflow())?;
        let old = kind.term(op.idx, op.old).ok_or_else(|| kind.overflow())?;
        new.checked_sub(old)
            .and_then(|d| corr.checked_add(d))
            .ok_or_else(|| kind.overflow())
    }

    /// Fold ops that passed [`Aggregator::check`].
    pub(crate) fn commit(&mut self, ops: &[PointEdit], next: Option<i128>) {
        for op in ops {
            self.fold(op);
        }
        if let (Accumulator::Linear { correction, .. }, Some(next)) = (&mut self.acc, next) {
            *correction = next;
        }
    }

    fn fold(&mut self, op: &PointEdit) {
        let PointEdit { idx, new, .. } = *op;
        match &mut self.acc {
            Accumulator::Linear { view, .. } => {
                if view.get(idx).is_none() {
                    return;
                }
                view.set(idx, new);
            }
            Accumulator::TopK { index, .. } => {
                if index.get(idx).is_none() {
                    return;
                }
                index.update(idx, new);
            }
            Accumulator::Range { bit, .. } => {
                let prev = bit.point(idx);
                bit.add(idx, i128::from(new) - prev);
            }
        }
        self.edits_applied += 1;
    }

    pub(crate) fn poison(&mut self, cause: &AggregateError) {
        if !self.poisoned {
            tracing::warn!(kind = self.kind.name(), error = %cause, "aggregator poisoned");
        }
        self.poisoned = true;
    }

    /// Re-seed from a full state and clear the poisoned flag.
    pub fn reset(&mut self, state: &[i64]) -> Result<(), AggregateError> {
        if state.len() != self.n_agents {
            return Err(AggregateError::ScopeMismatch(format!(
                "reset with {} agents, expected {}",
                state.len(),
                self.n_agents
            )));
        }
        self.acc = seed(&self.kind, &self.scope, state)?;
        self.poisoned = false;
        self.edits_applied = 0;
        Ok(())
    }
}

fn seed(kind: &AggregateKind, scope: &QueryScope, state: &[i64]) -> Result<Accumulator, AggregateError> {
    Ok(match kind {
        AggregateKind::Sum | AggregateKind::WeightedDot(_) | AggregateKind::NormSq => {
            let view = ScopeView::seed(scope, state);
            let base = view
                .iter()
                .try_fold(0i128, |acc, (i, v)| acc.checked_add(kind.term(i, v)?))
                .ok_or_else(|| kind.overflow())?;
            Accumulator::Linear {
                base,
                correction: 0,
                view,
            }
        }
        AggregateKind::TopK(k) => {
            let pairs = scope.indices(state.len()).into_iter().map(|i| (i, state[i]));
            Accumulator::TopK {
                k: *k,
                index: TopKIndex::from_pairs(pairs),
            }
        }
        AggregateKind::RangeSum => {
            let (lo, hi) = scope.window(state.len()).ok_or_else(|| {
                AggregateError::ScopeMismatch("range sum needs a contiguous scope".into())
            })?;
            let bit = Fenwick::from_values(state);
            Accumulator::Range {
                lo,
                hi,
                base: bit.range(lo, hi),
                bit,
            }
        }
    })
}

/// Handle for a declared query.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryId(pub u32);

/// All live aggregators bound to one stream.
#[derive(Debug)]
pub struct AggregateBank {
    template_hash: Digest,
    n_agents: usize,
    next_id: u32,
    aggregators: BTreeMap<QueryId, Aggregator>,
}

impl AggregateBank {
    pub fn new(template_hash: Digest, n_agents: usize) -> Self {
        Self {
            template_hash,
            n_agents,
            next_id: 0,
            aggregators: BTreeMap::new(),
        }
    }

    /// Declare a query, seeded from `state` (the state after the last consumed delta).
    pub fn declare(
        &mut self,
        kind: AggregateKind,
        scope: QueryScope,
        state: &[i64],
    ) -> Result<QueryId, AggregateError> {
        if state.len() != self.n_agents {
            return Err(AggregateError::ScopeMismatch(format!(
                "state has {} agents, bank expects {}",
                state.len(),
                self.n_agents
            )));
        }
        let aggregator = Aggregator::new(kind, scope, state, self.template_hash)?;
        let id = QueryId(self.next_id);
        self.next_id += 1;
        self.aggregators.insert(id, aggregator);
        Ok(id)
    }

    pub fn release(&mut self, id: QueryId) -> Option<Aggregator> {
        self.aggregators.remove(&id)
    }

    pub fn get(&self, id: QueryId) -> Option<&Aggregator> {
        self.aggregators.get(&id)
    }

    pub fn value(&self, id: QueryId) -> Result<AggregateValue, AggregateError> {
        self.aggregators
            .get(&id)
            .map(Aggregator::value_now)
            .ok_or(AggregateError::UnknownQuery(id.0))
    }

    pub fn ids(&self) -> impl Iterator<Item = QueryId> + '_ {
        self.aggregators.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.aggregators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregators.is_empty()
    }

    pub fn is_poisoned(&self) -> bool {
        self.aggregators.values().any(Aggregator::is_poisoned)
    }

    /// Fold a delta into every aggregator. Every aggregator checks first; if any
    /// rejects, none folds and all are poisoned.
    pub fn on_delta(&mut self, delta: &PointEditDelta) -> Result<(), AggregateError> {
        let checked: Result<Vec<_>, _> = self
            .aggregators
            .values()
            .map(|a| a.check(delta.ops()))
            .collect();
        let plans = match checked {
            Ok(plans) => plans,
            Err(err) => {
                self.poison_all(&err);
                return Err(err);
            }
        };
        for (aggregator, next) in self.aggregators.values_mut().zip(plans) {
            aggregator.commit(delta.ops(), next);
        }
        Ok(())
    }

    pub fn poison_all(&mut self, cause: &AggregateError) {
        for aggregator in self.aggregators.values_mut() {
            aggregator.poison(cause);
        }
    }

    /// Re-seed every aggregator from `state`.
    pub fn reset(&mut self, state: &[i64]) -> Result<(), AggregateError> {
        for aggregator in self.aggregators.values_mut() {
            aggregator.reset(state)?;
        }
        Ok(())
    }
}

/// Exact cos² of the angle between the state and the weights, as
/// `(dot², ‖state‖² · ‖w‖²)`. `None` on overflow.
pub fn cosine_sq_parts(dot: i128, norm_sq: i128, weight_norm_sq: i128) -> Option<(i128, i128)> {
    Some((dot.checked_mul(dot)?, norm_sq.checked_mul(weight_norm_sq)?))
}

#[cfg(test)]
mod tests {
    use super::naive::{materialize, naive_value};
    use super::*;
    use crate::config::CodecConfig;
    use crate::lock::Xorshift64;

    const HASH: Digest = [7u8; 32];

    fn delta(ops: &[(usize, i64, i64)]) -> PointEditDelta {
        PointEditDelta::new(
            ops.iter().map(|&(i, o, n)| PointEdit::new(i, o, n)).collect(),
            &CodecConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_sum_moves_by_exact_delta() {
        let state = vec![1, 2, 3, 4];
        let mut agg = Aggregator::new(AggregateKind::Sum, QueryScope::Global, &state, HASH).unwrap();
        assert_eq!(agg.value_now(), AggregateValue::Scalar(10));
        agg.on_edit(2, 3, 10).unwrap();
        assert_eq!(agg.value_now(), AggregateValue::Scalar(17));
        assert_eq!(agg.base_value(), Some(10));
    }

    #[test]
    fn test_repeated_edits_use_previous_view_value() {
        let state = vec![5, 5];
        let mut agg = Aggregator::new(AggregateKind::NormSq, QueryScope::Global, &state, HASH).unwrap();
        agg.on_edit(0, 5, 7).unwrap();
        agg.on_edit(0, 7, 1).unwrap();
        assert_eq!(agg.value_now(), AggregateValue::Scalar(1 + 25));
    }

    #[test]
    fn test_edits_outside_scope_leave_seed_untouched() {
        let state = vec![1, 2, 3, 4, 5];
        let mut agg =
            Aggregator::new(AggregateKind::Sum, QueryScope::index_set([0, 4]), &state, HASH).unwrap();
        let before = agg.value_now();
        agg.on_edit(2, 3, 100).unwrap();
        assert_eq!(agg.value_now(), before);
        assert_eq!(agg.edits_applied(), 0);
    }

    #[test]
    fn test_mismatch_poisons_until_reset() {
        let state = vec![1, 2, 3];
        let mut agg = Aggregator::new(AggregateKind::Sum, QueryScope::Global, &state, HASH).unwrap();
        let err = agg.on_edit(1, 9, 4).unwrap_err();
        assert_eq!(
            err,
            AggregateError::Precondition {
                idx: 1,
                expected: 9,
                actual: 2
            }
        );
        assert!(agg.is_poisoned());
        assert_eq!(agg.on_edit(1, 2, 4), Err(AggregateError::Poisoned));
        assert_eq!(agg.value_now(), AggregateValue::Scalar(6));

        agg.reset(&[1, 2, 3]).unwrap();
        assert!(!agg.is_poisoned());
        agg.on_edit(1, 2, 4).unwrap();
        assert_eq!(agg.value_now(), AggregateValue::Scalar(8));
    }

    #[test]
    fn test_on_delta_is_all_or_nothing() {
        let state = vec![1, 2, 3];
        let mut agg = Aggregator::new(AggregateKind::Sum, QueryScope::Global, &state, HASH).unwrap();
        assert!(agg.on_delta(&delta(&[(0, 1, 5), (2, 9, 0)])).is_err());
        assert_eq!(agg.value_now(), AggregateValue::Scalar(6));
    }

    #[test]
    fn test_range_sum_checks_every_index() {
        let state = vec![1, 2, 3, 4, 5];
        let mut agg =
            Aggregator::new(AggregateKind::RangeSum, QueryScope::range(1, 2), &state, HASH).unwrap();
        assert_eq!(agg.value_now(), AggregateValue::Scalar(5));
        agg.on_edit(4, 5, 50).unwrap();
        assert_eq!(agg.value_now(), AggregateValue::Scalar(5));
        agg.on_edit(2, 3, 30).unwrap();
        assert_eq!(agg.value_now(), AggregateValue::Scalar(32));
        assert!(agg.on_edit(0, 7, 1).is_err());
        assert!(agg.is_poisoned());
    }

    #[test]
    fn test_range_sum_rejects_index_set() {
        let err = Aggregator::new(AggregateKind::RangeSum, QueryScope::index_set([1]), &[0, 0], HASH)
            .unwrap_err();
        assert!(matches!(err, AggregateError::ScopeMismatch(_)));
    }

    #[test]
    fn test_weighted_dot_requires_full_weights() {
        let w: Arc<[i64]> = Arc::from(vec![1, 2]);
        assert!(Aggregator::new(AggregateKind::WeightedDot(w), QueryScope::Global, &[1, 2, 3], HASH).is_err());
    }

    #[test]
    fn test_topk_within_scope() {
        let state = vec![9, 1, 8, 7, 8];
        let mut agg =
            Aggregator::new(AggregateKind::TopK(2), QueryScope::index_set([1, 2, 4]), &state, HASH).unwrap();
        assert_eq!(
            agg.value_now(),
            AggregateValue::TopK(vec![Ranked { idx: 2, value: 8 }, Ranked { idx: 4, value: 8 }])
        );
        agg.on_edit(1, 1, 20).unwrap();
        agg.on_edit(0, 9, 100).unwrap();
        assert_eq!(
            agg.value_now(),
            AggregateValue::TopK(vec![Ranked { idx: 1, value: 20 }, Ranked { idx: 2, value: 8 }])
        );
    }

    #[test]
    fn test_bank_poisons_all_on_failure() {
        let state = vec![1, 2, 3, 4];
        let mut bank = AggregateBank::new(HASH, 4);
        let a = bank.declare(AggregateKind::Sum, QueryScope::Global, &state).unwrap();
        let b = bank.declare(AggregateKind::RangeSum, QueryScope::range(0, 1), &state).unwrap();
        bank.on_delta(&delta(&[(0, 1, 2)])).unwrap();
        assert_eq!(bank.value(a).unwrap(), AggregateValue::Scalar(11));
        assert_eq!(bank.value(b).unwrap(), AggregateValue::Scalar(4));

        assert!(bank.on_delta(&delta(&[(3, 0, 1)])).is_err());
        assert!(bank.get(a).unwrap().is_poisoned());
        assert!(bank.get(b).unwrap().is_poisoned());
        assert_eq!(bank.value(a).unwrap(), AggregateValue::Scalar(11));

        bank.reset(&[2, 2, 3, 4]).unwrap();
        assert!(!bank.is_poisoned());
        assert!(bank.release(a).is_some());
        assert_eq!(bank.value(a), Err(AggregateError::UnknownQuery(0)));
    }

    #[test]
    fn test_norm_sq_overflow_is_an_error() {
        let err = Aggregator::new(AggregateKind::NormSq, QueryScope::Global, &[i64::MIN, i64::MIN], HASH)
            .unwrap_err();
        assert_eq!(err, AggregateError::Overflow("norm_sq"));
    }

    #[test]
    fn test_overflowing_edit_poisons_without_folding() {
        let state = vec![i64::MIN, 0];
        let mut agg = Aggregator::new(AggregateKind::NormSq, QueryScope::Global, &state, HASH).unwrap();
        let before = agg.value_now();
        let err = agg.on_delta(&delta(&[(1, 0, i64::MIN)])).unwrap_err();
        assert_eq!(err, AggregateError::Overflow("norm_sq"));
        assert!(agg.is_poisoned());
        assert_eq!(agg.value_now(), before);
        assert_eq!(agg.edits_applied(), 0);

        agg.reset(&[3, 4]).unwrap();
        agg.on_edit(1, 4, i64::MIN).unwrap();
        assert_eq!(agg.value_now(), AggregateValue::Scalar(9 + (1i128 << 126)));
    }

    #[test]
    fn test_bank_overflow_leaves_other_aggregators_unfolded() {
        let state = vec![i64::MIN, 0];
        let mut bank = AggregateBank::new(HASH, 2);
        let sum = bank.declare(AggregateKind::Sum, QueryScope::Global, &state).unwrap();
        bank.declare(AggregateKind::NormSq, QueryScope::Global, &state).unwrap();
        assert!(bank.on_delta(&delta(&[(1, 0, i64::MIN)])).is_err());
        assert_eq!(bank.value(sum).unwrap(), AggregateValue::Scalar(i128::from(i64::MIN)));
        assert!(bank.get(sum).unwrap().is_poisoned());
    }

    #[test]
    fn test_cosine_sq_parts() {
        assert_eq!(cosine_sq_parts(3, 5, 2), Some((9, 10)));
        assert_eq!(cosine_sq_parts(i128::MAX, 1, 1), None);
    }

    #[test]
    fn test_random_stream_matches_naive_at_every_prefix() {
        let mut rng = Xorshift64::new(99);
        let n = 64;
        let state0: Vec<i64> = (0..n).map(|_| rng.below(100) as i64).collect();
        let weights: Arc<[i64]> = (0..n).map(|_| rng.below(9) as i64 + 1).collect();
        let scopes = [
            QueryScope::Global,
            QueryScope::index_set(rng.sample_distinct(n, 8)),
            QueryScope::range(5, 40),
        ];
        let kinds = [
            AggregateKind::Sum,
            AggregateKind::WeightedDot(weights),
            AggregateKind::NormSq,
            AggregateKind::TopK(3),
        ];
        let mut aggs = Vec::new();
        for kind in &kinds {
            for scope in &scopes {
                aggs.push(Aggregator::new(kind.clone(), scope.clone(), &state0, HASH).unwrap());
            }
        }
        aggs.push(Aggregator::new(AggregateKind::RangeSum, QueryScope::range(5, 40), &state0, HASH).unwrap());

        let mut state = state0.clone();
        let mut deltas = Vec::new();
        for _ in 0..200 {
            let idxs = rng.sample_distinct(n, 3);
            let ops = idxs
                .into_iter()
                .map(|i| PointEdit::new(i, state[i], (state[i] + 1 + rng.below(50) as i64) % 100))
                .collect();
            let d = PointEditDelta::new(ops, &CodecConfig::default()).unwrap();
            d.apply_in_place(&mut state).unwrap();
            for agg in &mut aggs {
                agg.on_delta(&d).unwrap();
            }
            deltas.push(d);
            let materialized = materialize(&state0, &deltas).unwrap();
            assert_eq!(materialized, state);
            for agg in &aggs {
                assert_eq!(
                    agg.value_now(),
                    naive_value(agg.kind(), agg.scope(), &materialized).unwrap()
                );
            }
        }
    }
}
