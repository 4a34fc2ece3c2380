//! Built-in lock scenarios and the runner that turns one into a sealed report.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aggregate::naive::naive_value;
use crate::aggregate::{cosine_sq_parts, AggregateKind, AggregateValue, QueryId, QueryScope};
use crate::canon::recanon;
use crate::compress::{gzip_compress, GZIP_LEVEL};
use crate::config::{CodecConfig, DEFAULT_MAX_FRAME_LEN, SCHEMA_VER};
use crate::crypto::{sha256_many, ChainKey};
use crate::delta::{decode_state, encode_point_edits, PointEdit};
use crate::error::{FrameError, Result};
use crate::frame::split_frames;
use crate::lock::workload::{tree_workload, vector_workload, VectorWorkload, Workload};
use crate::lock::{LockReport, Xorshift64};
use crate::receipt::{verify_chain_bytes, RECEIPT_LEN};
use crate::session::StreamSession;
use crate::stream::{Stream, StreamReader};
use crate::template::Template;

/// Query sizes used by the SUM and TOPK scenarios.
const Q_SIZES: [usize; 4] = [1, 8, 64, 512];

/// Byte flips tried against each of receipts and deltas in the chain scenario.
const TAMPER_TRIALS: usize = 64;

/// What a scenario exercises.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioKind {
    /// SUM over random index sets of each size.
    Sum { q_sizes: Vec<usize> },
    /// TOPK for every `(q_size, k)` pair.
    TopK { q_sizes: Vec<usize>, ks: Vec<usize> },
    /// RANGE_SUM over inclusive windows.
    RangeSum { windows: Vec<(usize, usize)> },
    /// WEIGHTED_DOT and NORM_SQ over the whole state, plus exact cos².
    DotNorm,
    /// Canonical delta bytes and replay under shuffled op order.
    Canonical,
    /// Tree-patch stream bound into a receipt chain, then tampered with.
    ReceiptChain,
}

/// One lock scenario. Sizes not used by a kind are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    pub seed: u64,
    #[serde(default)]
    pub n_agents: usize,
    pub k_updates: usize,
    pub m_edits_per_update: usize,
    #[serde(default)]
    pub depth: usize,
    #[serde(default)]
    pub headers: usize,
    #[serde(default = "default_value_range")]
    pub value_range: u64,
    /// When set, `raw_snapshot_stream / raw_delta_stream` must exceed it.
    #[serde(default)]
    pub min_raw_ratio: Option<u64>,
    #[serde(flatten)]
    pub kind: ScenarioKind,
}

fn default_value_range() -> u64 {
    1000
}

impl ScenarioSpec {
    fn vector(name: &str, seed: u64, kind: ScenarioKind) -> Self {
        Self {
            name: name.to_string(),
            seed,
            n_agents: 4096,
            k_updates: 1024,
            m_edits_per_update: 1,
            depth: 0,
            headers: 0,
            value_range: default_value_range(),
            min_raw_ratio: None,
            kind,
        }
    }
}

/// The six locked scenarios.
pub fn builtin_scenarios() -> Vec<ScenarioSpec> {
    vec![
        ScenarioSpec {
            min_raw_ratio: Some(50),
            ..ScenarioSpec::vector(
                "s1_sum",
                30030,
                ScenarioKind::Sum {
                    q_sizes: Q_SIZES.to_vec(),
                },
            )
        },
        ScenarioSpec::vector(
            "s2_topk",
            31031,
            ScenarioKind::TopK {
                q_sizes: Q_SIZES.to_vec(),
                ks: vec![1, 5, 10],
            },
        ),
        ScenarioSpec::vector(
            "s3_range_sum",
            33033,
            ScenarioKind::RangeSum {
                windows: vec![
                    (0, 0),
                    (0, 31),
                    (64, 127),
                    (1000, 1100),
                    (2048, 3071),
                    (3500, 4095),
                ],
            },
        ),
        ScenarioSpec::vector("s4_dot_norm", 36036, ScenarioKind::DotNorm),
        ScenarioSpec::vector("s5_canonical", 38038, ScenarioKind::Canonical),
        ScenarioSpec {
            name: "s6_receipt_chain".to_string(),
            seed: 26026,
            n_agents: 0,
            k_updates: 512,
            m_edits_per_update: 3,
            depth: 4,
            headers: 16,
            value_range: default_value_range(),
            min_raw_ratio: None,
            kind: ScenarioKind::ReceiptChain,
        },
    ]
}

/// A finished run.
#[derive(Clone, Debug)]
pub struct ScenarioOutcome {
    pub name: String,
    pub report: LockReport,
}

impl ScenarioOutcome {
    /// Aggregator equality and every other flag held.
    pub fn passed(&self) -> bool {
        self.report.all_flags_ok()
    }
}

/// Deterministic per-stream key: the chain scenario must lock its receipts too.
fn scenario_key(seed: u64) -> ChainKey {
    ChainKey::from_bytes(&sha256_many(&[b"wirepack-lock-key".as_slice(), &seed.to_le_bytes()]))
}

/// Run one scenario. Nothing here reads time or environment.
pub fn run_scenario(spec: &ScenarioSpec) -> Result<ScenarioOutcome> {
    let config = CodecConfig::default();
    let mut rng = Xorshift64::new(spec.seed);
    let mut report = LockReport::new();
    report.push_str("scenario", spec.name.as_str());
    report.push_u64("seed", spec.seed);

    if let ScenarioKind::ReceiptChain = spec.kind {
        run_chain(spec, &mut rng, &config, &mut report)?;
    } else {
        report
            .push_count("n_agents", spec.n_agents)
            .push_count("k_updates", spec.k_updates)
            .push_count("m_edits_per_update", spec.m_edits_per_update);
        let workload = vector_workload(
            &mut rng,
            spec.n_agents,
            spec.k_updates,
            spec.m_edits_per_update,
            spec.value_range,
            &config,
        )?;
        push_sizes(&mut report, &workload.streams, spec.min_raw_ratio)?;
        match &spec.kind {
            ScenarioKind::Canonical => {
                run_canonical(spec, &workload, &mut rng, &config, &mut report)?
            }
            _ => run_queries(spec, &workload, &mut rng, &config, &mut report)?,
        }
    }

    let drift = report.drift_sha256()?;
    tracing::info!(
        scenario = %spec.name,
        passed = report.all_flags_ok(),
        drift = %drift,
        "lock scenario finished"
    );
    Ok(ScenarioOutcome {
        name: spec.name.clone(),
        report,
    })
}

fn push_sizes(report: &mut LockReport, streams: &Workload, min_raw_ratio: Option<u64>) -> Result<()> {
    let raw_snapshot = streams.snapshot_stream.len();
    let raw_delta = streams.delta_stream.to_bytes()?.len();
    let gz_snapshot = gzip_compress(&streams.snapshot_stream, GZIP_LEVEL)
        .map_err(FrameError::from)?
        .len();
    let gz_delta = streams.delta_stream.to_gzip()?.len();
    report
        .push_count("raw_snapshot_stream", raw_snapshot)
        .push_count("raw_delta_stream", raw_delta)
        .push_count("gz_snapshot_stream", gz_snapshot)
        .push_count("gz_delta_stream", gz_delta)
        .push_ratio("raw_ratio", raw_snapshot, raw_delta)
        .push_ratio("gz_ratio", gz_snapshot, gz_delta);
    if let Some(min) = min_raw_ratio {
        let ok = raw_snapshot as u128 > u128::from(min) * raw_delta as u128;
        report.push_flag("raw_ratio_ok", ok);
    }
    Ok(())
}

/// Every snapshot frame decoded: ground truth after each prefix.
fn snapshots(workload: &VectorWorkload) -> Result<Vec<Vec<i64>>> {
    split_frames(&workload.streams.snapshot_stream, DEFAULT_MAX_FRAME_LEN)?
        .into_iter()
        .map(|frame| Ok(decode_state(frame)?))
        .collect()
}

fn open_session(workload: &VectorWorkload, seed: u64, config: &CodecConfig) -> Result<StreamSession> {
    let template = Template::from_frame(&workload.streams.delta_stream.template, SCHEMA_VER)?;
    Ok(StreamSession::new(Arc::new(template), scenario_key(seed), config.clone()))
}

struct Query {
    label: String,
    kind: AggregateKind,
    scope: QueryScope,
    id: QueryId,
    ok: bool,
}

fn run_queries(
    spec: &ScenarioSpec,
    workload: &VectorWorkload,
    rng: &mut Xorshift64,
    config: &CodecConfig,
    report: &mut LockReport,
) -> Result<()> {
    let kind = &spec.kind;
    let n = workload.state0.len();
    let mut session = open_session(workload, spec.seed, config)?;

    let mut declared: Vec<(String, AggregateKind, QueryScope)> = Vec::new();
    match kind {
        ScenarioKind::Sum { q_sizes } => {
            for &q in q_sizes {
                let scope = QueryScope::index_set(rng.sample_distinct(n, q));
                declared.push((format!("sum_q{q}"), AggregateKind::Sum, scope));
            }
        }
        ScenarioKind::TopK { q_sizes, ks } => {
            for &q in q_sizes {
                let scope = QueryScope::index_set(rng.sample_distinct(n, q));
                for &k in ks {
                    declared.push((format!("topk_q{q}_k{k}"), AggregateKind::TopK(k), scope.clone()));
                }
            }
        }
        ScenarioKind::RangeSum { windows } => {
            for &(lo, hi) in windows {
                declared.push((
                    format!("range_{lo}_{hi}"),
                    AggregateKind::RangeSum,
                    QueryScope::range(lo, hi),
                ));
            }
        }
        ScenarioKind::DotNorm => {
            let weights: Vec<i64> = (0..n).map(|_| rng.below(2001) as i64 - 1000).collect();
            declared.push((
                "weighted_dot".into(),
                AggregateKind::WeightedDot(weights.into()),
                QueryScope::Global,
            ));
            declared.push(("norm_sq".into(), AggregateKind::NormSq, QueryScope::Global));
        }
        ScenarioKind::Canonical | ScenarioKind::ReceiptChain => {}
    }

    let mut queries = Vec::with_capacity(declared.len());
    for (label, kind, scope) in declared {
        let id = session.declare(kind.clone(), scope.clone())?;
        queries.push(Query {
            label,
            kind,
            scope,
            id,
            ok: true,
        });
    }

    let truth = snapshots(workload)?;
    let check = |session: &StreamSession, queries: &mut [Query], state: &[i64]| -> Result<()> {
        for q in queries.iter_mut() {
            let expected = naive_value(&q.kind, &q.scope, state)?;
            q.ok &= session.value(q.id)? == expected;
        }
        Ok(())
    };

    check(&session, &mut queries, &truth[0])?;
    let mut cos2_ok = true;
    let w_norm_sq = queries.first().and_then(|q| match &q.kind {
        AggregateKind::WeightedDot(w) => Some(w.iter().map(|&x| i128::from(x) * i128::from(x)).sum::<i128>()),
        _ => None,
    });
    for (p, delta) in workload.streams.delta_stream.deltas.iter().enumerate() {
        let phase = u32::try_from(p).unwrap_or(u32::MAX);
        session.ingest_bytes(delta, phase)?;
        check(&session, &mut queries, &truth[p + 1])?;
        if let Some(w_norm_sq) = w_norm_sq {
            cos2_ok &= cos2_matches(&session, &queries, w_norm_sq, &truth[p + 1])?;
        }
    }

    for q in &queries {
        report.push_flag(format!("{}_ok", q.label), q.ok);
    }
    for q in &queries {
        match session.value(q.id)? {
            AggregateValue::Scalar(v) => {
                report.push_wide(format!("{}_final", q.label), v);
            }
            AggregateValue::TopK(top) => {
                let rendered: Vec<String> =
                    top.iter().map(|r| format!("{}:{}", r.idx, r.value)).collect();
                report.push_str(format!("{}_final", q.label), rendered.join(","));
            }
        }
    }
    if let Some(w_norm_sq) = w_norm_sq {
        let (dot, norm) = (scalar(&session, &queries[0])?, scalar(&session, &queries[1])?);
        let (num, den) = cosine_sq_parts(dot, norm, w_norm_sq).unwrap_or((0, 0));
        report
            .push_wide("cos2_num", num)
            .push_wide("cos2_den", den)
            .push_flag("cos2_stable_ok", cos2_ok);
    }
    push_final_state(report, &session, &truth)
}

fn scalar(session: &StreamSession, q: &Query) -> Result<i128> {
    Ok(session.value(q.id)?.as_scalar().unwrap_or_default())
}

/// cos² parts from the live aggregates equal those recomputed from the snapshot.
fn cos2_matches(
    session: &StreamSession,
    queries: &[Query],
    w_norm_sq: i128,
    state: &[i64],
) -> Result<bool> {
    let live = cosine_sq_parts(
        scalar(session, &queries[0])?,
        scalar(session, &queries[1])?,
        w_norm_sq,
    );
    let naive = |q: &Query| -> Result<i128> {
        Ok(naive_value(&q.kind, &q.scope, state)?.as_scalar().unwrap_or_default())
    };
    let recomputed = cosine_sq_parts(naive(&queries[0])?, naive(&queries[1])?, w_norm_sq);
    Ok(live.is_some() && live == recomputed)
}

fn push_final_state(report: &mut LockReport, session: &StreamSession, truth: &[Vec<i64>]) -> Result<()> {
    let last = truth.last().map(Vec::as_slice).unwrap_or_default();
    report.push_flag("final_state_ok", session.state_vector() == Some(last));
    report.push_str("final_state_sha256", session.final_state_sha256()?);
    Ok(())
}

fn run_canonical(
    spec: &ScenarioSpec,
    workload: &VectorWorkload,
    rng: &mut Xorshift64,
    config: &CodecConfig,
    report: &mut LockReport,
) -> Result<()> {
    let stream = &workload.streams.delta_stream;
    let mut idempotent = true;
    let mut stable = true;
    let mut shuffled = Stream::new(stream.template.clone());
    for (delta, bytes) in workload.deltas.iter().zip(&stream.deltas) {
        idempotent &= recanon(bytes)? == *bytes;
        let mut ops: Vec<PointEdit> = delta.ops().to_vec();
        rng.shuffle(&mut ops);
        let again = encode_point_edits(&ops, config)?;
        stable &= again == *bytes;
        shuffled.push_delta(again);
    }

    let truth = snapshots(workload)?;
    let mut digests = Vec::new();
    for wrapped in [stream.to_bytes()?, shuffled.to_bytes()?, shuffled.to_gzip()?] {
        let mut reader = StreamReader::from_wrapped(&wrapped, config.max_frame_len)?;
        let mut session =
            StreamSession::from_reader(&mut reader, scenario_key(spec.seed), config.clone(), SCHEMA_VER)?;
        session.replay(&mut reader)?;
        let last = truth.last().map(Vec::as_slice).unwrap_or_default();
        digests.push((session.final_state_sha256()?, session.state_vector() == Some(last)));
    }
    let replay_ok = digests.iter().all(|(d, matches)| *matches && *d == digests[0].0);

    report
        .push_flag("canon_idempotent_ok", idempotent)
        .push_flag("canon_stable_ok", stable)
        .push_flag("replay_ok", replay_ok)
        .push_str("final_state_sha256", digests[0].0.as_str());
    Ok(())
}

fn run_chain(
    spec: &ScenarioSpec,
    rng: &mut Xorshift64,
    config: &CodecConfig,
    report: &mut LockReport,
) -> Result<()> {
    report
        .push_str("n_agents", "n/a")
        .push_count("k_updates", spec.k_updates)
        .push_count("m_edits_per_update", spec.m_edits_per_update)
        .push_count("depth", spec.depth)
        .push_count("headers", spec.headers);
    let workload = tree_workload(
        rng,
        spec.depth,
        spec.headers,
        spec.k_updates,
        spec.m_edits_per_update,
        spec.value_range,
        config,
    )?;
    push_sizes(report, &workload.streams, spec.min_raw_ratio)?;

    let key = scenario_key(spec.seed);
    let stream = &workload.streams.delta_stream;
    let mut reader = StreamReader::from_wrapped(&stream.to_gzip()?, config.max_frame_len)?;
    let mut session = StreamSession::from_reader(&mut reader, key.clone(), config.clone(), SCHEMA_VER)?;
    session.replay(&mut reader)?;
    let replay_ok = session.state_value() == workload.final_state;
    let verify_ok = session.verify();

    let template = stream.template.as_slice();
    let deltas = session.delta_bytes().to_vec();
    let receipts = session.chain().to_bytes();

    let mut receipt_tamper_ok = !receipts.is_empty();
    for _ in 0..TAMPER_TRIALS {
        if receipts.is_empty() {
            break;
        }
        let mut bad = receipts.clone();
        let pos = rng.below(bad.len() as u64) as usize;
        bad[pos] ^= 1 << rng.below(8);
        receipt_tamper_ok &= !verify_chain_bytes(template, &deltas, &bad, &key);
    }

    let mut delta_tamper_ok = !deltas.is_empty();
    for _ in 0..TAMPER_TRIALS {
        if deltas.is_empty() {
            break;
        }
        let mut bad = deltas.clone();
        let which = rng.below(bad.len() as u64) as usize;
        let pos = rng.below(bad[which].len() as u64) as usize;
        bad[which][pos] ^= 1 << rng.below(8);
        delta_tamper_ok &= !verify_chain_bytes(template, &bad, &receipts, &key);
    }

    report
        .push_count("receipts", receipts.len() / RECEIPT_LEN)
        .push_str("chain_head", hex::encode(session.chain().head()))
        .push_flag("replay_ok", replay_ok)
        .push_flag("verify_ok", verify_ok)
        .push_flag("tamper_receipts_ok", receipt_tamper_ok)
        .push_flag("tamper_deltas_ok", delta_tamper_ok)
        .push_str("final_state_sha256", session.final_state_sha256()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(kind: ScenarioKind) -> ScenarioSpec {
        ScenarioSpec {
            name: "small".into(),
            seed: 11,
            n_agents: 96,
            k_updates: 40,
            m_edits_per_update: 2,
            depth: 2,
            headers: 3,
            value_range: 50,
            min_raw_ratio: None,
            kind,
        }
    }

    #[test]
    fn test_builtin_table() {
        let specs = builtin_scenarios();
        assert_eq!(specs.len(), 6);
        assert_eq!(specs[0].seed, 30030);
        assert_eq!(specs[5].k_updates, 512);
        assert_eq!(specs[5].m_edits_per_update, 3);
        assert!(specs[..5].iter().all(|s| s.n_agents == 4096 && s.k_updates == 1024));
    }

    #[test]
    fn test_small_scenarios_pass() {
        for kind in [
            ScenarioKind::Sum { q_sizes: vec![1, 8, 64] },
            ScenarioKind::TopK { q_sizes: vec![8, 64], ks: vec![1, 5] },
            ScenarioKind::RangeSum { windows: vec![(0, 0), (10, 50), (80, 95)] },
            ScenarioKind::DotNorm,
            ScenarioKind::Canonical,
            ScenarioKind::ReceiptChain,
        ] {
            let outcome = run_scenario(&small(kind.clone())).unwrap();
            assert!(
                outcome.passed(),
                "{kind:?} failed: {:?}",
                outcome.report.failed_flags()
            );
        }
    }

    #[test]
    fn test_raw_ratio_flag() {
        let spec = ScenarioSpec {
            min_raw_ratio: Some(2),
            ..small(ScenarioKind::Sum { q_sizes: vec![8] })
        };
        let report = run_scenario(&spec).unwrap().report;
        assert_eq!(report.get("raw_ratio_ok"), Some(&crate::Value::Str("true".into())));

        let spec = ScenarioSpec {
            min_raw_ratio: Some(1_000_000),
            ..spec
        };
        assert!(!run_scenario(&spec).unwrap().passed());
    }

    #[test]
    fn test_reports_are_deterministic() {
        let spec = small(ScenarioKind::TopK { q_sizes: vec![16], ks: vec![3] });
        let a = run_scenario(&spec).unwrap().report.render().unwrap();
        let b = run_scenario(&spec).unwrap().report.render().unwrap();
        assert_eq!(a, b);
        let other = ScenarioSpec { seed: 12, ..spec };
        assert_ne!(run_scenario(&other).unwrap().report.render().unwrap(), a);
    }

    #[test]
    fn test_field_order() {
        let report = run_scenario(&small(ScenarioKind::Sum { q_sizes: vec![4] }))
            .unwrap()
            .report;
        let keys: Vec<&str> = report.fields().map(|(k, _)| k).collect();
        assert_eq!(
            &keys[..11],
            &[
                "scenario",
                "seed",
                "n_agents",
                "k_updates",
                "m_edits_per_update",
                "raw_snapshot_stream",
                "raw_delta_stream",
                "gz_snapshot_stream",
                "gz_delta_stream",
                "raw_ratio",
                "gz_ratio"
            ]
        );
        assert_eq!(keys.last(), Some(&"final_state_sha256"));
    }

    #[test]
    fn test_scenario_deserializes_from_json() {
        let json = r#"{"name":"x","seed":1,"n_agents":8,"k_updates":2,"m_edits_per_update":1,
                       "kind":"range_sum","windows":[[0,3]]}"#;
        let spec: ScenarioSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.value_range, 1000);
        assert_eq!(spec.kind, ScenarioKind::RangeSum { windows: vec![(0, 3)] });
    }
}
