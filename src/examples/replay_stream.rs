use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;
use wirepack::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "wirepack-out".into()));
    let bytes = fs::read(dir.join("stream.wp.gz"))
        .with_context(|| format!("reading stream from {}", dir.display()))?;
    let key = ChainKey::from_bytes(&hex::decode(fs::read_to_string(dir.join("key.hex"))?.trim())?);
    let stored = ReceiptLog::open(dir.join("receipts.bin"))?.read_all()?;

    let cfg = CodecConfig::default();
    let mut reader = StreamReader::from_wrapped(&bytes, cfg.max_frame_len)?;
    let mut session = StreamSession::from_reader(&mut reader, key.clone(), cfg, SCHEMA_VER)?;
    println!("Template {}", hex::encode(session.template().hash()));

    let sum = session.declare(AggregateKind::Sum, QueryScope::Global)?;
    let norm = session.declare(AggregateKind::NormSq, QueryScope::Global)?;
    let top = session.declare(AggregateKind::TopK(5), QueryScope::Global)?;
    let n = session.state_vector().map_or(0, <[i64]>::len);
    let head = session.declare(AggregateKind::RangeSum, QueryScope::range(0, n.min(64).saturating_sub(1)))?;

    let consumed = session.replay(&mut reader)?;
    println!("Replayed {consumed} deltas");
    println!("  sum:        {}", session.value(sum)?);
    println!("  norm_sq:    {}", session.value(norm)?);
    println!("  top5:       {}", session.value(top)?);
    println!("  range head: {}", session.value(head)?);
    println!("  final:      {}", session.final_state_sha256()?);

    let recomputed = session.chain().to_bytes();
    let stored_bytes: Vec<u8> = stored.iter().flat_map(Receipt::to_bytes).collect();
    let ok = verify_chain_bytes(
        session.template().canonical_bytes(),
        session.delta_bytes(),
        &stored_bytes,
        &key,
    );
    println!("  stored receipts verify: {ok}");
    if !ok || recomputed != stored_bytes {
        bail!("receipt chain does not match stream");
    }
    Ok(())
}
