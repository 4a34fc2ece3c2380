use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use wirepack::lock::workload::vector_workload;
use wirepack::lock::Xorshift64;
use wirepack::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "wirepack-out".into()));
    let seed: u64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(30030);
    let n_agents: usize = args.next().map(|s| s.parse()).transpose()?.unwrap_or(4096);
    let k_updates: usize = args.next().map(|s| s.parse()).transpose()?.unwrap_or(1024);

    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    println!("Packing stream: seed={seed} n_agents={n_agents} k_updates={k_updates}");

    let cfg = CodecConfig::default();
    let workload = vector_workload(&mut Xorshift64::new(seed), n_agents, k_updates, 1, 1000, &cfg)?;
    let stream = &workload.streams.delta_stream;

    let template = Arc::new(Template::from_frame(&stream.template, SCHEMA_VER)?);
    let key = ChainKey::generate();
    let mut session = StreamSession::new(template, key.clone(), cfg);
    let receipts_path = out_dir.join("receipts.bin");
    match fs::remove_file(&receipts_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("removing {}", receipts_path.display())),
    }
    let mut log = ReceiptLog::open(&receipts_path)?;
    for (phase, delta) in stream.deltas.iter().enumerate() {
        let receipt = session.ingest_bytes(delta, phase as u32)?;
        log.append(receipt)?;
    }
    log.sync()?;

    let raw = stream.to_bytes()?;
    let gz = stream.to_gzip()?;
    fs::write(out_dir.join("stream.wp.gz"), &gz)?;
    fs::write(out_dir.join("key.hex"), hex::encode(key.as_bytes()))?;

    println!("  snapshot stream: {} bytes", workload.streams.snapshot_stream.len());
    println!("  delta stream:    {} bytes raw, {} bytes gzip", raw.len(), gz.len());
    println!("  receipts:        {} ({} bytes)", log.len(), log.len() * receipt::RECEIPT_LEN as u64);
    println!("  chain head:      {}", hex::encode(session.chain().head()));
    println!("  final state:     {}", session.final_state_sha256()?);
    println!("Wrote {}", out_dir.display());
    Ok(())
}
