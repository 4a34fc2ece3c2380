use std::path::PathBuf;

use anyhow::bail;
use tracing_subscriber::EnvFilter;
use wirepack::lock::{builtin_scenarios, run_scenario, LockBook, LockStatus};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // lock_scenarios [--bless] [lock-book path]
    let mut bless = false;
    let mut book_path = PathBuf::from("tests/wirepack.lock");
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--bless" => bless = true,
            other => book_path = PathBuf::from(other),
        }
    }
    let mut book = if book_path.exists() {
        LockBook::load(&book_path)?
    } else {
        LockBook::new()
    };

    let mut failures = 0;
    for spec in builtin_scenarios() {
        let outcome = run_scenario(&spec)?;
        print!("{}", outcome.report.render()?);
        let drift = outcome.report.drift_sha256()?;
        if !outcome.passed() {
            println!("# FAIL {}: {:?}", spec.name, outcome.report.failed_flags());
            failures += 1;
        }
        match book.check(&spec.name, &drift) {
            LockStatus::Match => println!("# lock {}: match", spec.name),
            LockStatus::Unlocked => println!("# lock {}: unlocked", spec.name),
            LockStatus::Mismatch { expected, .. } => {
                println!("# lock {}: DRIFT (locked {expected})", spec.name);
                if !bless {
                    failures += 1;
                }
            }
        }
        if bless {
            book.insert(spec.name.clone(), drift);
        }
        println!();
    }

    if bless {
        book.save(&book_path)?;
        println!("Blessed {} locks into {}", book.len(), book_path.display());
    }
    if failures > 0 {
        bail!("{failures} scenario check(s) failed");
    }
    Ok(())
}
