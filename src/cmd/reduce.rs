//! Run a reduction against an in-memory registry — `composite reduce`.

use anyhow::{Context, Result};
use serde::Serialize;

use composite::config::CompositeConfig;
use composite::registry::MergeBatch;
use composite::{
    Divisor, FileSnapshot, InMemoryRegistry, NoopSnapshot, ReduceOptions, Reducer, Round,
    Snapshot, TokenId,
};

#[derive(Debug, Serialize)]
struct ReduceReport {
    survivor: TokenId,
    terminal_divisor: Divisor,
    rounds: usize,
    batches: Vec<MergeBatch>,
    live_tokens: Vec<TokenId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_dir: Option<String>,
}

pub async fn cmd_reduce(
    config: &CompositeConfig,
    tokens: &[TokenId],
    round: Round,
    snapshot: bool,
    json: bool,
) -> Result<()> {
    let divisors = config.divisors()?;
    let registry = InMemoryRegistry::with_tokens(config.actor(), tokens);

    let snapshot_dir = snapshot.then(|| config.snapshot_dir());
    let sink: Box<dyn Snapshot> = match &snapshot_dir {
        Some(dir) => Box::new(FileSnapshot::new(dir)),
        None => Box::new(NoopSnapshot),
    };

    let reducer = Reducer::new(&registry, &*sink, &divisors);
    let options = ReduceOptions::starting_at(round).with_snapshot(snapshot);
    let reduction = reducer
        .reduce(tokens, options)
        .await
        .context("Reduction did not complete")?;

    let report = ReduceReport {
        survivor: reduction.survivor,
        terminal_divisor: reduction.terminal_divisor,
        rounds: reduction.rounds,
        batches: registry.batches().await,
        live_tokens: registry.live_tokens().await,
        snapshot_dir: snapshot_dir.map(|dir| dir.display().to_string()),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
        return Ok(());
    }

    println!();
    for (index, batch) in report.batches.iter().enumerate() {
        println!(
            "  {} keep {:?} burn {:?}",
            console::style(format!("Round {}", round + index)).dim(),
            batch.keep,
            batch.burn
        );
    }
    println!();
    println!("Survivor: {}", console::style(report.survivor).green().bold());
    println!("Terminal divisor: {}", report.terminal_divisor);
    println!("Rounds: {}", report.rounds);
    println!("Live tokens: {:?}", report.live_tokens);
    if let Some(dir) = &report.snapshot_dir {
        println!("Snapshots written to: {}", dir);
    }
    println!();

    Ok(())
}
