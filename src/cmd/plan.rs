//! Dry-run a reduction — `composite plan`.

use anyhow::{Context, Result};

use composite::config::CompositeConfig;
use composite::{Round, TokenId, plan};

pub fn cmd_plan(config: &CompositeConfig, tokens: &[TokenId], round: Round, json: bool) -> Result<()> {
    let divisors = config.divisors()?;
    let plan = plan(tokens, round, &divisors).context("Cannot plan reduction")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?
        );
        return Ok(());
    }

    println!();
    println!("{:<8} {:<8} {:<30} Burn", "Round", "Divisor", "Keep");
    println!("{:<8} {:<8} {:<30} ----", "-----", "-------", "----");
    for step in &plan.rounds {
        println!(
            "{:<8} {:<8} {:<30} {:?}",
            step.round,
            step.divisor,
            format!("{:?}", step.keep),
            step.burn
        );
    }
    println!();
    println!(
        "Survivor {} at divisor {} after {} rounds",
        console::style(plan.survivor).green().bold(),
        plan.terminal_divisor,
        plan.rounds.len()
    );
    println!();

    Ok(())
}
