//! Show the effective divisor table — `composite divisors`.

use anyhow::{Context, Result};

use composite::config::CompositeConfig;

pub fn cmd_divisors(config: &CompositeConfig, json: bool) -> Result<()> {
    let divisors = config.divisors()?;

    if json {
        println!(
            "{}",
            serde_json::to_string(&divisors).context("Failed to serialize divisors")?
        );
        return Ok(());
    }

    println!();
    println!("{:<8} Divisor", "Round");
    println!("{:<8} -------", "-----");
    for (round, divisor) in divisors.values().iter().enumerate() {
        if *divisor == 0 {
            println!("{:<8} {} {}", round, divisor, console::style("(stop)").dim());
        } else {
            println!("{:<8} {}", round, divisor);
        }
    }
    println!();

    Ok(())
}
