//! Configuration view and validation commands — `composite config`.

use anyhow::{Context, Result};

use composite::config::{CompositeConfig, CompositeToml, config_dir, config_path};

use super::super::ConfigCommands;

pub fn cmd_config(config: &CompositeConfig, command: Option<ConfigCommands>) -> Result<()> {
    let path = config_path(&config.project_dir);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Composite Configuration");
            println!("=======================");
            println!();

            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("No composite.toml found at {}", path.display());
                println!("Using default configuration:");
            }
            println!();

            let toml = &config.toml;
            println!("[divisors]");
            println!("  values = {:?}", toml.divisors.values);
            println!();
            println!("[snapshot]");
            println!("  enabled = {}", toml.snapshot.enabled);
            println!("  dir = \"{}\"", toml.snapshot.dir);
            println!();
            println!("[registry]");
            println!("  actor = \"{}\"", toml.registry.actor);
            println!();
            println!("[logging]");
            println!("  level = \"{}\"", toml.logging.level);
            println!("  json = {}", toml.logging.json);
            if let Some(dir) = &toml.logging.dir {
                println!("  dir = \"{}\"", dir);
            }
            println!();

            println!("Effective values (with env/CLI overrides):");
            match config.divisors() {
                Ok(table) => println!("  divisors = {}", table),
                Err(e) => println!("  divisors = {} ({})", console::style("invalid").red(), e),
            }
            println!("  snapshot_dir = \"{}\"", config.snapshot_dir().display());
            println!("  actor = \"{}\"", config.actor());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            if !path.exists() {
                println!("No composite.toml found at {}", path.display());
                println!("Using default configuration (valid).");
                return Ok(());
            }

            let toml = CompositeToml::load(&path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("{} Configuration is valid", console::style("✓").green());
            } else {
                println!("{} Configuration has warnings:", console::style("!").yellow());
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init) => {
            if path.exists() {
                println!("composite.toml already exists at {}", path.display());
                return Ok(());
            }

            let dir = config_dir(&config.project_dir);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            CompositeToml::default().save(&path)?;
            println!("Created {}", path.display());
        }
    }

    Ok(())
}
