//! `swb config`: inspect and validate configuration files.

use crate::config::{SwitchboardConfig, search_paths};
use anyhow::Context;
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Validate a configuration file
    Check {
        /// File to check
        path: PathBuf,
    },
}

pub fn execute(config: &SwitchboardConfig, source: Option<&Path>, command: ConfigCommand) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            match source {
                Some(path) => println!("# loaded from {}", path.display()),
                None => {
                    let searched: Vec<String> = search_paths().iter().map(|p| p.display().to_string()).collect();
                    println!("# built-in defaults (searched {})", searched.join(", "));
                }
            }
            print!("{}", toml::to_string_pretty(config).context("failed to render configuration")?);
            Ok(())
        }
        ConfigCommand::Check { path } => {
            let checked = SwitchboardConfig::load_from_file(&path)
                .with_context(|| format!("{} is not a valid configuration", path.display()))?;
            println!(
                "{} {} ({} backends, strategy {})",
                "✓".green(),
                path.display(),
                checked.backends.len(),
                checked.router.default_strategy
            );
            Ok(())
        }
    }
}
