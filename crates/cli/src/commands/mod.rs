pub mod links;
pub mod open;

use std::path::Path;

use anyhow::{Context, Result};
use branch::BranchConfig;
use serde::Serialize;
use tracing::debug;

use crate::cli::{Cli, Commands};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config = load_config(cli.config.as_deref())?;
	match cli.command {
		Commands::Open { url, via, legacy, show_network } => print_json(&open::execute(config, &url, via, legacy, show_network).await?),
		Commands::Simulate { url } => print_json(&links::simulate(&config, &url).await?),
		Commands::Links => print_json(&links::list(&config)),
	}
}

/// Loads `path`, or the defaults plus environment overrides when absent.
pub fn load_config(path: Option<&Path>) -> Result<BranchConfig> {
	match path {
		Some(path) => BranchConfig::load(path).with_context(|| format!("failed to load config from {}", path.display())),
		None => {
			debug!(target = "branch.cli", "no config file; using defaults");
			Ok(BranchConfig::default().with_env_overrides(|key| std::env::var(key).ok()))
		}
	}
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}
