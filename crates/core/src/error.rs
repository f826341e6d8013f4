use std::path::PathBuf;

use thiserror::Error;

/// Error domain reported by [`SimulatorError::domain`].
pub const SIMULATOR_ERROR_DOMAIN: &str = "io.branch.linksimulator";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulatorError {
	#[error("link simulator is not enabled")]
	NotEnabled,

	#[error("link is not registered with the simulator: {0}")]
	LinkNotRegistered(String),
}

impl SimulatorError {
	pub fn domain(&self) -> &'static str {
		SIMULATOR_ERROR_DOMAIN
	}

	pub fn code(&self) -> i32 {
		match self {
			Self::NotEnabled => 1,
			Self::LinkNotRegistered(_) => 2,
		}
	}
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config: {0}")]
	Parse(#[from] serde_json::Error),

	#[error("invalid simulated link url: {0}")]
	InvalidLink(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
