//! Engine configuration loaded from a camelCase JSON file.
//!
//! ```json
//! {
//!   "useModernSessionManager": true,
//!   "resolveTimeoutMs": 5000,
//!   "networkLogging": true,
//!   "simulator": {
//!     "enabled": true,
//!     "links": {
//!       "https://example.app.link/summer": { "campaign": "summer_sale", "delayMs": 100 }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::integration::FeatureFlags;
use crate::simulator::{BranchLinkSimulator, SimulatedLink};

/// Environment variable overriding `useModernSessionManager`.
pub const MODERN_SESSION_MANAGER_ENV: &str = "BRANCH_USE_MODERN_SESSION_MANAGER";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BranchConfig {
	pub use_modern_session_manager: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resolve_timeout_ms: Option<u64>,
	pub network_logging: bool,
	pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatorConfig {
	pub enabled: bool,
	pub links: BTreeMap<String, SimulatedLink>,
}

impl BranchConfig {
	/// Reads `path` and applies environment overrides.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let config = Self::from_json(&text)?.with_env_overrides(|key| std::env::var(key).ok());
		debug!(target = "branch.coordinator", path = %path.display(), links = config.simulator.links.len(), "config loaded");
		Ok(config)
	}

	/// Parses and validates a JSON document. No environment overrides.
	pub fn from_json(text: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	/// Applies overrides looked up through `var`.
	pub fn with_env_overrides<F>(mut self, var: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(value) = var(MODERN_SESSION_MANAGER_ENV) {
			self.use_modern_session_manager = matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
		}
		self
	}

	pub fn resolve_timeout(&self) -> Option<Duration> {
		self.resolve_timeout_ms.map(Duration::from_millis)
	}

	pub fn feature_flags(&self) -> FeatureFlags {
		FeatureFlags {
			use_modern_session_manager: self.use_modern_session_manager,
		}
	}

	/// Applies the simulator and network logging settings to `simulator`.
	pub fn configure(&self, simulator: &BranchLinkSimulator) {
		for (url, link) in &self.simulator.links {
			simulator.register_link(url.clone(), link.clone());
		}
		if self.simulator.enabled {
			simulator.enable();
		}
		if self.network_logging {
			simulator.enable_network_logging();
		}
	}

	fn validate(&self) -> Result<()> {
		for url in self.simulator.links.keys() {
			url::Url::parse(url).map_err(|_| ConfigError::InvalidLink(url.clone()))?;
		}
		Ok(())
	}
}
