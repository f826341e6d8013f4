use anyhow::{Context, Result};
use branch::integration::params_from_session;
use branch::{BranchConfig, BranchLinkSimulator, SimulatedLink};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkListing {
	pub enabled: bool,
	pub links: Vec<LinkEntry>,
}

#[derive(Debug, Serialize)]
pub struct LinkEntry {
	pub url: String,
	#[serde(flatten)]
	pub link: SimulatedLink,
}

pub fn list(config: &BranchConfig) -> LinkListing {
	let simulator = simulator(config);
	let links = simulator
		.registered_links()
		.into_iter()
		.filter_map(|url| simulator.link(&url).map(|link| LinkEntry { url, link }))
		.collect();
	LinkListing {
		enabled: simulator.is_enabled(),
		links,
	}
}

/// Opens `url` on the simulator alone, bypassing the session engine.
pub async fn simulate(config: &BranchConfig, url: &str) -> Result<Map<String, Value>> {
	let session = simulator(config).simulate_open(url).await.with_context(|| format!("cannot simulate {url}"))?;
	Ok(params_from_session(&session))
}

fn simulator(config: &BranchConfig) -> BranchLinkSimulator {
	let simulator = BranchLinkSimulator::new();
	config.configure(&simulator);
	simulator
}

#[cfg(test)]
mod tests {
	use super::*;

	const CONFIG: &str = r#"{
		"simulator": {
			"enabled": true,
			"links": {
				"https://example.app.link/b": { "campaign": "second" },
				"https://example.app.link/a": { "campaign": "first" }
			}
		}
	}"#;

	#[test]
	fn lists_registered_links_sorted() {
		let listing = list(&BranchConfig::from_json(CONFIG).unwrap());
		assert!(listing.enabled);
		let urls: Vec<_> = listing.links.iter().map(|entry| entry.url.as_str()).collect();
		assert_eq!(urls, vec!["https://example.app.link/a", "https://example.app.link/b"]);
		assert_eq!(listing.links[0].link.campaign.as_deref(), Some("first"));
	}

	#[tokio::test]
	async fn simulate_reports_unregistered_link() {
		let config = BranchConfig::from_json(CONFIG).unwrap();
		let params = simulate(&config, "https://example.app.link/a").await.unwrap();
		assert_eq!(params["~campaign"], "first");

		let err = simulate(&config, "https://example.app.link/missing").await.unwrap_err();
		assert!(format!("{err:#}").contains("not registered"));
	}
}
