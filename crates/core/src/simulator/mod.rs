//! Local deep-link simulation for development and tests.
//!
//! [`BranchLinkSimulator`] keeps a registry of URLs and the link data they
//! should resolve to. While enabled, opening a registered URL produces a
//! session without any network activity. Sessions built here carry the
//! `simulated-` id prefix so downstream code can tell them apart.
//!
//! Network logging is independent of simulation: it records resolver traffic
//! whether or not the simulator is enabled.

mod network_log;
mod offline;
mod resolver;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use branch_protocol::{LinkData, SIMULATED_ID_PREFIX, Session, SessionData, keys};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

pub use network_log::{NetworkLog, NetworkLogEntry};
pub use offline::OfflineResolver;
pub use resolver::SimulatingResolver;

use crate::error::SimulatorError;

/// Link data a registered URL resolves to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatedLink {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub campaign: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub channel: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub feature: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stage: Option<String>,
	pub tags: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub match_type: Option<String>,
	pub params: Map<String, Value>,
	/// Artificial latency before the simulated open completes.
	pub delay_ms: u64,
}

impl SimulatedLink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
		self.campaign = Some(campaign.into());
		self
	}

	pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
		self.channel = Some(channel.into());
		self
	}

	pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
		self.feature = Some(feature.into());
		self
	}

	pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
		self.stage = Some(stage.into());
		self
	}

	pub fn with_tags<I, S>(mut self, tags: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.tags = tags.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_match_type(mut self, match_type: impl Into<String>) -> Self {
		self.match_type = Some(match_type.into());
		self
	}

	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.params.insert(key.into(), value.into());
		self
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
		self
	}

	pub fn delay(&self) -> Duration {
		Duration::from_millis(self.delay_ms)
	}

	/// Builds the link data a click on `url` yields.
	pub fn link_data(&self, url: &str) -> LinkData {
		let mut parameters = self.params.clone();
		let mut reserved = |key: &str, value: &Option<String>| {
			if let Some(value) = value {
				parameters.insert(key.to_string(), Value::from(value.as_str()));
			}
		};
		reserved(keys::CAMPAIGN, &self.campaign);
		reserved(keys::CHANNEL, &self.channel);
		reserved(keys::FEATURE, &self.feature);
		reserved(keys::STAGE, &self.stage);
		reserved(keys::MATCH_TYPE, &self.match_type);
		if !self.tags.is_empty() {
			parameters.insert(keys::TAGS.to_string(), Value::from(self.tags.clone()));
		}

		let mut data = clicked(url, parameters);
		data.campaign = self.campaign.clone();
		data.channel = self.channel.clone();
		data.feature = self.feature.clone();
		data.stage = self.stage.clone();
		data.tags = self.tags.clone();
		data
	}
}

/// Link data for a URL the simulator has no registration for.
fn unregistered_link_data(url: &str) -> LinkData {
	clicked(url, Map::new())
}

fn clicked(url: &str, mut parameters: Map<String, Value>) -> LinkData {
	parameters.insert(keys::CLICKED_BRANCH_LINK.to_string(), Value::Bool(true));
	parameters.insert(keys::REFERRING_LINK.to_string(), Value::from(url));
	LinkData {
		url: Some(url.to_string()),
		is_clicked: true,
		referring_link: Some(url.to_string()),
		raw_data: parameters.clone(),
		parameters,
		simulated: true,
		..Default::default()
	}
}

/// Registry-backed link simulator with network logging.
///
/// Share it behind an [`Arc`]; every method takes `&self`.
#[derive(Debug, Default)]
pub struct BranchLinkSimulator {
	enabled: AtomicBool,
	links: parking_lot::RwLock<HashMap<String, SimulatedLink>>,
	opens: AtomicUsize,
	network: NetworkLog,
}

impl BranchLinkSimulator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn enable(&self) {
		self.enabled.store(true, Ordering::SeqCst);
		info!(target = "branch.simulator", "link simulator enabled");
	}

	pub fn disable(&self) {
		self.enabled.store(false, Ordering::SeqCst);
		info!(target = "branch.simulator", "link simulator disabled");
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled.load(Ordering::SeqCst)
	}

	/// Registers `url`, replacing any previous registration.
	pub fn register_link(&self, url: impl Into<String>, link: SimulatedLink) {
		let url = url.into();
		debug!(target = "branch.simulator", %url, "link registered");
		self.links.write().insert(url, link);
	}

	/// Returns the removed registration, if any.
	pub fn unregister_link(&self, url: &str) -> Option<SimulatedLink> {
		self.links.write().remove(url)
	}

	pub fn clear_links(&self) {
		self.links.write().clear();
	}

	/// Registered URLs, sorted.
	pub fn registered_links(&self) -> Vec<String> {
		let mut urls: Vec<_> = self.links.read().keys().cloned().collect();
		urls.sort();
		urls
	}

	pub fn link(&self, url: &str) -> Option<SimulatedLink> {
		self.links.read().get(url).cloned()
	}

	pub fn should_simulate_link(&self, url: &str) -> bool {
		self.is_enabled() && self.links.read().contains_key(url)
	}

	/// Builds a simulated session for `url` without consulting the enabled
	/// flag. Unregistered URLs get only the click markers.
	pub fn build_simulated_session(&self, url: &str, is_first_session: bool) -> Session {
		let link_data = self.simulated_link_data(url);
		Session::new(
			format!("{SIMULATED_ID_PREFIX}{}", Uuid::new_v4()),
			format!("{SIMULATED_ID_PREFIX}identity"),
			format!("{SIMULATED_ID_PREFIX}fingerprint"),
			is_first_session,
		)
		.with_link_data(link_data)
	}

	/// Simulates opening `url`, waiting out the registered delay.
	pub async fn simulate_open(&self, url: &str) -> Result<Session, SimulatorError> {
		let link = self.checked_link(url)?;
		wait(link.delay()).await;
		let session = self.build_simulated_session(url, self.next_is_first());
		info!(target = "branch.simulator", session_id = %session.id, %url, "simulated open");
		Ok(session)
	}

	/// Callback form of [`simulate_open`](Self::simulate_open). Must be called
	/// within a tokio runtime; `completion` runs on a runtime worker.
	pub fn simulate_open_with<F>(self: &Arc<Self>, url: impl Into<String>, completion: F)
	where
		F: FnOnce(Result<Session, SimulatorError>) + Send + 'static,
	{
		let simulator = Arc::clone(self);
		let url = url.into();
		tokio::spawn(async move {
			completion(simulator.simulate_open(&url).await);
		});
	}

	/// Resolver-shaped simulation: yields [`SessionData`] marked as simulated.
	pub async fn resolve_simulated(&self, url: &str) -> Result<SessionData, SimulatorError> {
		let link = self.checked_link(url)?;
		wait(link.delay()).await;
		Ok(SessionData::new(format!("{SIMULATED_ID_PREFIX}identity"), format!("{SIMULATED_ID_PREFIX}fingerprint"), self.next_is_first())
			.with_link_data(link.link_data(url))
			.simulated())
	}

	pub fn network_log(&self) -> &NetworkLog {
		&self.network
	}

	pub fn enable_network_logging(&self) {
		self.network.enable();
	}

	pub fn disable_network_logging(&self) {
		self.network.disable();
	}

	pub fn is_network_logging_enabled(&self) -> bool {
		self.network.is_enabled()
	}

	pub fn clear_network_logs(&self) {
		self.network.clear();
	}

	pub fn network_logs(&self) -> Vec<NetworkLogEntry> {
		self.network.entries()
	}

	pub fn record_network_request(
		&self,
		url: impl Into<String>,
		request_body: Option<Value>,
		response_body: Option<Value>,
		status_code: Option<u16>,
		error: Option<String>,
	) -> Option<Uuid> {
		self.network.record(url, request_body, response_body, status_code, error)
	}

	fn simulated_link_data(&self, url: &str) -> LinkData {
		match self.links.read().get(url) {
			Some(link) => link.link_data(url),
			None => unregistered_link_data(url),
		}
	}

	fn checked_link(&self, url: &str) -> Result<SimulatedLink, SimulatorError> {
		if !self.is_enabled() {
			return Err(SimulatorError::NotEnabled);
		}
		self.link(url).ok_or_else(|| SimulatorError::LinkNotRegistered(url.to_string()))
	}

	fn next_is_first(&self) -> bool {
		self.opens.fetch_add(1, Ordering::SeqCst) == 0
	}
}

async fn wait(delay: Duration) {
	if !delay.is_zero() {
		tokio::time::sleep(delay).await;
	}
}
