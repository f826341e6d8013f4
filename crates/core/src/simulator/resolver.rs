use std::sync::Arc;

use async_trait::async_trait;
use branch_protocol::{InitializationOptions, SessionData};
use branch_runtime::{BranchError, Result, SessionResolver};
use tracing::debug;

use super::BranchLinkSimulator;

/// URL recorded in the network log for resolutions without a link.
const OPEN_ENDPOINT: &str = "branch://open";

/// Resolver that answers registered links from the simulator and delegates
/// everything else to `inner`.
///
/// Every resolution, simulated or not, is recorded in the simulator's network
/// log while logging is enabled.
pub struct SimulatingResolver<R> {
	simulator: Arc<BranchLinkSimulator>,
	inner: R,
}

impl<R> SimulatingResolver<R> {
	pub fn new(simulator: Arc<BranchLinkSimulator>, inner: R) -> Self {
		Self { simulator, inner }
	}

	pub fn simulator(&self) -> &Arc<BranchLinkSimulator> {
		&self.simulator
	}
}

#[async_trait]
impl<R> SessionResolver for SimulatingResolver<R>
where
	R: SessionResolver,
{
	async fn resolve(&self, options: &InitializationOptions) -> Result<SessionData> {
		let simulated = match options.url.as_deref() {
			Some(url) => match self.simulator.resolve_simulated(url).await {
				Ok(data) => {
					debug!(target = "branch.simulator", %url, "resolved from simulator");
					Some(data)
				}
				Err(err) => {
					debug!(target = "branch.simulator", %url, reason = %err, "link not simulated, delegating");
					None
				}
			},
			None => None,
		};

		let outcome = match simulated {
			Some(data) => Ok(data),
			None => self.inner.resolve(options).await,
		};

		let log = self.simulator.network_log();
		if log.is_enabled() {
			let endpoint = options.url.as_deref().unwrap_or(OPEN_ENDPOINT);
			let request = serde_json::to_value(options).ok();
			match &outcome {
				Ok(data) => log.record(endpoint, request, serde_json::to_value(data).ok(), Some(200), None),
				Err(BranchError::ServerError { status_code, message }) => log.record(endpoint, request, None, Some(*status_code), Some(message.clone())),
				Err(err) => log.record(endpoint, request, None, None, Some(err.to_string())),
			};
		}

		outcome
	}
}

#[cfg(test)]
mod tests {
	use branch_runtime::FakeResolverBuilder;

	use super::*;
	use crate::simulator::SimulatedLink;

	const SALE: &str = "https://example.app.link/sale";

	fn simulator() -> Arc<BranchLinkSimulator> {
		let simulator = Arc::new(BranchLinkSimulator::new());
		simulator.register_link(SALE, SimulatedLink::new().with_campaign("sale"));
		simulator
	}

	#[tokio::test]
	async fn registered_link_is_simulated_when_enabled() {
		let simulator = simulator();
		simulator.enable();
		let (fake, controller) = FakeResolverBuilder::new().build();
		let resolver = SimulatingResolver::new(Arc::clone(&simulator), fake);

		let data = resolver.resolve(&InitializationOptions::new().with_url(SALE)).await.unwrap();
		assert!(data.simulated);
		assert_eq!(data.link_data.unwrap().campaign.as_deref(), Some("sale"));
		assert_eq!(controller.calls(), 0);
	}

	#[tokio::test]
	async fn disabled_simulator_delegates() {
		let simulator = simulator();
		let (fake, controller) = FakeResolverBuilder::new().build();
		let resolver = SimulatingResolver::new(simulator, fake);

		let data = resolver.resolve(&InitializationOptions::new().with_url(SALE)).await.unwrap();
		assert!(!data.simulated);
		assert_eq!(controller.calls(), 1);
	}

	#[tokio::test]
	async fn unregistered_link_falls_through_to_inner() {
		let simulator = simulator();
		simulator.enable();
		let other = "https://example.app.link/other";
		let link = branch_protocol::LinkData {
			campaign: Some("backend".into()),
			..Default::default()
		};
		let (fake, controller) = FakeResolverBuilder::new().link(other, link).build();
		let resolver = SimulatingResolver::new(Arc::clone(&simulator), fake);

		let data = resolver.resolve(&InitializationOptions::new().with_url(other)).await.unwrap();
		assert!(!data.simulated);
		assert_eq!(data.link_data.and_then(|l| l.campaign).as_deref(), Some("backend"));
		assert_eq!(controller.calls(), 1);

		simulator.disable();
		let data = resolver.resolve(&InitializationOptions::new().with_url(SALE)).await.unwrap();
		assert!(!data.simulated);
		assert_eq!(controller.calls(), 2);
	}

	#[tokio::test]
	async fn resolutions_are_logged_while_logging_is_enabled() {
		let simulator = simulator();
		simulator.enable();
		let (fake, controller) = FakeResolverBuilder::new().build();
		controller.fail_next(BranchError::ServerError {
			status_code: 503,
			message: "unavailable".into(),
		});
		let resolver = SimulatingResolver::new(Arc::clone(&simulator), fake);

		resolver.resolve(&InitializationOptions::new()).await.unwrap_err();
		assert!(simulator.network_logs().is_empty());

		simulator.enable_network_logging();
		resolver.resolve(&InitializationOptions::new().with_url(SALE)).await.unwrap();
		resolver.resolve(&InitializationOptions::new()).await.unwrap();

		let logs = simulator.network_logs();
		assert_eq!(logs.len(), 2);
		assert_eq!(logs[0].url, SALE);
		assert_eq!(logs[0].status_code, Some(200));
		assert_eq!(logs[1].url, OPEN_ENDPOINT);
	}
}
