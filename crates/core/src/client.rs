use std::sync::Arc;

use branch_runtime::{BranchError, SessionManager, SessionResolver};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tracing::info;

use crate::config::BranchConfig;
use crate::coordinator::BranchSessionCoordinator;
use crate::events::NotificationCenter;
use crate::integration::{self, FeatureFlags};
use crate::main_queue::{MainContext, MainQueue};
use crate::simulator::{BranchLinkSimulator, OfflineResolver, SimulatingResolver};

/// Builder wiring a resolver, the link simulator, and the coordinator.
#[derive(Default)]
pub struct BranchBuilder {
	config: BranchConfig,
	resolver: Option<Arc<dyn SessionResolver>>,
	main: Option<Arc<dyn MainContext>>,
	events: Option<NotificationCenter>,
	runtime: Option<Handle>,
}

impl BranchBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn config(mut self, config: BranchConfig) -> Self {
		self.config = config;
		self
	}

	/// Resolver for links the simulator does not answer. Defaults to
	/// [`OfflineResolver`].
	pub fn resolver<R>(mut self, resolver: R) -> Self
	where
		R: SessionResolver + 'static,
	{
		self.resolver = Some(Arc::new(resolver));
		self
	}

	/// Main context for completions. Defaults to a new [`MainQueue`].
	pub fn main_context(mut self, main: Arc<dyn MainContext>) -> Self {
		self.main = Some(main);
		self
	}

	pub fn events(mut self, events: NotificationCenter) -> Self {
		self.events = Some(events);
		self
	}

	/// Runtime for manager operations. Defaults to the current runtime.
	pub fn runtime(mut self, runtime: Handle) -> Self {
		self.runtime = Some(runtime);
		self
	}

	pub fn build(self) -> Result<Branch, BranchError> {
		let runtime = match self.runtime {
			Some(runtime) => runtime,
			None => Handle::try_current().map_err(|err| BranchError::InvalidConfiguration(format!("no tokio runtime: {err}")))?,
		};
		let main = match self.main {
			Some(main) => main,
			None => Arc::new(MainQueue::spawn().map_err(|err| BranchError::InvalidConfiguration(format!("failed to start main queue: {err}")))?),
		};

		let simulator = Arc::new(BranchLinkSimulator::new());
		self.config.configure(&simulator);

		let inner = self.resolver.unwrap_or_else(|| Arc::new(OfflineResolver::new()));
		let resolver: Arc<dyn SessionResolver> = Arc::new(SimulatingResolver::new(Arc::clone(&simulator), inner));
		let mut manager = SessionManager::builder(resolver);
		if let Some(timeout) = self.config.resolve_timeout() {
			manager = manager.resolve_timeout(timeout);
		}

		let coordinator = BranchSessionCoordinator::new(Arc::new(manager.build()), main, self.events.unwrap_or_default(), runtime);
		info!(
			target = "branch.coordinator",
			modern = self.config.use_modern_session_manager,
			simulator = simulator.is_enabled(),
			links = simulator.registered_links().len(),
			"branch engine ready"
		);

		Ok(Branch {
			flags: self.config.feature_flags(),
			simulator,
			coordinator,
		})
	}
}

/// Fully wired session engine.
pub struct Branch {
	flags: FeatureFlags,
	simulator: Arc<BranchLinkSimulator>,
	coordinator: BranchSessionCoordinator,
}

impl Branch {
	pub fn builder() -> BranchBuilder {
		BranchBuilder::new()
	}

	pub fn coordinator(&self) -> &BranchSessionCoordinator {
		&self.coordinator
	}

	pub fn simulator(&self) -> &Arc<BranchLinkSimulator> {
		&self.simulator
	}

	pub fn feature_flags(&self) -> FeatureFlags {
		self.flags
	}

	/// See [`integration::initialize_legacy`].
	pub fn initialize_legacy<F>(&self, url: Option<&str>, completion: F) -> bool
	where
		F: FnOnce(Result<Map<String, Value>, BranchError>) + Send + 'static,
	{
		integration::initialize_legacy(self.flags, &self.coordinator, url, completion)
	}
}
