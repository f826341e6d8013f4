//! Fake resolver for unit testing coalescing and state transitions.
//!
//! Provides an in-memory [`SessionResolver`] that records every request and
//! can be held open, delayed, or scripted to fail.
//!
//! # Example
//!
//! ```ignore
//! let (resolver, controller) = FakeResolverBuilder::new().held().build();
//! let manager = SessionManager::new(resolver);
//!
//! let fut = manager.initialize(InitializationOptions::new());
//! controller.wait_for_calls(1).await;
//! controller.release();
//! let session = fut.await?;
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use branch_protocol::{InitializationOptions, LinkData, SessionData};
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};

use crate::error::{BranchError, Result};
use crate::resolver::SessionResolver;

/// Builder for creating fake resolver instances.
pub struct FakeResolverBuilder {
	delay: Duration,
	held: bool,
	identity_id: String,
	device_fingerprint_id: String,
	links: HashMap<String, LinkData>,
}

impl FakeResolverBuilder {
	pub fn new() -> Self {
		Self {
			delay: Duration::ZERO,
			held: false,
			identity_id: "fake-identity".to_string(),
			device_fingerprint_id: "fake-fingerprint".to_string(),
			links: HashMap::new(),
		}
	}

	/// Adds a fixed delay to every resolution.
	pub fn delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	/// Starts with the gate closed; resolutions block until
	/// [`FakeResolverController::release`] is called.
	pub fn held(mut self) -> Self {
		self.held = true;
		self
	}

	/// Returns `data` whenever a request carries `url`.
	pub fn link(mut self, url: impl Into<String>, data: LinkData) -> Self {
		self.links.insert(url.into(), data);
		self
	}

	/// Build the fake resolver and return both it and a controller.
	pub fn build(self) -> (FakeResolver, FakeResolverController) {
		let (gate, _) = watch::channel(!self.held);
		let shared = Arc::new(FakeShared {
			requests: Mutex::new(Vec::new()),
			failures: Mutex::new(VecDeque::new()),
			gate,
			started: Notify::new(),
		});

		let resolver = FakeResolver {
			shared: Arc::clone(&shared),
			delay: self.delay,
			identity_id: self.identity_id,
			device_fingerprint_id: self.device_fingerprint_id,
			links: self.links,
		};

		(resolver, FakeResolverController { shared })
	}
}

impl Default for FakeResolverBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct FakeShared {
	requests: Mutex<Vec<InitializationOptions>>,
	failures: Mutex<VecDeque<BranchError>>,
	gate: watch::Sender<bool>,
	started: Notify,
}

pub struct FakeResolver {
	shared: Arc<FakeShared>,
	delay: Duration,
	identity_id: String,
	device_fingerprint_id: String,
	links: HashMap<String, LinkData>,
}

#[async_trait]
impl SessionResolver for FakeResolver {
	async fn resolve(&self, options: &InitializationOptions) -> Result<SessionData> {
		let call = {
			let mut requests = self.shared.requests.lock();
			requests.push(options.clone());
			requests.len()
		};
		self.shared.started.notify_waiters();

		let mut gate = self.shared.gate.subscribe();
		let _ = gate.wait_for(|open| *open).await;

		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}

		if let Some(err) = self.shared.failures.lock().pop_front() {
			return Err(err);
		}

		let mut data = SessionData::new(self.identity_id.clone(), self.device_fingerprint_id.clone(), call == 1);
		if let Some(link) = options.url.as_ref().and_then(|url| self.links.get(url)) {
			data = data.with_link_data(link.clone());
		}
		Ok(data)
	}
}

/// Controller for scripting outcomes and inspecting requests.
pub struct FakeResolverController {
	shared: Arc<FakeShared>,
}

impl FakeResolverController {
	/// Number of resolutions started so far.
	pub fn calls(&self) -> usize {
		self.shared.requests.lock().len()
	}

	/// Options passed to every resolution, in call order.
	pub fn requests(&self) -> Vec<InitializationOptions> {
		self.shared.requests.lock().clone()
	}

	/// Makes the next resolution fail with `err`.
	pub fn fail_next(&self, err: BranchError) {
		self.shared.failures.lock().push_back(err);
	}

	pub fn hold(&self) {
		self.shared.gate.send_replace(false);
	}

	pub fn release(&self) {
		self.shared.gate.send_replace(true);
	}

	/// Waits until at least `count` resolutions have started.
	pub async fn wait_for_calls(&self, count: usize) {
		loop {
			let notified = self.shared.started.notified();
			if self.calls() >= count {
				return;
			}
			notified.await;
		}
	}
}
