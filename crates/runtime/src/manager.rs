//! Single-writer session coordinator.
//!
//! [`SessionManager`] owns the current [`SessionState`] and is the only code
//! that changes it. All state lives behind one mutex that is never held across
//! an await, so every transition is observed atomically.
//!
//! # Coalescing
//!
//! An initialization runs as an *attempt*:
//!
//! 1. The first caller moves the state to `Initializing`, allocates the
//!    session id, and spawns a resolution task
//! 2. Every caller (first or later) registers a oneshot sender on the attempt
//! 3. Later callers arriving while `Initializing` merge their options (most
//!    importantly their URL) into the attempt instead of starting new work
//! 4. The resolution task awaits the resolver; if options changed while it was
//!    waiting it resolves again with the merged options. Identity and
//!    first-session status stay those of the first round; later rounds only
//!    contribute link data
//! 5. The outcome is fanned out unchanged to every registered sender
//!
//! Calls that arrive after an attempt completed are not coalesced: they start
//! a new attempt with a new session id.
//!
//! # Cancellation
//!
//! Only [`refresh`](SessionManager::refresh) and
//! [`reset`](SessionManager::reset) cancel an attempt. Each attempt carries a
//! generation number; a resolution task finishing for a stale generation is
//! ignored.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use branch_protocol::{InitializationOptions, LinkData, SIMULATED_ID_PREFIX, Session, SessionData};
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BranchError, Result};
use crate::resolver::SessionResolver;
use crate::state::SessionState;

/// Stream of state transitions returned by [`SessionManager::observe_state`].
pub type StateStream = UnboundedReceiverStream<SessionState>;

type Waiter = oneshot::Sender<Result<Session>>;

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder {
	resolver: Arc<dyn SessionResolver>,
	resolve_timeout: Option<Duration>,
}

impl SessionManagerBuilder {
	pub fn new(resolver: Arc<dyn SessionResolver>) -> Self {
		Self {
			resolver,
			resolve_timeout: None,
		}
	}

	/// Fails a resolution with [`BranchError::Timeout`] after `timeout`.
	pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
		self.resolve_timeout = Some(timeout);
		self
	}

	pub fn build(self) -> SessionManager {
		SessionManager {
			shared: Arc::new(Shared {
				resolver: self.resolver,
				resolve_timeout: self.resolve_timeout,
				inner: Mutex::new(Inner::default()),
			}),
		}
	}
}

/// Owner of the session lifecycle.
///
/// Must be used from within a tokio runtime; resolutions run on spawned tasks.
/// Dropping the manager ends every state stream and fails outstanding callers
/// with [`BranchError::NotInitialized`].
pub struct SessionManager {
	shared: Arc<Shared>,
}

struct Shared {
	resolver: Arc<dyn SessionResolver>,
	resolve_timeout: Option<Duration>,
	inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
	state: SessionState,
	/// Present exactly while `state` is `Initializing`.
	attempt: Option<Attempt>,
	next_generation: u64,
	observers: Vec<mpsc::UnboundedSender<SessionState>>,
	closed: bool,
}

struct Attempt {
	generation: u64,
	session_id: String,
	options: InitializationOptions,
	revision: u64,
	/// Outcome of the first round once a merge forced another one.
	first_round: Option<SessionData>,
	waiters: Vec<Waiter>,
	task: Option<AbortHandle>,
}

enum Step {
	Wait(oneshot::Receiver<Result<Session>>),
	Ready,
}

impl SessionManager {
	pub fn new<R>(resolver: R) -> Self
	where
		R: SessionResolver + 'static,
	{
		SessionManagerBuilder::new(Arc::new(resolver)).build()
	}

	pub fn builder(resolver: Arc<dyn SessionResolver>) -> SessionManagerBuilder {
		SessionManagerBuilder::new(resolver)
	}

	/// Snapshot of the current state.
	pub fn state(&self) -> SessionState {
		self.shared.inner.lock().state.clone()
	}

	pub fn current_session(&self) -> Option<Session> {
		self.shared.inner.lock().state.session().cloned()
	}

	/// Number of callers attached to the in-flight attempt.
	pub fn pending_callers(&self) -> usize {
		self.shared.inner.lock().attempt.as_ref().map_or(0, |attempt| attempt.waiters.len())
	}

	/// Initializes a session, or joins the initialization already in flight.
	///
	/// Every caller that joins the same attempt receives the identical
	/// outcome, including the same session id.
	pub async fn initialize(&self, options: InitializationOptions) -> Result<Session> {
		let rx = {
			let mut guard = self.shared.inner.lock();
			let inner = &mut *guard;
			if inner.closed {
				return Err(BranchError::NotInitialized);
			}
			match inner.attempt.as_mut() {
				Some(attempt) => {
					attempt.merge(&options);
					debug!(
						target = "branch.session",
						generation = attempt.generation,
						url = ?options.url,
						waiters = attempt.waiters.len() + 1,
						"joining in-flight initialization"
					);
					attempt.subscribe()
				}
				None => {
					inner.set_state(SessionState::Initializing)?;
					self.start_attempt(inner, options, Vec::new())
				}
			}
		};

		await_outcome(rx).await
	}

	/// Routes a deep link into the session.
	///
	/// While initializing, the URL joins the in-flight attempt. Once
	/// initialized, the link is resolved and merged into the current session,
	/// keeping its id. If an initialization started while the link was
	/// resolving, the URL joins that attempt instead.
	pub async fn handle_deep_link(&self, url: &str) -> Result<Session> {
		validate_url(url)?;

		let step = {
			let mut guard = self.shared.inner.lock();
			let inner = &mut *guard;
			match &inner.state {
				SessionState::Uninitialized => return Err(BranchError::SessionRequired),
				SessionState::Initializing => {
					let attempt = inner.attempt.as_mut().ok_or(BranchError::SessionRequired)?;
					attempt.merge(&InitializationOptions::new().with_url(url));
					debug!(target = "branch.session", generation = attempt.generation, %url, "deep link joined in-flight initialization");
					Step::Wait(attempt.subscribe())
				}
				SessionState::Initialized(_) => Step::Ready,
			}
		};

		match step {
			Step::Wait(rx) => await_outcome(rx).await,
			Step::Ready => {
				let data = self.shared.resolve(&InitializationOptions::new().with_url(url)).await?;
				let link = deep_link_data(data.link_data, url, data.simulated);
				let rx = {
					let mut guard = self.shared.inner.lock();
					let inner = &mut *guard;
					if let Some(current) = inner.state.session() {
						let next = current.with_link_data(link);
						info!(target = "branch.session", session_id = %next.id, %url, simulated = data.simulated, "deep link merged into session");
						inner.set_state(SessionState::Initialized(next.clone()))?;
						return Ok(next);
					}
					let attempt = inner.attempt.as_mut().ok_or(BranchError::SessionRequired)?;
					attempt.merge(&InitializationOptions::new().with_url(url));
					debug!(target = "branch.session", generation = attempt.generation, %url, "deep link joined initialization started while resolving");
					attempt.subscribe()
				};
				await_outcome(rx).await
			}
		}
	}

	/// Associates `user_id` with the current session.
	pub async fn set_identity(&self, user_id: &str) -> Result<Session> {
		self.settled().await?;
		if user_id.is_empty() {
			return Err(BranchError::InvalidIdentity);
		}
		self.update_current(|session| {
			info!(target = "branch.session", session_id = %session.id, "identity set");
			Ok(session.with_identity(user_id))
		})
	}

	/// Clears the user id, keeping the session and its fingerprint.
	pub async fn logout(&self) -> Result<Session> {
		self.settled().await?;
		self.update_current(|session| {
			info!(target = "branch.session", session_id = %session.id, "identity cleared");
			Ok(session.without_identity())
		})
	}

	/// Starts a brand new session, discarding any user id.
	///
	/// An in-flight attempt is aborted; its callers are carried over and
	/// receive the refreshed session.
	pub async fn refresh(&self) -> Result<Session> {
		let rx = {
			let mut guard = self.shared.inner.lock();
			let inner = &mut *guard;
			if inner.closed {
				return Err(BranchError::NotInitialized);
			}
			let carried = match inner.attempt.take() {
				Some(attempt) => {
					debug!(
						target = "branch.session",
						generation = attempt.generation,
						waiters = attempt.waiters.len(),
						"refresh cancels in-flight attempt"
					);
					attempt.abort();
					attempt.waiters
				}
				None => Vec::new(),
			};
			inner.set_state(SessionState::Initializing)?;
			self.start_attempt(inner, InitializationOptions::new(), carried)
		};

		await_outcome(rx).await
	}

	/// Returns to `Uninitialized` and drops the current session.
	///
	/// Callers waiting on an in-flight attempt receive
	/// [`BranchError::NotInitialized`]. Calling this repeatedly is harmless.
	pub fn reset(&self) {
		let dropped = {
			let mut inner = self.shared.inner.lock();
			let attempt = inner.attempt.take();
			if let Err(err) = inner.set_state(SessionState::Uninitialized) {
				warn!(target = "branch.session", error = %err, "reset rejected");
			}
			attempt
		};

		if let Some(attempt) = dropped {
			info!(target = "branch.session", generation = attempt.generation, "reset cancelled in-flight attempt");
			attempt.fail(BranchError::NotInitialized);
		}
	}

	/// Subscribes to state transitions.
	///
	/// The stream yields the current state first, then every transition in
	/// order without gaps. It ends when the manager is dropped.
	pub fn observe_state(&self) -> StateStream {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut inner = self.shared.inner.lock();
		if !inner.closed && tx.send(inner.state.clone()).is_ok() {
			inner.observers.push(tx);
		}
		UnboundedReceiverStream::new(rx)
	}

	/// Ends all state streams and fails outstanding callers.
	pub fn shutdown(&self) {
		let dropped = {
			let mut inner = self.shared.inner.lock();
			inner.closed = true;
			inner.observers.clear();
			inner.attempt.take()
		};
		if let Some(attempt) = dropped {
			attempt.fail(BranchError::NotInitialized);
		}
	}

	fn start_attempt(&self, inner: &mut Inner, options: InitializationOptions, mut waiters: Vec<Waiter>) -> oneshot::Receiver<Result<Session>> {
		let generation = inner.next_generation;
		inner.next_generation += 1;

		let (tx, rx) = oneshot::channel();
		waiters.push(tx);

		let session_id = Uuid::new_v4().to_string();
		debug!(target = "branch.session", generation, %session_id, url = ?options.url, "starting initialization attempt");

		let task = tokio::spawn(run_attempt(Arc::clone(&self.shared), generation));
		inner.attempt = Some(Attempt {
			generation,
			session_id,
			options,
			revision: 0,
			first_round: None,
			waiters,
			task: Some(task.abort_handle()),
		});
		rx
	}

	/// Fails on `Uninitialized`, waits out an in-flight attempt.
	async fn settled(&self) -> Result<()> {
		let rx = {
			let mut guard = self.shared.inner.lock();
			let inner = &mut *guard;
			match inner.attempt.as_mut() {
				Some(attempt) => Some(attempt.subscribe()),
				None if inner.state.needs_initialization() => return Err(BranchError::SessionRequired),
				None => None,
			}
		};
		if let Some(rx) = rx {
			await_outcome(rx).await?;
		}
		Ok(())
	}

	fn update_current<F>(&self, update: F) -> Result<Session>
	where
		F: FnOnce(&Session) -> Result<Session>,
	{
		let mut inner = self.shared.inner.lock();
		let Some(current) = inner.state.session() else {
			return Err(BranchError::SessionRequired);
		};
		let next = update(current)?;
		inner.set_state(SessionState::Initialized(next.clone()))?;
		Ok(next)
	}
}

impl Drop for SessionManager {
	fn drop(&mut self) {
		self.shutdown();
	}
}

impl Shared {
	async fn resolve(&self, options: &InitializationOptions) -> Result<SessionData> {
		let fut = AssertUnwindSafe(self.resolver.resolve(options)).catch_unwind();
		let outcome = match self.resolve_timeout {
			Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| BranchError::Timeout)?,
			None => fut.await,
		};
		outcome.unwrap_or_else(|_| Err(BranchError::Unknown("session resolver panicked".to_string())))
	}

	/// Returns the options to resolve next, or `None` when the attempt is stale.
	fn snapshot(&self, generation: u64) -> Option<(InitializationOptions, u64)> {
		let inner = self.inner.lock();
		inner
			.attempt
			.as_ref()
			.filter(|attempt| attempt.generation == generation)
			.map(|attempt| (attempt.options.clone(), attempt.revision))
	}

	/// Completes the attempt unless it went stale or its options changed while
	/// resolving. Returns `true` when another resolution round is needed.
	fn finish(&self, generation: u64, revision: u64, outcome: Result<SessionData>) -> bool {
		let attempt = {
			let mut inner = self.inner.lock();
			let Some(current) = inner.attempt.as_mut().filter(|attempt| attempt.generation == generation) else {
				debug!(target = "branch.session", generation, "discarding stale resolution");
				return false;
			};
			let outcome = match outcome {
				Ok(data) if current.revision != revision => {
					debug!(target = "branch.session", generation, "options changed during resolution; resolving again");
					if current.first_round.is_none() {
						current.first_round = Some(data);
					}
					return true;
				}
				outcome => outcome,
			};
			let Some(mut attempt) = inner.attempt.take() else {
				return false;
			};

			let result = attempt.complete(outcome);
			let next = match &result {
				Ok(session) => SessionState::Initialized(session.clone()),
				Err(_) => SessionState::Uninitialized,
			};
			if let Err(err) = inner.set_state(next) {
				warn!(target = "branch.session", error = %err, "attempt completion rejected");
			}
			(attempt, result)
		};

		let (attempt, result) = attempt;
		match &result {
			Ok(session) => info!(
				target = "branch.session",
				session_id = %session.id,
				waiters = attempt.waiters.len(),
				deep_link = session.has_deep_link_data(),
				"session initialized"
			),
			Err(err) => warn!(target = "branch.session", error = %err, code = err.code(), waiters = attempt.waiters.len(), "initialization failed"),
		}
		for waiter in attempt.waiters {
			let _ = waiter.send(result.clone());
		}
		false
	}
}

async fn run_attempt(shared: Arc<Shared>, generation: u64) {
	while let Some((options, revision)) = shared.snapshot(generation) {
		let outcome = shared.resolve(&options).await;
		if !shared.finish(generation, revision, outcome) {
			return;
		}
	}
}

impl Inner {
	/// Applies a validated transition and notifies observers of changes.
	fn set_state(&mut self, to: SessionState) -> Result<()> {
		let next = self.state.transition(to)?;
		if next == self.state {
			return Ok(());
		}
		debug!(target = "branch.session", from = %self.state, to = %next, "state transition");
		self.state = next;
		let state = self.state.clone();
		self.observers.retain(|observer| observer.send(state.clone()).is_ok());
		Ok(())
	}
}

impl Attempt {
	fn subscribe(&mut self) -> oneshot::Receiver<Result<Session>> {
		let (tx, rx) = oneshot::channel();
		self.waiters.push(tx);
		rx
	}

	fn merge(&mut self, newer: &InitializationOptions) {
		let merged = self.options.merged_with(newer);
		if merged != self.options {
			self.options = merged;
			self.revision += 1;
		}
	}

	fn abort(&self) {
		if let Some(task) = &self.task {
			task.abort();
		}
	}

	fn fail(self, err: BranchError) {
		self.abort();
		for waiter in self.waiters {
			let _ = waiter.send(Err(err.clone()));
		}
	}

	/// Combines the final round with the first one, if a merge forced more
	/// than one round.
	fn complete(&mut self, outcome: Result<SessionData>) -> Result<Session> {
		let data = match (outcome, self.first_round.take()) {
			(Ok(latest), Some(first)) => SessionData {
				link_data: latest.link_data,
				simulated: latest.simulated,
				..first
			},
			(Ok(latest), None) => latest,
			(Err(err), Some(first)) => {
				warn!(target = "branch.session", generation = self.generation, error = %err, "merged link resolution failed; keeping first round");
				SessionData {
					link_data: None,
					simulated: false,
					..first
				}
			}
			(Err(err), None) => return Err(err),
		};
		Ok(self.build_session(data))
	}

	fn build_session(&self, data: SessionData) -> Session {
		let id = if data.simulated {
			format!("{SIMULATED_ID_PREFIX}{}", self.session_id)
		} else {
			self.session_id.clone()
		};
		let session = Session::new(id, data.identity_id, data.device_fingerprint_id, data.is_first_session);
		let link = match self.options.url.as_deref() {
			Some(url) => Some(deep_link_data(data.link_data, url, data.simulated)),
			None => data.link_data.map(|link| mark_simulated(link, data.simulated)),
		};
		match link {
			Some(link) => session.with_link_data(link),
			None => session,
		}
	}
}

/// Picks the resolver's link data for `url`, falling back to the URL itself.
fn deep_link_data(resolved: Option<LinkData>, url: &str, simulated: bool) -> LinkData {
	let mut link = resolved.unwrap_or_else(|| LinkData::from_url(url));
	link.url.get_or_insert_with(|| url.to_string());
	mark_simulated(link, simulated)
}

fn mark_simulated(mut link: LinkData, simulated: bool) -> LinkData {
	link.simulated |= simulated;
	link
}

fn validate_url(url: &str) -> Result<()> {
	if url.trim().is_empty() {
		return Err(BranchError::NoUrlProvided);
	}
	url::Url::parse(url).map(|_| ()).map_err(|err| BranchError::InvalidUrl(format!("{url}: {err}")))
}

async fn await_outcome(rx: oneshot::Receiver<Result<Session>>) -> Result<Session> {
	rx.await.unwrap_or(Err(BranchError::NotInitialized))
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use futures_util::future::join_all;
	use tokio::sync::watch;
	use tokio_stream::StreamExt;

	use super::*;
	use crate::fake_resolver::{FakeResolverBuilder, FakeResolverController};

	const SALE_URL: &str = "https://example.app.link/summer-sale?promo=25OFF";

	fn manager() -> (SessionManager, FakeResolverController) {
		let (resolver, controller) = FakeResolverBuilder::new().build();
		(SessionManager::new(resolver), controller)
	}

	fn held_manager() -> (Arc<SessionManager>, FakeResolverController) {
		let (resolver, controller) = FakeResolverBuilder::new().held().build();
		(Arc::new(SessionManager::new(resolver)), controller)
	}

	/// Link lookups take 50ms; opens past the first `free_opens` wait for the gate.
	struct SplitResolver {
		calls: AtomicUsize,
		free_opens: usize,
		fail_links: bool,
		gate: watch::Sender<bool>,
	}

	impl SplitResolver {
		fn new(free_opens: usize, fail_links: bool) -> Arc<Self> {
			Arc::new(Self {
				calls: AtomicUsize::new(0),
				free_opens,
				fail_links,
				gate: watch::channel(false).0,
			})
		}

		async fn wait_for_calls(&self, count: usize) {
			while self.calls.load(Ordering::SeqCst) < count {
				tokio::time::sleep(Duration::from_millis(1)).await;
			}
		}

		fn release(&self) {
			self.gate.send_replace(true);
		}
	}

	#[async_trait::async_trait]
	impl SessionResolver for SplitResolver {
		async fn resolve(&self, options: &InitializationOptions) -> Result<SessionData> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
			if options.url.is_some() {
				tokio::time::sleep(Duration::from_millis(50)).await;
				if self.fail_links {
					return Err(BranchError::ServerError {
						status_code: 502,
						message: "link lookup failed".into(),
					});
				}
			} else if call > self.free_opens {
				let _ = self.gate.subscribe().wait_for(|open| *open).await;
			}
			Ok(SessionData::new(format!("identity-{call}"), "fingerprint", call == 1))
		}
	}

	async fn wait_for_callers(manager: &SessionManager, count: usize) {
		while manager.pending_callers() < count {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
	}

	#[tokio::test]
	async fn concurrent_initialize_calls_share_one_session() {
		let (manager, controller) = manager();

		let results = join_all((0..8).map(|_| manager.initialize(InitializationOptions::new()))).await;
		let ids: HashSet<String> = results.into_iter().map(|r| r.unwrap().id).collect();

		assert_eq!(ids.len(), 1);
		assert_eq!(controller.calls(), 1);
		assert!(manager.state().is_ready());
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn spawned_callers_coalesce_while_resolution_is_held() {
		let (manager, controller) = held_manager();

		let mut handles = Vec::new();
		for i in 0..5 {
			let manager = Arc::clone(&manager);
			handles.push(tokio::spawn(async move {
				if i % 2 == 0 {
					manager.initialize(InitializationOptions::new()).await
				} else {
					manager.initialize(InitializationOptions::new().with_url(SALE_URL)).await
				}
			}));
		}

		controller.wait_for_calls(1).await;
		while manager.pending_callers() < 5 {
			tokio::task::yield_now().await;
		}
		controller.release();

		let mut ids = HashSet::new();
		for handle in handles {
			let session = handle.await.unwrap().unwrap();
			assert_eq!(session.link_data.as_ref().and_then(|l| l.url.as_deref()), Some(SALE_URL));
			ids.insert(session.id);
		}
		assert_eq!(ids.len(), 1);
		// The merged URL arrived after the first resolution started.
		assert!(controller.calls() <= 2);
	}

	#[tokio::test]
	async fn sequential_initialize_calls_get_new_ids() {
		let (manager, controller) = manager();

		let first = manager.initialize(InitializationOptions::new()).await.unwrap();
		let second = manager.initialize(InitializationOptions::new()).await.unwrap();

		assert_ne!(first.id, second.id);
		assert_eq!(controller.calls(), 2);
	}

	#[tokio::test]
	async fn cold_launch_with_url_carries_link_data() {
		let (manager, _controller) = manager();

		let session = manager.initialize(InitializationOptions::new().with_url(SALE_URL)).await.unwrap();

		assert!(session.has_deep_link_data());
		let link = session.link_data.unwrap();
		assert_eq!(link.url.as_deref(), Some(SALE_URL));
		assert_eq!(link.string("promo"), Some("25OFF"));
	}

	#[tokio::test]
	async fn deep_link_before_initialize_requires_session() {
		let (manager, controller) = manager();

		let err = manager.handle_deep_link(SALE_URL).await.unwrap_err();

		assert!(matches!(err, BranchError::SessionRequired));
		assert_eq!(controller.calls(), 0);
		assert!(manager.state().needs_initialization());
	}

	#[tokio::test]
	async fn deep_link_rejects_malformed_urls() {
		let (manager, _controller) = manager();
		manager.initialize(InitializationOptions::new()).await.unwrap();

		assert!(matches!(manager.handle_deep_link("").await, Err(BranchError::NoUrlProvided)));
		assert!(matches!(manager.handle_deep_link("not a url").await, Err(BranchError::InvalidUrl(_))));
	}

	#[tokio::test]
	async fn deep_link_while_initializing_joins_attempt() {
		let (manager, controller) = held_manager();

		let init = {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.initialize(InitializationOptions::new()).await })
		};
		controller.wait_for_calls(1).await;

		let link = {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.handle_deep_link(SALE_URL).await })
		};
		while manager.pending_callers() < 2 {
			tokio::task::yield_now().await;
		}
		controller.release();

		let from_init = init.await.unwrap().unwrap();
		let from_link = link.await.unwrap().unwrap();
		assert_eq!(from_init.id, from_link.id);
		assert_eq!(from_init.link_data.and_then(|l| l.url), Some(SALE_URL.to_string()));
		assert_eq!(controller.requests().last().and_then(|o| o.url.clone()), Some(SALE_URL.to_string()));
	}

	#[tokio::test]
	async fn deep_link_joining_cold_start_keeps_first_session() {
		let (manager, controller) = held_manager();

		let init = {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.initialize(InitializationOptions::new()).await })
		};
		controller.wait_for_calls(1).await;

		let link = {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.handle_deep_link(SALE_URL).await })
		};
		wait_for_callers(&manager, 2).await;
		controller.release();

		let from_init = init.await.unwrap().unwrap();
		let from_link = link.await.unwrap().unwrap();
		// The resolver saw two opens; only the first one decides first-session status.
		assert_eq!(controller.calls(), 2);
		assert!(from_init.is_first_session);
		assert_eq!(from_init, from_link);
		assert!(from_init.has_deep_link_data());
	}

	#[tokio::test]
	async fn failed_link_round_keeps_first_round_session() {
		let resolver = SplitResolver::new(0, true);
		let manager = Arc::new(SessionManager::new(Arc::clone(&resolver)));

		let init = {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.initialize(InitializationOptions::new()).await })
		};
		resolver.wait_for_calls(1).await;
		let link = {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.handle_deep_link(SALE_URL).await })
		};
		wait_for_callers(&manager, 2).await;
		resolver.release();

		let from_init = init.await.unwrap().unwrap();
		let from_link = link.await.unwrap().unwrap();
		assert_eq!(from_init.id, from_link.id);
		assert_eq!(from_init.identity_id, "identity-1");
		assert!(from_init.is_first_session);
		assert_eq!(from_init.link_data.and_then(|l| l.url).as_deref(), Some(SALE_URL));
		assert!(manager.state().is_ready());
	}

	#[tokio::test]
	async fn deep_link_resolving_across_reinitialize_joins_new_attempt() {
		let resolver = SplitResolver::new(1, false);
		let manager = Arc::new(SessionManager::new(Arc::clone(&resolver)));
		let first = manager.initialize(InitializationOptions::new()).await.unwrap();

		let link = {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.handle_deep_link(SALE_URL).await })
		};
		resolver.wait_for_calls(2).await;
		let reinit = {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.initialize(InitializationOptions::new()).await })
		};
		resolver.wait_for_calls(3).await;
		wait_for_callers(&manager, 2).await;
		resolver.release();

		let from_link = link.await.unwrap().unwrap();
		let from_reinit = reinit.await.unwrap().unwrap();
		assert_ne!(from_reinit.id, first.id);
		assert_eq!(from_link.id, from_reinit.id);
		assert_eq!(from_reinit.identity_id, "identity-3");
		assert_eq!(from_reinit.link_data.and_then(|l| l.url).as_deref(), Some(SALE_URL));
		assert_eq!(manager.current_session().map(|s| s.id), Some(from_link.id));
	}

	#[tokio::test]
	async fn deep_link_after_initialize_keeps_session_id() {
		let (manager, _controller) = manager();
		let session = manager.initialize(InitializationOptions::new()).await.unwrap();
		assert!(!session.has_deep_link_data());

		let linked = manager.handle_deep_link(SALE_URL).await.unwrap();

		assert_eq!(linked.id, session.id);
		assert_eq!(linked.identity_id, session.identity_id);
		assert!(linked.has_deep_link_data());
		assert_eq!(manager.current_session().unwrap(), linked);
	}

	#[tokio::test]
	async fn identity_lifecycle() {
		let (manager, _controller) = manager();
		assert!(matches!(manager.set_identity("u1").await, Err(BranchError::SessionRequired)));

		let session = manager.initialize(InitializationOptions::new()).await.unwrap();
		assert!(matches!(manager.set_identity("").await, Err(BranchError::InvalidIdentity)));

		let identified = manager.set_identity("u1").await.unwrap();
		assert_eq!(identified.user_id.as_deref(), Some("u1"));
		assert!(identified.is_identified());
		assert_eq!(identified.id, session.id);

		let anonymous = manager.logout().await.unwrap();
		assert_eq!(anonymous.user_id, None);
		assert!(!anonymous.is_identified());
		assert_eq!(anonymous.id, session.id);
	}

	#[tokio::test]
	async fn logout_without_session_fails() {
		let (manager, _controller) = manager();
		assert!(matches!(manager.logout().await, Err(BranchError::SessionRequired)));
	}

	#[tokio::test]
	async fn refresh_creates_new_anonymous_session() {
		let (manager, _controller) = manager();
		let session = manager.initialize(InitializationOptions::new()).await.unwrap();
		manager.set_identity("u1").await.unwrap();

		let refreshed = manager.refresh().await.unwrap();

		assert_ne!(refreshed.id, session.id);
		assert_eq!(refreshed.user_id, None);
		assert_eq!(manager.current_session().map(|s| s.id), Some(refreshed.id));
	}

	#[tokio::test]
	async fn refresh_cancels_in_flight_attempt() {
		let (manager, controller) = held_manager();

		let pending = {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.initialize(InitializationOptions::new()).await })
		};
		controller.wait_for_calls(1).await;

		let refresh = {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.refresh().await })
		};
		controller.wait_for_calls(2).await;
		controller.release();

		let refreshed = refresh.await.unwrap().unwrap();
		let carried = pending.await.unwrap().unwrap();
		assert_eq!(carried.id, refreshed.id);
	}

	#[tokio::test]
	async fn reset_returns_to_uninitialized_and_allows_fresh_start() {
		let (manager, _controller) = manager();
		let first = manager.initialize(InitializationOptions::new()).await.unwrap();

		manager.reset();
		manager.reset();
		assert!(manager.state().needs_initialization());
		assert!(manager.current_session().is_none());

		let second = manager.initialize(InitializationOptions::new()).await.unwrap();
		assert_ne!(first.id, second.id);
	}

	#[tokio::test]
	async fn reset_fails_waiting_callers() {
		let (manager, controller) = held_manager();
		let pending = {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.initialize(InitializationOptions::new()).await })
		};
		controller.wait_for_calls(1).await;

		manager.reset();
		controller.release();

		assert!(matches!(pending.await.unwrap(), Err(BranchError::NotInitialized)));
		assert!(manager.state().needs_initialization());
	}

	#[tokio::test]
	async fn failure_is_shared_by_all_callers_and_resets_state() {
		let (manager, controller) = manager();
		controller.fail_next(BranchError::ServerError {
			status_code: 503,
			message: "unavailable".into(),
		});

		let results = join_all((0..3).map(|_| manager.initialize(InitializationOptions::new()))).await;

		for result in results {
			match result {
				Err(BranchError::ServerError { status_code, .. }) => assert_eq!(status_code, 503),
				other => panic!("expected server error, got {other:?}"),
			}
		}
		assert_eq!(controller.calls(), 1);
		assert!(manager.state().needs_initialization());
	}

	#[tokio::test]
	async fn resolve_timeout_surfaces_as_timeout() {
		let (resolver, _controller) = FakeResolverBuilder::new().held().build();
		let manager = SessionManager::builder(Arc::new(resolver)).resolve_timeout(Duration::from_millis(20)).build();

		let err = manager.initialize(InitializationOptions::new()).await.unwrap_err();

		assert!(matches!(err, BranchError::Timeout));
		assert!(manager.state().needs_initialization());
	}

	#[tokio::test]
	async fn state_stream_replays_current_then_orders_transitions() {
		let (manager, _controller) = manager();
		let mut states = manager.observe_state();

		manager.initialize(InitializationOptions::new()).await.unwrap();
		manager.set_identity("u1").await.unwrap();
		manager.reset();

		let names: Vec<&'static str> = vec![
			states.next().await.unwrap().name(),
			states.next().await.unwrap().name(),
			states.next().await.unwrap().name(),
			states.next().await.unwrap().name(),
			states.next().await.unwrap().name(),
		];
		assert_eq!(names, ["uninitialized", "initializing", "initialized", "initialized", "uninitialized"]);

		let mut late = manager.observe_state();
		assert!(late.next().await.unwrap().needs_initialization());
	}

	#[tokio::test]
	async fn state_stream_ends_when_manager_drops() {
		let (manager, _controller) = manager();
		let mut states = manager.observe_state();
		assert!(states.next().await.is_some());

		drop(manager);
		assert!(states.next().await.is_none());
	}

	#[tokio::test]
	async fn simulated_data_produces_prefixed_session_id() {
		struct Simulated;

		#[async_trait::async_trait]
		impl SessionResolver for Simulated {
			async fn resolve(&self, _options: &InitializationOptions) -> Result<SessionData> {
				Ok(SessionData::new("identity", "fingerprint", false).simulated())
			}
		}

		let manager = SessionManager::new(Simulated);
		let session = manager.initialize(InitializationOptions::new().with_url(SALE_URL)).await.unwrap();
		assert!(session.is_simulated());
		assert!(session.link_data.is_some_and(|link| link.simulated));

		let linked = manager.handle_deep_link("https://example.app.link/other").await.unwrap();
		assert_eq!(linked.id, session.id);
		assert!(linked.link_data.is_some_and(|link| link.simulated));
	}
}
