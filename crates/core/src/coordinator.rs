//! Callback bridge over [`SessionManager`].
//!
//! Platform lifecycle hooks are synchronous and expect a completion callback.
//! [`BranchSessionCoordinator`] turns each hook into a manager operation on the
//! tokio runtime and hands the outcome back on the [`MainContext`]:
//!
//! - the completion runs exactly once, after the manager operation finished
//! - it always runs on the main context, never inline on the caller
//! - initialize and deep-link hooks are bracketed by will/did start events
//!
//! Coalescing happens in the manager, so several hooks for one app open each
//! get their own delivery of the same session.

use std::future::Future;
use std::sync::Arc;

use branch_protocol::{InitializationOptions, Session};
use branch_runtime::{BranchError, SessionManager, SessionState};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::events::{NotificationCenter, SessionEvent};
use crate::integration;
use crate::main_queue::MainContext;

/// Activity type the platform reports for a universal link.
pub const ACTIVITY_TYPE_BROWSING_WEB: &str = "NSUserActivityTypeBrowsingWeb";

/// Key carrying the link URL in a push notification payload.
pub const PUSH_LINK_KEY: &str = "branch";

/// Completion handed to every coordinator entry point.
pub type Completion = Box<dyn FnOnce(Result<Session, BranchError>) + Send + 'static>;

/// A platform request to continue an activity started elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserActivity {
	pub activity_type: String,
	pub webpage_url: Option<String>,
}

impl UserActivity {
	pub fn new(activity_type: impl Into<String>) -> Self {
		Self {
			activity_type: activity_type.into(),
			webpage_url: None,
		}
	}

	/// Universal link activity for `url`.
	pub fn browsing_web(url: impl Into<String>) -> Self {
		Self::new(ACTIVITY_TYPE_BROWSING_WEB).with_webpage_url(url)
	}

	pub fn with_webpage_url(mut self, url: impl Into<String>) -> Self {
		self.webpage_url = Some(url.into());
		self
	}

	fn link(&self) -> Option<&str> {
		if self.activity_type != ACTIVITY_TYPE_BROWSING_WEB {
			return None;
		}
		self.webpage_url.as_deref().filter(|url| !url.is_empty())
	}
}

pub struct BranchSessionCoordinator {
	manager: Arc<SessionManager>,
	main: Arc<dyn MainContext>,
	events: NotificationCenter,
	runtime: Handle,
}

impl BranchSessionCoordinator {
	/// Creates a coordinator running manager operations on `runtime`.
	pub fn new(manager: Arc<SessionManager>, main: Arc<dyn MainContext>, events: NotificationCenter, runtime: Handle) -> Self {
		Self {
			manager,
			main,
			events,
			runtime,
		}
	}

	pub fn manager(&self) -> &Arc<SessionManager> {
		&self.manager
	}

	pub fn events(&self) -> &NotificationCenter {
		&self.events
	}

	pub fn is_initializing(&self) -> bool {
		self.manager.state().is_initializing()
	}

	pub fn is_initialized(&self) -> bool {
		self.manager.state().is_ready()
	}

	pub fn state(&self) -> SessionState {
		self.manager.state()
	}

	pub fn current_session(&self) -> Option<Session> {
		self.manager.current_session()
	}

	/// Legacy params dictionary for `session`.
	pub fn params_from_session(&self, session: &Session) -> Map<String, Value> {
		integration::params_from_session(session)
	}

	pub fn initialize_with_url<F>(&self, url: Option<&str>, completion: F)
	where
		F: FnOnce(Result<Session, BranchError>) + Send + 'static,
	{
		let options = match url {
			Some(url) => InitializationOptions::new().with_url(url),
			None => InitializationOptions::new(),
		};
		self.initialize(options, completion);
	}

	pub fn initialize<F>(&self, options: InitializationOptions, completion: F)
	where
		F: FnOnce(Result<Session, BranchError>) + Send + 'static,
	{
		let delivery = self.bracketed(options.url.clone(), completion);
		let manager = Arc::clone(&self.manager);
		self.run(delivery, async move { manager.initialize(options).await });
	}

	pub fn handle_deep_link<F>(&self, url: &str, completion: F)
	where
		F: FnOnce(Result<Session, BranchError>) + Send + 'static,
	{
		let delivery = self.bracketed(Some(url.to_string()), completion);
		let manager = Arc::clone(&self.manager);
		let url = url.to_string();
		self.run(delivery, async move { manager.handle_deep_link(&url).await });
	}

	/// Forwards a universal link activity.
	///
	/// Returns `false` and delivers [`BranchError::InvalidUserActivity`] when
	/// the activity is not a web activity with a URL; no events are posted
	/// and the resolver is not consulted in that case.
	pub fn continue_user_activity<F>(&self, activity: &UserActivity, completion: F) -> bool
	where
		F: FnOnce(Result<Session, BranchError>) + Send + 'static,
	{
		match activity.link() {
			Some(url) => {
				self.open_url(url, completion);
				true
			}
			None => {
				debug!(target = "branch.coordinator", activity_type = %activity.activity_type, "ignoring user activity");
				self.fail(BranchError::InvalidUserActivity, completion);
				false
			}
		}
	}

	/// Forwards the link carried under [`PUSH_LINK_KEY`] in a push payload.
	///
	/// Returns `false` and delivers [`BranchError::NoUrlProvided`] when the
	/// payload carries no link.
	pub fn handle_push_notification<F>(&self, payload: &Map<String, Value>, completion: F) -> bool
	where
		F: FnOnce(Result<Session, BranchError>) + Send + 'static,
	{
		match payload.get(PUSH_LINK_KEY).and_then(Value::as_str).filter(|url| !url.is_empty()) {
			Some(url) => {
				self.open_url(url, completion);
				true
			}
			None => {
				self.fail(BranchError::NoUrlProvided, completion);
				false
			}
		}
	}

	pub fn set_identity<F>(&self, user_id: &str, completion: F)
	where
		F: FnOnce(Result<Session, BranchError>) + Send + 'static,
	{
		let delivery = Delivery::new(Arc::clone(&self.main), completion);
		let manager = Arc::clone(&self.manager);
		let user_id = user_id.to_string();
		self.run(delivery, async move { manager.set_identity(&user_id).await });
	}

	pub fn logout<F>(&self, completion: F)
	where
		F: FnOnce(Result<Session, BranchError>) + Send + 'static,
	{
		let delivery = Delivery::new(Arc::clone(&self.main), completion);
		let manager = Arc::clone(&self.manager);
		self.run(delivery, async move { manager.logout().await });
	}

	/// Initializes with `url` on a cold start, otherwise routes it as a deep
	/// link into the current or pending session.
	fn open_url<F>(&self, url: &str, completion: F)
	where
		F: FnOnce(Result<Session, BranchError>) + Send + 'static,
	{
		if self.manager.state().needs_initialization() {
			self.initialize_with_url(Some(url), completion);
		} else {
			self.handle_deep_link(url, completion);
		}
	}

	fn bracketed<F>(&self, url: Option<String>, completion: F) -> Delivery
	where
		F: FnOnce(Result<Session, BranchError>) + Send + 'static,
	{
		self.events.post(SessionEvent::WillStartSession { url: url.clone() });
		Delivery::new(Arc::clone(&self.main), completion).with_event(self.events.clone(), url)
	}

	fn fail<F>(&self, err: BranchError, completion: F)
	where
		F: FnOnce(Result<Session, BranchError>) + Send + 'static,
	{
		Delivery::new(Arc::clone(&self.main), completion).deliver(Err(err));
	}

	fn run<Fut>(&self, delivery: Delivery, operation: Fut)
	where
		Fut: Future<Output = Result<Session, BranchError>> + Send + 'static,
	{
		self.runtime.spawn(async move {
			let result = operation.await;
			delivery.deliver(result);
		});
	}
}

/// One-shot handoff of an outcome to the main context.
///
/// Dropping an undelivered handoff (its task was cancelled or panicked)
/// delivers an error so the completion still runs exactly once.
struct Delivery {
	completion: Option<Completion>,
	main: Arc<dyn MainContext>,
	event: Option<(NotificationCenter, Option<String>)>,
}

impl Delivery {
	fn new<F>(main: Arc<dyn MainContext>, completion: F) -> Self
	where
		F: FnOnce(Result<Session, BranchError>) + Send + 'static,
	{
		Self {
			completion: Some(Box::new(completion)),
			main,
			event: None,
		}
	}

	fn with_event(mut self, events: NotificationCenter, url: Option<String>) -> Self {
		self.event = Some((events, url));
		self
	}

	fn deliver(mut self, result: Result<Session, BranchError>) {
		self.send(result);
	}

	fn send(&mut self, result: Result<Session, BranchError>) {
		let Some(completion) = self.completion.take() else {
			return;
		};
		if let Some((events, url)) = self.event.take() {
			events.post(SessionEvent::did_start(url, &result));
		}
		if let Err(err) = &result {
			debug!(target = "branch.coordinator", error = %err, code = err.code(), "delivering failure");
		}
		self.main.dispatch(Box::new(move || completion(result)));
	}
}

impl Drop for Delivery {
	fn drop(&mut self) {
		if self.completion.is_some() {
			warn!(target = "branch.coordinator", "session operation ended without a result");
			self.send(Err(BranchError::Unknown("session operation was cancelled".to_string())));
		}
	}
}
