//! Publish/subscribe bus for session lifecycle notifications.
//!
//! The coordinator posts [`SessionEvent::WillStartSession`] before every
//! initialize or deep-link attempt and [`SessionEvent::DidStartSession`] once it
//! completes. The bus is an explicit value handed to the coordinator, so tests
//! can subscribe to exactly the instance under test.

use branch_protocol::{Session, keys};
use branch_runtime::BranchError;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::trace;

pub const WILL_START_SESSION: &str = "BranchWillStartSessionNotification";
pub const DID_START_SESSION: &str = "BranchDidStartSessionNotification";

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
	WillStartSession {
		url: Option<String>,
	},
	/// Posted after success or failure. `simulated` is set when the link data
	/// this attempt produced came from the link simulator; it does not imply
	/// network activity.
	DidStartSession {
		url: Option<String>,
		session_id: Option<String>,
		simulated: bool,
		error: Option<String>,
	},
}

impl SessionEvent {
	pub(crate) fn did_start(url: Option<String>, result: &Result<Session, BranchError>) -> Self {
		match result {
			Ok(session) => Self::DidStartSession {
				url,
				session_id: Some(session.id.clone()),
				simulated: session.link_is_simulated(),
				error: None,
			},
			Err(err) => Self::DidStartSession {
				url,
				session_id: None,
				simulated: false,
				error: Some(err.to_string()),
			},
		}
	}

	/// Notification name.
	pub fn name(&self) -> &'static str {
		match self {
			Self::WillStartSession { .. } => WILL_START_SESSION,
			Self::DidStartSession { .. } => DID_START_SESSION,
		}
	}

	/// Legacy payload dictionary.
	pub fn user_info(&self) -> Map<String, Value> {
		let mut info = Map::new();
		match self {
			Self::WillStartSession { url } => {
				if let Some(url) = url {
					info.insert(keys::URL.to_string(), Value::from(url.as_str()));
				}
			}
			Self::DidStartSession {
				url,
				session_id,
				simulated,
				error,
			} => {
				if let Some(url) = url {
					info.insert(keys::URL.to_string(), Value::from(url.as_str()));
				}
				if let Some(id) = session_id {
					info.insert(keys::SESSION_ID.to_string(), Value::from(id.as_str()));
				}
				info.insert(keys::SIMULATED.to_string(), Value::Bool(*simulated));
				if let Some(error) = error {
					info.insert("error".to_string(), Value::from(error.as_str()));
				}
			}
		}
		info
	}
}

/// Broadcast bus for [`SessionEvent`]s.
///
/// Cloning yields another handle to the same bus.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
	tx: broadcast::Sender<SessionEvent>,
}

impl NotificationCenter {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CAPACITY)
	}

	/// Creates a bus buffering up to `capacity` events per slow subscriber.
	pub fn with_capacity(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity);
		Self { tx }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.tx.subscribe()
	}

	/// Posts `event` to current subscribers. Posting with no subscribers is not
	/// an error.
	pub fn post(&self, event: SessionEvent) {
		let name = event.name();
		match self.tx.send(event) {
			Ok(receivers) => trace!(target = "branch.coordinator", event = name, receivers, "posted"),
			Err(_) => trace!(target = "branch.coordinator", event = name, "posted without subscribers"),
		}
	}
}

impl Default for NotificationCenter {
	fn default() -> Self {
		Self::new()
	}
}
