//! In-memory record of resolver traffic for debugging.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkLogEntry {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub url: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub request_body: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub response_body: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status_code: Option<u16>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Append-only log, disabled by default.
#[derive(Debug, Default)]
pub struct NetworkLog {
	enabled: AtomicBool,
	entries: Mutex<Vec<NetworkLogEntry>>,
}

impl NetworkLog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn enable(&self) {
		self.enabled.store(true, Ordering::SeqCst);
	}

	/// Stops recording. Existing entries are kept.
	pub fn disable(&self) {
		self.enabled.store(false, Ordering::SeqCst);
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled.load(Ordering::SeqCst)
	}

	pub fn clear(&self) {
		self.entries.lock().clear();
	}

	pub fn entries(&self) -> Vec<NetworkLogEntry> {
		self.entries.lock().clone()
	}

	/// Appends an entry. Returns `None` without recording while disabled.
	pub fn record(
		&self,
		url: impl Into<String>,
		request_body: Option<Value>,
		response_body: Option<Value>,
		status_code: Option<u16>,
		error: Option<String>,
	) -> Option<Uuid> {
		if !self.is_enabled() {
			return None;
		}
		let entry = NetworkLogEntry {
			id: Uuid::new_v4(),
			timestamp: Utc::now(),
			url: url.into(),
			request_body,
			response_body,
			status_code,
			error,
		};
		let id = entry.id;
		debug!(target = "branch.simulator", %id, url = %entry.url, status = ?entry.status_code, "network request recorded");
		self.entries.lock().push(entry);
		Some(id)
	}
}
