//! Immutable record of one logical app-open/identity cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::link_data::LinkData;

/// Prefix marking sessions synthesized by the link simulator.
pub const SIMULATED_ID_PREFIX: &str = "simulated-";

/// A resolved session.
///
/// Sessions are immutable: [`with_identity`](Self::with_identity),
/// [`without_identity`](Self::without_identity) and
/// [`with_link_data`](Self::with_link_data) return a new value that keeps the
/// same [`id`](Self::id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	pub id: String,
	pub created_at: DateTime<Utc>,
	pub identity_id: String,
	pub device_fingerprint_id: String,
	pub is_first_session: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub link_data: Option<LinkData>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
}

impl Session {
	/// Creates an anonymous session.
	///
	/// Empty identity or fingerprint ids are replaced with generated ones so a
	/// session never carries an empty identifier.
	pub fn new(id: impl Into<String>, identity_id: impl Into<String>, device_fingerprint_id: impl Into<String>, is_first_session: bool) -> Self {
		Self {
			id: id.into(),
			created_at: Utc::now(),
			identity_id: non_empty_or_generated(identity_id.into()),
			device_fingerprint_id: non_empty_or_generated(device_fingerprint_id.into()),
			is_first_session,
			link_data: None,
			user_id: None,
		}
	}

	pub fn with_identity(&self, user_id: impl Into<String>) -> Self {
		Self {
			user_id: Some(user_id.into()),
			..self.clone()
		}
	}

	pub fn without_identity(&self) -> Self {
		Self {
			user_id: None,
			..self.clone()
		}
	}

	pub fn with_link_data(&self, link_data: LinkData) -> Self {
		Self {
			link_data: Some(link_data),
			..self.clone()
		}
	}

	pub fn is_identified(&self) -> bool {
		self.user_id.is_some()
	}

	pub fn has_deep_link_data(&self) -> bool {
		self.link_data.is_some()
	}

	/// Returns `true` when the session came from the link simulator rather
	/// than a real resolution.
	pub fn is_simulated(&self) -> bool {
		self.id.starts_with(SIMULATED_ID_PREFIX)
	}

	/// Returns `true` when the latest link data came from the link simulator.
	/// Without link data this falls back to [`is_simulated`](Self::is_simulated).
	pub fn link_is_simulated(&self) -> bool {
		self.link_data.as_ref().map_or_else(|| self.is_simulated(), |link| link.simulated)
	}
}

fn non_empty_or_generated(value: String) -> String {
	if value.is_empty() { Uuid::new_v4().to_string() } else { value }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_identifiers_are_replaced() {
		let session = Session::new("s1", "", "", true);
		assert!(!session.identity_id.is_empty());
		assert!(!session.device_fingerprint_id.is_empty());
		assert_ne!(session.identity_id, session.device_fingerprint_id);
	}

	#[test]
	fn identity_changes_keep_session_id() {
		let session = Session::new("s1", "identity", "fingerprint", false);
		let identified = session.with_identity("u1");
		assert_eq!(identified.id, "s1");
		assert!(identified.is_identified());
		assert!(!session.is_identified());

		let anonymous = identified.without_identity();
		assert_eq!(anonymous.id, "s1");
		assert_eq!(anonymous.user_id, None);
	}

	#[test]
	fn link_data_marks_deep_link() {
		let session = Session::new("s1", "identity", "fingerprint", false);
		assert!(!session.has_deep_link_data());
		let linked = session.with_link_data(LinkData::from_url("https://example.app.link/x"));
		assert!(linked.has_deep_link_data());
		assert_eq!(linked.id, session.id);
	}

	#[test]
	fn simulated_prefix_is_detected() {
		assert!(Session::new("simulated-abc", "i", "f", false).is_simulated());
		assert!(!Session::new("abc", "i", "f", false).is_simulated());
	}

	#[test]
	fn link_origin_follows_latest_link_data() {
		let session = Session::new("abc", "i", "f", false);
		assert!(!session.link_is_simulated());

		let mut link = LinkData::from_url("https://example.app.link/summer");
		link.simulated = true;
		let linked = session.with_link_data(link);
		assert!(linked.link_is_simulated());
		assert!(!linked.is_simulated());

		let relinked = Session::new("simulated-abc", "i", "f", false).with_link_data(LinkData::from_url("https://example.app.link/x"));
		assert!(!relinked.link_is_simulated());
	}
}
