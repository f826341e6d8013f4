//! Output of an identity/link resolution.

use serde::{Deserialize, Serialize};

use crate::link_data::LinkData;

/// What a resolver learned about this app run.
///
/// The session engine wraps this into a [`Session`](crate::Session) with its
/// own session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
	pub identity_id: String,
	pub device_fingerprint_id: String,
	#[serde(default)]
	pub is_first_session: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub link_data: Option<LinkData>,
	/// Set when the data came from the link simulator instead of a backend.
	#[serde(default)]
	pub simulated: bool,
}

impl SessionData {
	pub fn new(identity_id: impl Into<String>, device_fingerprint_id: impl Into<String>, is_first_session: bool) -> Self {
		Self {
			identity_id: identity_id.into(),
			device_fingerprint_id: device_fingerprint_id.into(),
			is_first_session,
			link_data: None,
			simulated: false,
		}
	}

	pub fn with_link_data(mut self, link_data: LinkData) -> Self {
		self.link_data = Some(link_data);
		self
	}

	pub fn simulated(mut self) -> Self {
		self.simulated = true;
		self
	}
}
