//! Bridge to call sites written against the flat legacy params dictionary.
//!
//! Legacy consumers read one `String -> Value` map instead of [`Session`]. The
//! modern coordinator is opt-in through [`FeatureFlags`]; with the flag off,
//! [`initialize_legacy`] leaves the call to the legacy path.

use branch_protocol::{LinkData, Session, keys};
use branch_runtime::BranchError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::coordinator::BranchSessionCoordinator;

/// Runtime switches for the migration to the modern session manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
	pub use_modern_session_manager: bool,
}

/// Flattens `session` into the legacy params dictionary.
///
/// Custom link parameters come first; reserved keys are written afterwards
/// and win on collision.
pub fn params_from_session(session: &Session) -> Map<String, Value> {
	let mut params = session.link_data.as_ref().map(|link| link.parameters.clone()).unwrap_or_default();

	params.insert(keys::SESSION_ID.to_string(), Value::from(session.id.as_str()));
	params.insert(keys::IDENTITY_ID.to_string(), Value::from(session.identity_id.as_str()));
	params.insert(keys::DEVICE_FINGERPRINT_ID.to_string(), Value::from(session.device_fingerprint_id.as_str()));
	params.insert(keys::IS_FIRST_SESSION.to_string(), Value::Bool(session.is_first_session));
	if let Some(user_id) = &session.user_id {
		params.insert(keys::USER_ID.to_string(), Value::from(user_id.as_str()));
	}

	match &session.link_data {
		Some(link) => params.extend(link_params(link)),
		None => {
			params.insert(keys::CLICKED_BRANCH_LINK.to_string(), Value::Bool(false));
		}
	}
	params
}

/// Reserved keys describing `link`.
pub fn link_params(link: &LinkData) -> Map<String, Value> {
	let mut params = Map::new();
	params.insert(keys::CLICKED_BRANCH_LINK.to_string(), Value::Bool(link.is_clicked));

	let optional = [
		(keys::REFERRING_LINK, &link.referring_link),
		(keys::CAMPAIGN, &link.campaign),
		(keys::CHANNEL, &link.channel),
		(keys::FEATURE, &link.feature),
		(keys::STAGE, &link.stage),
		(keys::URL, &link.url),
	];
	for (key, value) in optional {
		if let Some(value) = value {
			params.insert(key.to_string(), Value::from(value.as_str()));
		}
	}
	if !link.tags.is_empty() {
		params.insert(keys::TAGS.to_string(), Value::from(link.tags.clone()));
	}
	params
}

/// Routes a legacy initialization through the coordinator when the modern
/// manager is enabled.
///
/// Returns `false`, without calling `completion`, when the flag is off and
/// the caller should fall back to its legacy path.
pub fn initialize_legacy<F>(flags: FeatureFlags, coordinator: &BranchSessionCoordinator, url: Option<&str>, completion: F) -> bool
where
	F: FnOnce(Result<Map<String, Value>, BranchError>) + Send + 'static,
{
	if !flags.use_modern_session_manager {
		debug!(target = "branch.coordinator", "modern session manager disabled; deferring to legacy path");
		return false;
	}
	coordinator.initialize_with_url(url, move |result| completion(result.map(|session| params_from_session(&session))));
	true
}
