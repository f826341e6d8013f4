use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use branch_protocol::{InitializationOptions, LinkData, SessionData};
use branch_runtime::{Result, SessionResolver};
use uuid::Uuid;

/// Network-free resolver for local development.
///
/// Identity and fingerprint ids are generated once and stay stable for the
/// resolver's lifetime. Only the first resolution reports a first session.
/// Link data comes straight from the URL's query string.
pub struct OfflineResolver {
	identity_id: String,
	device_fingerprint_id: String,
	resolved: AtomicBool,
}

impl OfflineResolver {
	pub fn new() -> Self {
		Self::with_ids(Uuid::new_v4().to_string(), Uuid::new_v4().to_string())
	}

	pub fn with_ids(identity_id: impl Into<String>, device_fingerprint_id: impl Into<String>) -> Self {
		Self {
			identity_id: identity_id.into(),
			device_fingerprint_id: device_fingerprint_id.into(),
			resolved: AtomicBool::new(false),
		}
	}
}

impl Default for OfflineResolver {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl SessionResolver for OfflineResolver {
	async fn resolve(&self, options: &InitializationOptions) -> Result<SessionData> {
		let first = !self.resolved.swap(true, Ordering::SeqCst);
		let data = SessionData::new(self.identity_id.clone(), self.device_fingerprint_id.clone(), first);
		Ok(match options.url.as_deref() {
			Some(url) => data.with_link_data(LinkData::from_url(url)),
			None => data,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn ids_are_stable_and_only_first_resolution_is_first_session() {
		let resolver = OfflineResolver::with_ids("identity", "fingerprint");

		let first = resolver.resolve(&InitializationOptions::new()).await.unwrap();
		let second = resolver.resolve(&InitializationOptions::new().with_url("https://example.app.link/x?~campaign=c")).await.unwrap();

		assert!(first.is_first_session);
		assert!(!second.is_first_session);
		assert_eq!(second.identity_id, "identity");
		assert_eq!(second.device_fingerprint_id, "fingerprint");
		assert_eq!(second.link_data.unwrap().campaign.as_deref(), Some("c"));
		assert!(!second.simulated);
	}
}
