//! Options controlling a session initialization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Options for a single initialization request.
///
/// Built with `with_*` methods, each of which consumes the value and returns an
/// updated copy:
///
/// ```ignore
/// let options = InitializationOptions::new()
///     .with_url("https://example.app.link/summer-sale")
///     .with_source_application("com.apple.mobilesafari");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializationOptions {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scene_identifier: Option<String>,
	#[serde(default)]
	pub delay_initialization: bool,
	#[serde(default)]
	pub disable_automatic_session_tracking: bool,
	#[serde(default = "default_check_pasteboard")]
	pub check_pasteboard_on_install: bool,
	#[serde(default)]
	pub referral_params: HashMap<String, String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_application: Option<String>,
}

fn default_check_pasteboard() -> bool {
	true
}

impl Default for InitializationOptions {
	fn default() -> Self {
		Self {
			url: None,
			scene_identifier: None,
			delay_initialization: false,
			disable_automatic_session_tracking: false,
			check_pasteboard_on_install: default_check_pasteboard(),
			referral_params: HashMap::new(),
			source_application: None,
		}
	}
}

impl InitializationOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = Some(url.into());
		self
	}

	pub fn with_scene_identifier(mut self, scene_identifier: impl Into<String>) -> Self {
		self.scene_identifier = Some(scene_identifier.into());
		self
	}

	pub fn with_delay_initialization(mut self, delay: bool) -> Self {
		self.delay_initialization = delay;
		self
	}

	pub fn with_disable_automatic_session_tracking(mut self, disable: bool) -> Self {
		self.disable_automatic_session_tracking = disable;
		self
	}

	pub fn with_check_pasteboard_on_install(mut self, check: bool) -> Self {
		self.check_pasteboard_on_install = check;
		self
	}

	/// Replaces the referral parameters.
	pub fn with_referral_params(mut self, params: HashMap<String, String>) -> Self {
		self.referral_params = params;
		self
	}

	pub fn with_source_application(mut self, source: impl Into<String>) -> Self {
		self.source_application = Some(source.into());
		self
	}

	/// Folds a newer request into this one.
	///
	/// The newer URL wins when present, referral params are unioned with the
	/// newer value winning on collision, and remaining optional fields are only
	/// filled when still unset.
	pub fn merged_with(&self, newer: &InitializationOptions) -> Self {
		let mut merged = self.clone();
		if newer.url.is_some() {
			merged.url = newer.url.clone();
		}
		if merged.scene_identifier.is_none() {
			merged.scene_identifier = newer.scene_identifier.clone();
		}
		if merged.source_application.is_none() {
			merged.source_application = newer.source_application.clone();
		}
		merged.referral_params.extend(newer.referral_params.iter().map(|(k, v)| (k.clone(), v.clone())));
		merged
	}
}
