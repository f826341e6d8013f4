//! Deep-link payload attached to a session.

use std::ops::Index;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::keys;

static NULL: Value = Value::Null;

/// Resolved attribution and routing data for a deep link.
///
/// `parameters` holds the dynamic key/value payload configured on the link;
/// `raw_data` preserves whatever the resolution step returned verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkData {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(default)]
	pub is_clicked: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub referring_link: Option<String>,
	#[serde(default)]
	pub parameters: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub campaign: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub channel: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub feature: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stage: Option<String>,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub raw_data: Map<String, Value>,
	/// Set when the link simulator produced this data instead of a resolver.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub simulated: bool,
}

impl LinkData {
	/// Builds link data for a clicked URL.
	///
	/// Query parameters are copied into [`parameters`](Self::parameters) as
	/// strings. Analytics fields are picked up from either their reserved
	/// form (`~campaign`) or their bare form (`campaign`). A URL that does not
	/// parse still yields link data carrying the raw string.
	pub fn from_url(url: &str) -> Self {
		let mut data = Self {
			url: Some(url.to_string()),
			is_clicked: true,
			referring_link: Some(url.to_string()),
			..Default::default()
		};

		let Ok(parsed) = url::Url::parse(url) else {
			return data;
		};

		for (key, value) in parsed.query_pairs() {
			data.parameters.insert(key.to_string(), Value::String(value.to_string()));
		}

		data.campaign = data.reserved_or_bare(keys::CAMPAIGN);
		data.channel = data.reserved_or_bare(keys::CHANNEL);
		data.feature = data.reserved_or_bare(keys::FEATURE);
		data.stage = data.reserved_or_bare(keys::STAGE);
		if let Some(tags) = data.reserved_or_bare(keys::TAGS) {
			data.tags = tags.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect();
		}
		data.raw_data = data.parameters.clone();
		data
	}

	fn reserved_or_bare(&self, reserved: &str) -> Option<String> {
		let bare = reserved.trim_start_matches('~');
		self.string(reserved).or_else(|| self.string(bare)).map(String::from)
	}

	/// Returns the raw parameter value for `key`.
	pub fn value(&self, key: &str) -> Option<&Value> {
		self.parameters.get(key)
	}

	pub fn string(&self, key: &str) -> Option<&str> {
		self.value(key).and_then(Value::as_str)
	}

	pub fn int(&self, key: &str) -> Option<i64> {
		self.value(key).and_then(Value::as_i64)
	}

	pub fn bool(&self, key: &str) -> Option<bool> {
		self.value(key).and_then(Value::as_bool)
	}

	pub fn dictionary(&self, key: &str) -> Option<&Map<String, Value>> {
		self.value(key).and_then(Value::as_object)
	}

	pub fn array(&self, key: &str) -> Option<&Vec<Value>> {
		self.value(key).and_then(Value::as_array)
	}

	/// Deserializes the parameter at `key` into `T`.
	///
	/// Returns `None` when the key is missing or the value has a different shape.
	pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
		self.value(key).and_then(|value| serde_json::from_value(value.clone()).ok())
	}
}

impl Index<&str> for LinkData {
	type Output = Value;

	/// Yields `Value::Null` for missing keys.
	fn index(&self, key: &str) -> &Value {
		self.parameters.get(key).unwrap_or(&NULL)
	}
}
