//! Error taxonomy for the session engine.
//!
//! Every variant carries a stable numeric code grouped by category:
//!
//! | Range | Category      |
//! |-------|---------------|
//! | 1xxx  | configuration |
//! | 2xxx  | network       |
//! | 3xxx  | state         |
//! | 4xxx  | link          |
//! | 5xxx  | identity      |
//! | 6xxx  | event         |
//! | 7xxx  | storage       |
//! | 9xxx  | general       |
//!
//! Errors are `Clone` so a single resolution outcome can be fanned out to every
//! coalesced caller unchanged.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::state::InvalidStateTransition;

/// Error domain reported to callback-style call sites.
pub const ERROR_DOMAIN: &str = "io.branch.sdk";

/// Result alias used across the runtime.
pub type Result<T> = std::result::Result<T, BranchError>;

#[derive(Debug, Clone, Error)]
pub enum BranchError {
	#[error("Invalid configuration: {0}")]
	InvalidConfiguration(String),

	#[error("Branch session is not initialized")]
	NotInitialized,

	#[error("Branch session is already initialized")]
	AlreadyInitialized,

	#[error("Network error: {0}")]
	NetworkError(String),

	#[error("The request timed out")]
	Timeout,

	#[error("Server error {status_code}: {message}")]
	ServerError { status_code: u16, message: String },

	#[error("Invalid response: {0}")]
	InvalidResponse(String),

	#[error(transparent)]
	InvalidStateTransition(Box<InvalidStateTransition>),

	#[error("A session is required for this operation; call initialize first")]
	SessionRequired,

	#[error("Invalid URL: {0}")]
	InvalidUrl(String),

	#[error("No URL provided")]
	NoUrlProvided,

	#[error("Link creation failed: {0}")]
	LinkCreationFailed(String),

	#[error("Invalid user activity: expected a web browsing activity with a webpage URL")]
	InvalidUserActivity,

	#[error("Invalid identity: user id must not be empty")]
	InvalidIdentity,

	#[error("Invalid event: {0}")]
	InvalidEvent(String),

	#[error("Event tracking failed: {0}")]
	EventTrackingFailed(String),

	#[error("Storage error: {0}")]
	StorageError(String),

	#[error("Unknown error: {0}")]
	Unknown(String),

	#[error(transparent)]
	Underlying(Arc<dyn std::error::Error + Send + Sync>),
}

/// Coarse grouping of [`BranchError`] codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
	Configuration,
	Network,
	State,
	Link,
	Identity,
	Event,
	Storage,
	General,
}

impl fmt::Display for ErrorCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Configuration => "configuration",
			Self::Network => "network",
			Self::State => "state",
			Self::Link => "link",
			Self::Identity => "identity",
			Self::Event => "event",
			Self::Storage => "storage",
			Self::General => "general",
		};
		f.write_str(name)
	}
}

impl BranchError {
	/// Wraps an arbitrary error.
	pub fn underlying<E>(err: E) -> Self
	where
		E: std::error::Error + Send + Sync + 'static,
	{
		Self::Underlying(Arc::new(err))
	}

	/// Stable numeric code.
	pub fn code(&self) -> u32 {
		match self {
			Self::InvalidConfiguration(_) => 1000,
			Self::NotInitialized => 1001,
			Self::AlreadyInitialized => 1002,
			Self::NetworkError(_) => 2000,
			Self::Timeout => 2001,
			Self::ServerError { .. } => 2002,
			Self::InvalidResponse(_) => 2003,
			Self::InvalidStateTransition(_) => 3000,
			Self::SessionRequired => 3001,
			Self::InvalidUrl(_) => 4000,
			Self::NoUrlProvided => 4001,
			Self::LinkCreationFailed(_) => 4002,
			Self::InvalidUserActivity => 4003,
			Self::InvalidIdentity => 5000,
			Self::InvalidEvent(_) => 6000,
			Self::EventTrackingFailed(_) => 6001,
			Self::StorageError(_) => 7000,
			Self::Unknown(_) => 9000,
			Self::Underlying(_) => 9001,
		}
	}

	pub fn category(&self) -> ErrorCategory {
		match self.code() / 1000 {
			1 => ErrorCategory::Configuration,
			2 => ErrorCategory::Network,
			3 => ErrorCategory::State,
			4 => ErrorCategory::Link,
			5 => ErrorCategory::Identity,
			6 => ErrorCategory::Event,
			7 => ErrorCategory::Storage,
			_ => ErrorCategory::General,
		}
	}

	pub fn domain(&self) -> &'static str {
		ERROR_DOMAIN
	}

	/// Returns `true` for failures reported by the resolution backend.
	pub fn is_network(&self) -> bool {
		self.category() == ErrorCategory::Network
	}
}

impl From<InvalidStateTransition> for BranchError {
	fn from(err: InvalidStateTransition) -> Self {
		Self::InvalidStateTransition(Box::new(err))
	}
}
