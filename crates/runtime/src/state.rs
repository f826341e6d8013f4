//! Session lifecycle state machine.
//!
//! ```text
//!                 +------------------------------+
//!                 v                              |
//!   Uninitialized -----> Initializing -----> Initialized(session)
//!         ^                  |   ^                 |
//!         +------------------+   +-----------------+
//!         +----------------------------------------+
//! ```
//!
//! Every state may also transition to itself, which is a no-op.

use std::fmt;

use branch_protocol::Session;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
	#[default]
	Uninitialized,
	Initializing,
	Initialized(Session),
}

/// Rejected state change carrying the attempted `(from, to)` pair.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid session state transition from {from} to {to}")]
pub struct InvalidStateTransition {
	pub from: SessionState,
	pub to: SessionState,
}

impl SessionState {
	/// Short name used in logs.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Uninitialized => "uninitialized",
			Self::Initializing => "initializing",
			Self::Initialized(_) => "initialized",
		}
	}

	/// Returns `true` when moving from `self` to `to` is legal.
	pub fn can_transition(&self, to: &SessionState) -> bool {
		use SessionState::*;

		matches!(
			(self, to),
			(Uninitialized, Uninitialized)
				| (Initializing, Initializing)
				| (Initialized(_), Initialized(_))
				| (Uninitialized, Initializing)
				| (Initializing, Uninitialized)
				| (Initializing, Initialized(_))
				| (Initialized(_), Uninitialized)
				| (Initialized(_), Initializing)
		)
	}

	/// Validates a transition and returns the target state.
	pub fn transition(&self, to: SessionState) -> Result<SessionState, InvalidStateTransition> {
		if self.can_transition(&to) {
			Ok(to)
		} else {
			Err(InvalidStateTransition { from: self.clone(), to })
		}
	}

	pub fn is_ready(&self) -> bool {
		matches!(self, Self::Initialized(_))
	}

	pub fn is_initializing(&self) -> bool {
		matches!(self, Self::Initializing)
	}

	pub fn needs_initialization(&self) -> bool {
		matches!(self, Self::Uninitialized)
	}

	pub fn session(&self) -> Option<&Session> {
		match self {
			Self::Initialized(session) => Some(session),
			_ => None,
		}
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Initialized(session) => write!(f, "initialized({})", session.id),
			other => f.write_str(other.name()),
		}
	}
}
