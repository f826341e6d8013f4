//! Session lifecycle engine for Branch deep linking.
//!
//! This crate owns the "who is this app run, and what link brought the user
//! here" question:
//!
//! - [`SessionState`] - the uninitialized/initializing/initialized machine
//! - [`SessionManager`] - the single writer of that state, coalescing
//!   overlapping initialization and deep-link requests into one resolution
//! - [`SessionResolver`] - the contract for whatever resolves identity and links
//! - [`BranchError`] - the error taxonomy with stable numeric codes

pub mod error;
pub mod fake_resolver;
pub mod manager;
pub mod resolver;
pub mod state;

pub use error::{BranchError, ERROR_DOMAIN, ErrorCategory, Result};
pub use fake_resolver::{FakeResolver, FakeResolverBuilder, FakeResolverController};
pub use manager::{SessionManager, SessionManagerBuilder, StateStream};
pub use resolver::SessionResolver;
pub use state::{InvalidStateTransition, SessionState};
