//! Value types for Branch sessions.
//!
//! This crate contains the serde-serializable types exchanged between the
//! session engine, its resolvers, and legacy call sites. These types represent
//! the "data layer" - the shapes of a session and its deep-link payload.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond construction, accessors, and serialization
//! * Immutable: "Mutation" returns a new value
//! * Stable: Legacy key names in [`keys`] never change
//!
//! The session state machine and coordination engine are built on top of these
//! types in `branch-runtime`.

pub mod keys;
pub mod link_data;
pub mod options;
pub mod session;
pub mod session_data;

pub use link_data::*;
pub use options::*;
pub use session::*;
pub use session_data::*;
