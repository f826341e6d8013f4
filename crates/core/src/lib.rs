//! Branch deep-link session coordination.
//!
//! Builds on the `branch-runtime` session engine with the pieces an app
//! integrates against:
//!
//! - [`BranchSessionCoordinator`] - completion-callback API delivering on the
//!   main context, with will/did start events
//! - [`BranchLinkSimulator`] - local link registry and network log
//! - [`integration`] - legacy params dictionary and the modern-manager flag
//! - [`Branch`] - everything wired together from a [`BranchConfig`]

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod integration;
pub mod main_queue;
pub mod simulator;

pub use branch_protocol::{InitializationOptions, LinkData, SIMULATED_ID_PREFIX, Session, SessionData, keys};
pub use branch_runtime::{BranchError, SessionManager, SessionResolver, SessionState};
pub use client::{Branch, BranchBuilder};
pub use config::{BranchConfig, SimulatorConfig};
pub use coordinator::{ACTIVITY_TYPE_BROWSING_WEB, BranchSessionCoordinator, UserActivity};
pub use error::{ConfigError, SimulatorError};
pub use events::{NotificationCenter, SessionEvent};
pub use integration::FeatureFlags;
pub use main_queue::{MainContext, MainQueue};
pub use simulator::{BranchLinkSimulator, NetworkLogEntry, OfflineResolver, SimulatedLink, SimulatingResolver};
