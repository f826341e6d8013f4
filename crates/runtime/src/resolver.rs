//! Identity and link resolution contract.
//!
//! The engine never talks to a backend directly. Whatever negotiates identity
//! and resolves links (a network client, the link simulator, a test double)
//! implements [`SessionResolver`]. Failures are expected to map onto
//! [`BranchError::NetworkError`](crate::BranchError::NetworkError),
//! [`Timeout`](crate::BranchError::Timeout),
//! [`ServerError`](crate::BranchError::ServerError) or
//! [`InvalidResponse`](crate::BranchError::InvalidResponse). The engine does
//! not retry.

use std::sync::Arc;

use async_trait::async_trait;
use branch_protocol::{InitializationOptions, SessionData};

use crate::error::Result;

#[async_trait]
pub trait SessionResolver: Send + Sync {
	/// Resolves identity, and link data when `options.url` is set.
	async fn resolve(&self, options: &InitializationOptions) -> Result<SessionData>;
}

#[async_trait]
impl<T> SessionResolver for Arc<T>
where
	T: SessionResolver + ?Sized,
{
	async fn resolve(&self, options: &InitializationOptions) -> Result<SessionData> {
		(**self).resolve(options).await
	}
}
