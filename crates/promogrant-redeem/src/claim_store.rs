//! Claim store: named sets with atomic add, the exactly-once primitive.
//!
//! Each promotion owns two sets:
//!
//! - `promotion:<id>:grants`: grant ids already redeemed
//! - `promotion:<id>:wallets`: wallet provider ids already funded
//!
//! [`ClaimSet::add`] is the only mutation. It reports whether the element was
//! newly inserted, and concurrent adds of one element to one set must have
//! exactly one winner. Claims are never removed.

use async_trait::async_trait;
use thiserror::Error;

/// Failure talking to the claim store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimStoreError {
    #[error("claim store unavailable: {0}")]
    Unavailable(String),

    #[error("claim set {name} could not be acquired: {reason}")]
    AcquireFailed { name: String, reason: String },
}

/// Source of named claim sets.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    type Set: ClaimSet;

    /// Acquire a handle to the named set. The handle is released when it is
    /// dropped, on every path.
    async fn acquire(&self, name: &str) -> Result<Self::Set, ClaimStoreError>;
}

/// Handle to one named set.
#[async_trait]
pub trait ClaimSet: Send + Sync {
    /// Name the handle was acquired under.
    fn name(&self) -> &str;

    /// Insert `element`. Returns `true` if it was not already present.
    async fn add(&mut self, element: &str) -> Result<bool, ClaimStoreError>;

    async fn contains(&self, element: &str) -> Result<bool, ClaimStoreError>;

    /// Number of elements in the set.
    async fn cardinality(&self) -> Result<usize, ClaimStoreError>;
}
