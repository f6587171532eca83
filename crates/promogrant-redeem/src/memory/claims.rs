//! In-memory claim store.
//!
//! Sets live in one mutex-guarded map shared by every handle, so an `add` is
//! a single check-and-insert under the lock. Nothing is ever evicted: a
//! claim that could be forgotten is not a claim.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::claim_store::{ClaimSet, ClaimStore, ClaimStoreError};

type Sets = HashMap<String, HashSet<String>>;

struct Shared {
    sets: Mutex<Sets>,
    offline: AtomicBool,
    /// Adds still allowed before the store goes offline.
    add_budget: AtomicUsize,
    open_handles: AtomicUsize,
}

/// Claim store held in process memory.
#[derive(Clone)]
pub struct MemoryClaimStore {
    shared: Arc<Shared>,
}

impl Default for MemoryClaimStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                sets: Mutex::new(HashMap::new()),
                offline: AtomicBool::new(false),
                add_budget: AtomicUsize::new(usize::MAX),
                open_handles: AtomicUsize::new(0),
            }),
        }
    }

    /// Simulate an outage: every acquire and set operation fails while
    /// `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
        if !offline {
            self.shared.add_budget.store(usize::MAX, Ordering::SeqCst);
        }
    }

    /// Allow `adds` more successful adds, then fail every later one.
    pub fn fail_after(&self, adds: usize) {
        self.shared.add_budget.store(adds, Ordering::SeqCst);
    }

    /// Handles acquired and not yet dropped.
    pub fn open_handles(&self) -> usize {
        self.shared.open_handles.load(Ordering::SeqCst)
    }

    /// Sorted members of the named set.
    pub fn members(&self, name: &str) -> Vec<String> {
        let sets = self
            .shared
            .sets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut members: Vec<String> = sets
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Total number of elements across all sets.
    pub fn total_claims(&self) -> usize {
        let sets = self
            .shared
            .sets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        sets.values().map(HashSet::len).sum()
    }
}

fn check_online(shared: &Shared) -> Result<(), ClaimStoreError> {
    if shared.offline.load(Ordering::SeqCst) {
        return Err(ClaimStoreError::Unavailable("store offline".to_string()));
    }
    Ok(())
}

fn lock(shared: &Shared) -> Result<MutexGuard<'_, Sets>, ClaimStoreError> {
    shared
        .sets
        .lock()
        .map_err(|_| ClaimStoreError::Unavailable("claim set lock poisoned".to_string()))
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    type Set = MemoryClaimSet;

    async fn acquire(&self, name: &str) -> Result<MemoryClaimSet, ClaimStoreError> {
        check_online(&self.shared).map_err(|err| ClaimStoreError::AcquireFailed {
            name: name.to_string(),
            reason: err.to_string(),
        })?;
        self.shared.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryClaimSet {
            name: name.to_string(),
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Handle to one set of a [`MemoryClaimStore`].
pub struct MemoryClaimSet {
    name: String,
    shared: Arc<Shared>,
}

impl Drop for MemoryClaimSet {
    fn drop(&mut self) {
        self.shared.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClaimSet for MemoryClaimSet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(&mut self, element: &str) -> Result<bool, ClaimStoreError> {
        check_online(&self.shared)?;
        let budget = self
            .shared
            .add_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if budget.is_err() {
            self.shared.offline.store(true, Ordering::SeqCst);
            return Err(ClaimStoreError::Unavailable("store offline".to_string()));
        }

        let mut sets = lock(&self.shared)?;
        let set = sets.entry(self.name.clone()).or_default();
        Ok(set.insert(element.to_string()))
    }

    async fn contains(&self, element: &str) -> Result<bool, ClaimStoreError> {
        check_online(&self.shared)?;
        let sets = lock(&self.shared)?;
        Ok(sets.get(&self.name).is_some_and(|set| set.contains(element)))
    }

    async fn cardinality(&self) -> Result<usize, ClaimStoreError> {
        check_online(&self.shared)?;
        let sets = lock(&self.shared)?;
        Ok(sets.get(&self.name).map_or(0, HashSet::len))
    }
}
