//! Storage-backed execution lock.
//!
//! A lock is a record keyed by owner name. Acquisition never waits: when the
//! record already exists the caller is told to skip its run. Every daemon takes
//! the lock named after itself, so at most one instance of a daemon runs at a
//! time across all tasks and processes that share the store.

use crate::runtime::clock::{Clock, SystemClock};
use crate::store::{LockRecord, LockStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("acquisition of lock {owner} cancelled")]
    Cancelled { owner: String },
    #[error("lock {owner} storage failure: {source}")]
    Store {
        owner: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Clone)]
pub struct ExecutionLock {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    lease: Option<Duration>,
}

impl ExecutionLock {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            lease: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Lets an acquirer take over a record older than `lease`, so a holder
    /// that crashed without releasing does not block the lock forever.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn lease(&self) -> Option<Duration> {
        self.lease
    }

    /// Tries to take the lock for `owner`.
    ///
    /// `Ok(None)` means another run holds it and this one should be skipped.
    /// The token is checked before the record is written; once the insert has
    /// started it runs to completion so a cancelled caller never leaves a
    /// record behind without a guard.
    pub async fn acquire(
        &self,
        token: &CancellationToken,
        owner: &str,
    ) -> Result<Option<LockGuard>, LockError> {
        if token.is_cancelled() {
            return Err(LockError::Cancelled {
                owner: owner.to_owned(),
            });
        }

        let now = self.clock.now_unix();
        let stale_before = self.lease.map(|lease| {
            let lease_secs = i64::try_from(lease.as_secs()).unwrap_or(i64::MAX);
            now.saturating_sub(lease_secs)
        });
        let record = LockRecord {
            owner: owner.to_owned(),
            acquired_at: now,
        };

        let held = self
            .store
            .try_insert_lock(record, stale_before)
            .await
            .map_err(|source| {
                tracing::error!(owner, error = %source, "failed to acquire execution lock");
                LockError::Store {
                    owner: owner.to_owned(),
                    source,
                }
            })?;

        if !held {
            tracing::debug!(owner, "execution lock held elsewhere; skipping run");
            return Ok(None);
        }

        Ok(Some(LockGuard {
            store: self.store.clone(),
            owner: owner.to_owned(),
            acquired_at: now,
            released: false,
        }))
    }

    /// Deletes the record for `owner` regardless of who created it.
    pub async fn release(&self, owner: &str) -> Result<(), LockError> {
        release_record(self.store.as_ref(), owner, None).await
    }
}

async fn release_record(
    store: &dyn LockStore,
    owner: &str,
    acquired_at: Option<i64>,
) -> Result<(), LockError> {
    let removed = store
        .delete_lock(owner, acquired_at)
        .await
        .map_err(|source| {
            tracing::error!(owner, error = %source, "failed to release execution lock");
            LockError::Store {
                owner: owner.to_owned(),
                source,
            }
        })?;

    if !removed && acquired_at.is_some() {
        tracing::warn!(
            owner,
            acquired_at,
            "execution lock was taken over after its lease expired; leaving the new holder's record"
        );
    }
    Ok(())
}

/// Proof that the lock is held. Call [`LockGuard::release`] on every exit
/// path; a guard dropped without it releases from a background task.
#[must_use = "dropping the guard releases the lock in the background"]
pub struct LockGuard {
    store: Arc<dyn LockStore>,
    owner: String,
    acquired_at: i64,
    released: bool,
}

impl LockGuard {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Deletes the lock record. Failures are logged and returned; work done
    /// under the lock is not affected.
    /// Unix seconds written into the lock record by this acquisition.
    pub fn acquired_at(&self) -> i64 {
        self.acquired_at
    }

    /// Deletes the lock record if it is still the one this guard created.
    /// Failures are logged and returned; work done under the lock is not
    /// affected.
    pub async fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        release_record(self.store.as_ref(), &self.owner, Some(self.acquired_at)).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let store = self.store.clone();
        let owner = std::mem::take(&mut self.owner);
        let acquired_at = self.acquired_at;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(owner = %owner, "execution lock guard dropped; releasing in background");
                handle.spawn(async move {
                    let _ = release_record(store.as_ref(), &owner, Some(acquired_at)).await;
                });
            }
            Err(_) => {
                tracing::error!(
                    owner = %owner,
                    "execution lock guard dropped outside a runtime; lock record left in place"
                );
            }
        }
    }
}
