//! In-memory backend with failure injection.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
};

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::{
    dao::{
        group_store::GroupBackend,
        storage::{StorageError, StorageResult},
    },
    state::groups::GroupCollection,
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct InjectedFailure(&'static str);

#[derive(Default)]
struct Inner {
    groups: Mutex<GroupCollection>,
    history: Mutex<Vec<GroupCollection>>,
    pending_failures: AtomicU32,
    unavailable: AtomicBool,
    save_attempts: AtomicUsize,
}

/// Group backend keeping the collection in memory.
///
/// Clones share the same storage, so a test can keep one handle to inspect
/// what the application wrote through another.
#[derive(Clone, Default)]
pub struct MemoryGroupStore {
    inner: Arc<Inner>,
}

impl MemoryGroupStore {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-populated with `groups`.
    pub fn with_groups(groups: GroupCollection) -> Self {
        Self {
            inner: Arc::new(Inner {
                groups: Mutex::new(groups),
                ..Inner::default()
            }),
        }
    }

    /// Make the next `count` saves fail.
    pub fn fail_next_saves(&self, count: u32) {
        self.inner.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Make every call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of save attempts seen so far, failed ones included.
    pub fn save_count(&self) -> usize {
        self.inner.save_attempts.load(Ordering::SeqCst)
    }

    /// Collection as currently stored.
    pub async fn stored(&self) -> GroupCollection {
        self.inner.groups.lock().await.clone()
    }

    /// Every successfully stored collection, oldest first.
    pub async fn history(&self) -> Vec<GroupCollection> {
        self.inner.history.lock().await.clone()
    }
}

impl Inner {
    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store offline".into(),
                InjectedFailure("offline"),
            ));
        }
        Ok(())
    }

    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl GroupBackend for MemoryGroupStore {
    fn load_groups(&self) -> BoxFuture<'static, StorageResult<GroupCollection>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.check_available()?;
            Ok(inner.groups.lock().await.clone())
        })
    }

    fn save_groups(&self, groups: GroupCollection) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.save_attempts.fetch_add(1, Ordering::SeqCst);
            inner.check_available()?;
            if inner.take_failure() {
                return Err(StorageError::unavailable(
                    "injected save failure".into(),
                    InjectedFailure("save failed"),
                ));
            }
            *inner.groups.lock().await = groups.clone();
            inner.history.lock().await.push(groups);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.check_available() })
    }
}
