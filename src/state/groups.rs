//! Group collection model and the store that keeps it in sync with persistence.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::{error::ServiceError, services::persistence_gateway::PersistenceGateway};

/// Upper bound for the delay between two save attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Ordered mapping from group name to its ordered option labels.
///
/// Group order follows insertion and option order decides the wheel sector
/// each option occupies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupCollection(IndexMap<String, Vec<String>>);

impl GroupCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from raw persisted entries, dropping anything that
    /// breaks the collection invariants.
    ///
    /// Names and labels are trimmed; blank names, blank labels, repeated
    /// labels and repeated group names are discarded. Returns the collection
    /// and the number of discarded entries.
    pub fn sanitize(raw: IndexMap<String, Vec<String>>) -> (Self, usize) {
        let mut groups = IndexMap::with_capacity(raw.len());
        let mut dropped = 0;

        for (name, options) in raw {
            let name = name.trim();
            if name.is_empty() || groups.contains_key(name) {
                dropped += 1 + options.len();
                continue;
            }

            let mut kept: Vec<String> = Vec::with_capacity(options.len());
            for option in options {
                let option = option.trim();
                if option.is_empty() || kept.iter().any(|existing| existing == option) {
                    dropped += 1;
                    continue;
                }
                kept.push(option.to_string());
            }
            groups.insert(name.to_string(), kept);
        }

        (Self(groups), dropped)
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the collection holds no group at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a group with exactly this name exists.
    pub fn contains(&self, group: &str) -> bool {
        self.0.contains_key(group)
    }

    /// Options of a group, in wheel order.
    pub fn options(&self, group: &str) -> Option<&[String]> {
        self.0.get(group).map(Vec::as_slice)
    }

    /// Group names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over `(group, options)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, options)| (name.as_str(), options.as_slice()))
    }

    /// Consume the collection into its raw mapping.
    pub fn into_inner(self) -> IndexMap<String, Vec<String>> {
        self.0
    }

    fn insert_group(&mut self, name: &str) -> Result<String, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::DuplicateGroup(String::new()));
        }
        if self.0.contains_key(name) {
            return Err(ServiceError::DuplicateGroup(name.to_string()));
        }
        self.0.insert(name.to_string(), Vec::new());
        Ok(name.to_string())
    }

    fn remove_group(&mut self, name: &str) -> Result<Vec<String>, ServiceError> {
        // shift_remove keeps the remaining groups in their display order
        self.0
            .shift_remove(name)
            .ok_or_else(|| ServiceError::GroupNotFound(name.to_string()))
    }

    fn push_option(&mut self, group: &str, text: &str) -> Result<usize, ServiceError> {
        let options = self
            .0
            .get_mut(group)
            .ok_or_else(|| ServiceError::GroupNotFound(group.to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::EmptyOption);
        }
        if options.iter().any(|existing| existing == text) {
            return Err(ServiceError::DuplicateOption {
                group: group.to_string(),
                option: text.to_string(),
            });
        }

        options.push(text.to_string());
        Ok(options.len() - 1)
    }

    fn remove_option(&mut self, group: &str, index: usize) -> Result<String, ServiceError> {
        let options = self
            .0
            .get_mut(group)
            .ok_or_else(|| ServiceError::GroupNotFound(group.to_string()))?;

        if index >= options.len() {
            return Err(ServiceError::IndexOutOfRange {
                group: group.to_string(),
                index,
                len: options.len(),
            });
        }

        Ok(options.remove(index))
    }
}

impl From<IndexMap<String, Vec<String>>> for GroupCollection {
    fn from(value: IndexMap<String, Vec<String>>) -> Self {
        Self::sanitize(value).0
    }
}

impl<'de> Deserialize<'de> for GroupCollection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        IndexMap::<String, Vec<String>>::deserialize(deserializer).map(Self::from)
    }
}

/// How many times a write is attempted before the failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per write, including the first one.
    pub attempts: u32,
    /// Delay before the second attempt; doubled afterwards.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(250),
        }
    }
}

/// Authoritative in-memory owner of the [`GroupCollection`].
///
/// Every successful mutation writes the whole collection through the
/// [`PersistenceGateway`]. Writes are awaited one at a time, so storage always
/// observes revisions in the order they were produced.
///
/// When the stored collection could not be read, the store holds nothing and
/// refuses every mutation until a later read succeeds, so an unreadable
/// document is never replaced by a partial one.
pub struct GroupStore {
    groups: GroupCollection,
    gateway: PersistenceGateway,
    retry: RetryPolicy,
    revision: u64,
    durable_revision: u64,
    loaded: bool,
}

impl GroupStore {
    /// Load the persisted collection through the gateway and take ownership of it.
    ///
    /// A failed read leaves the store empty and read-only; see [`GroupStore::is_loaded`].
    pub async fn load(gateway: PersistenceGateway, retry: RetryPolicy) -> Self {
        match gateway.get_options().await {
            Ok(groups) => {
                info!(groups = groups.len(), "group store loaded");
                Self::with_groups(gateway, retry, groups)
            }
            Err(err) => {
                warn!(error = %err, "failed to load persisted groups; changes are refused until storage can be read");
                let mut store = Self::with_groups(gateway, retry, GroupCollection::new());
                store.loaded = false;
                store
            }
        }
    }

    /// Build a store around an already loaded collection.
    pub fn with_groups(
        gateway: PersistenceGateway,
        retry: RetryPolicy,
        groups: GroupCollection,
    ) -> Self {
        Self {
            groups,
            gateway,
            retry,
            revision: 0,
            durable_revision: 0,
            loaded: true,
        }
    }

    /// Immutable copy of the whole collection.
    pub fn snapshot(&self) -> GroupCollection {
        self.groups.clone()
    }

    /// Copy of the options of one group.
    pub fn options(&self, group: &str) -> Result<Vec<String>, ServiceError> {
        self.groups
            .options(group)
            .map(<[String]>::to_vec)
            .ok_or_else(|| ServiceError::GroupNotFound(group.to_string()))
    }

    /// Whether a group with this name exists.
    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Group names in display order.
    pub fn group_names(&self) -> Vec<String> {
        self.groups.names().map(str::to_string).collect()
    }

    /// Revision of the in-memory collection; bumped by every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether storage holds the latest in-memory revision.
    pub fn is_durable(&self) -> bool {
        self.loaded && self.durable_revision == self.revision
    }

    /// Whether the stored collection has been read successfully.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Create an empty group and persist the collection.
    pub async fn add_group(&mut self, name: &str) -> Result<GroupCollection, ServiceError> {
        self.ensure_loaded().await?;
        let name = self.groups.insert_group(name)?;
        info!(group = %name, "group added");
        self.commit().await?;
        Ok(self.snapshot())
    }

    /// Remove a group with all its options and persist the collection.
    pub async fn delete_group(&mut self, name: &str) -> Result<GroupCollection, ServiceError> {
        self.ensure_loaded().await?;
        let options = self.groups.remove_group(name)?;
        info!(group = %name, options = options.len(), "group deleted");
        self.commit().await?;
        Ok(self.snapshot())
    }

    /// Append an option to a group and persist the collection.
    pub async fn add_option(
        &mut self,
        group: &str,
        text: &str,
    ) -> Result<GroupCollection, ServiceError> {
        self.ensure_loaded().await?;
        let index = self.groups.push_option(group, text)?;
        info!(group = %group, index, "option added");
        self.commit().await?;
        Ok(self.snapshot())
    }

    /// Remove the option at `index`, keeping the order of the others, and persist.
    pub async fn delete_option(
        &mut self,
        group: &str,
        index: usize,
    ) -> Result<GroupCollection, ServiceError> {
        self.ensure_loaded().await?;
        let removed = self.groups.remove_option(group, index)?;
        info!(group = %group, index, option = %removed, "option deleted");
        self.commit().await?;
        Ok(self.snapshot())
    }

    /// Write the latest collection again if storage lags behind memory, or
    /// read it again if it could not be read before.
    pub async fn sync(&mut self) -> Result<(), ServiceError> {
        if !self.loaded {
            return self.ensure_loaded().await;
        }
        if self.is_durable() {
            debug!(revision = self.revision, "store already durable; nothing to sync");
            return Ok(());
        }
        self.persist().await
    }

    async fn ensure_loaded(&mut self) -> Result<(), ServiceError> {
        if self.loaded {
            return Ok(());
        }
        match self.gateway.get_options().await {
            Ok(groups) => {
                info!(groups = groups.len(), "persisted groups read after an earlier failure");
                self.groups = groups;
                self.loaded = true;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "stored groups are still unreadable; change refused");
                Err(ServiceError::PersistenceFailure {
                    revision: self.revision,
                    applied: false,
                    source: err,
                })
            }
        }
    }

    async fn commit(&mut self) -> Result<(), ServiceError> {
        self.revision += 1;
        self.persist().await
    }

    async fn persist(&mut self) -> Result<(), ServiceError> {
        let revision = self.revision;
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1;

        loop {
            match self.gateway.save_options(self.groups.clone()).await {
                Ok(()) => {
                    self.durable_revision = self.durable_revision.max(revision);
                    debug!(revision, attempt, "collection persisted");
                    return Ok(());
                }
                Err(err) if attempt < self.retry.attempts => {
                    warn!(revision, attempt, error = %err, "saving groups failed; retrying");
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                    attempt += 1;
                }
                Err(err) => {
                    error!(revision, attempt, error = %err, "saving groups failed; change is not durable");
                    return Err(ServiceError::PersistenceFailure {
                        revision,
                        applied: true,
                        source: err,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dao::group_store::memory::MemoryGroupStore;

    fn raw(entries: &[(&str, &[&str])]) -> IndexMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(name, options)| {
                (
                    name.to_string(),
                    options.iter().map(|o| o.to_string()).collect(),
                )
            })
            .collect()
    }

    fn no_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 1,
            initial_delay: Duration::ZERO,
        }
    }

    async fn store_with(backend: &MemoryGroupStore, retry: RetryPolicy) -> GroupStore {
        let (gateway, _worker) = PersistenceGateway::spawn(Arc::new(backend.clone()));
        GroupStore::load(gateway, retry).await
    }

    #[test]
    fn sanitize_drops_invalid_entries() {
        let (groups, dropped) = GroupCollection::sanitize(raw(&[
            ("  fruits ", &["apple", " apple ", "", "pear"]),
            ("", &["x"]),
            ("fruits", &["kiwi"]),
        ]));

        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups.options("fruits").unwrap(),
            &["apple".to_string(), "pear".to_string()]
        );
        assert_eq!(dropped, 6);
    }

    #[test]
    fn add_then_delete_last_option_restores_sequence() {
        let (mut groups, _) = GroupCollection::sanitize(raw(&[("g", &["a", "b"])]));
        let before = groups.clone();

        let index = groups.push_option("g", "c").unwrap();
        groups.remove_option("g", index).unwrap();

        assert_eq!(groups, before);
    }

    #[test]
    fn group_order_survives_removal() {
        let (mut groups, _) =
            GroupCollection::sanitize(raw(&[("a", &[]), ("b", &[]), ("c", &[])]));
        groups.remove_group("b").unwrap();
        assert_eq!(groups.names().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn option_text_is_case_sensitive() {
        let (mut groups, _) = GroupCollection::sanitize(raw(&[("g", &["Apple"])]));
        assert!(groups.push_option("g", "apple").is_ok());
        assert!(matches!(
            groups.push_option("g", "Apple"),
            Err(ServiceError::DuplicateOption { .. })
        ));
    }

    #[tokio::test]
    async fn delete_option_keeps_order_and_persists() {
        let backend = MemoryGroupStore::with_groups(GroupCollection::from(raw(&[(
            "fruits",
            &["apple", "banana", "cherry"],
        )])));
        let mut store = store_with(&backend, no_retry()).await;

        let updated = store.delete_option("fruits", 1).await.unwrap();

        let expected = vec!["apple".to_string(), "cherry".to_string()];
        assert_eq!(updated.options("fruits").unwrap(), expected.as_slice());
        assert_eq!(
            backend.stored().await.options("fruits").unwrap(),
            expected.as_slice()
        );
        assert!(store.is_durable());
    }

    #[tokio::test]
    async fn duplicate_group_leaves_collection_unchanged() {
        let backend = MemoryGroupStore::new();
        let mut store = store_with(&backend, no_retry()).await;

        store.add_group("a").await.unwrap();
        let err = store.add_group("a").await.unwrap_err();

        assert!(matches!(err, ServiceError::DuplicateGroup(name) if name == "a"));
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.options("a").unwrap().len(), 0);
        assert_eq!(backend.save_count(), 1);
    }

    #[tokio::test]
    async fn blank_inputs_are_rejected_without_writes() {
        let backend = MemoryGroupStore::new();
        let mut store = store_with(&backend, no_retry()).await;

        assert!(matches!(
            store.add_group("   ").await,
            Err(ServiceError::DuplicateGroup(name)) if name.is_empty()
        ));
        store.add_group("g").await.unwrap();
        assert!(matches!(
            store.add_option("g", " \t").await,
            Err(ServiceError::EmptyOption)
        ));
        assert!(matches!(
            store.add_option("missing", "x").await,
            Err(ServiceError::GroupNotFound(_))
        ));
        assert!(matches!(
            store.delete_option("g", 0).await,
            Err(ServiceError::IndexOutOfRange { index: 0, len: 0, .. })
        ));
        assert_eq!(backend.save_count(), 1);
    }

    #[tokio::test]
    async fn failed_write_is_reported_and_can_be_synced() {
        let backend = MemoryGroupStore::new();
        let mut store = store_with(&backend, no_retry()).await;
        backend.fail_next_saves(1);

        let err = store.add_group("a").await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::PersistenceFailure {
                revision: 1,
                applied: true,
                ..
            }
        ));
        assert!(store.snapshot().contains("a"));
        assert!(!store.is_durable());
        assert!(backend.stored().await.is_empty());

        store.sync().await.unwrap();
        assert!(store.is_durable());
        assert!(backend.stored().await.contains("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let backend = MemoryGroupStore::new();
        let mut store = store_with(&backend, RetryPolicy::default()).await;
        backend.fail_next_saves(2);

        store.add_group("a").await.unwrap();

        assert!(store.is_durable());
        assert_eq!(backend.save_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_stall_for_the_whole_backoff() {
        let backend = MemoryGroupStore::new();
        let mut store = store_with(&backend, RetryPolicy::default()).await;
        backend.fail_next_saves(3);

        let started = tokio::time::Instant::now();
        store.add_group("a").await.unwrap_err();
        let stalled = started.elapsed();

        assert_eq!(backend.save_count(), 3);
        assert!(stalled >= Duration::from_millis(750), "{stalled:?}");
        assert!(stalled < Duration::from_millis(760), "{stalled:?}");
    }

    #[tokio::test]
    async fn unreadable_storage_is_never_overwritten() {
        let backend = MemoryGroupStore::with_groups(GroupCollection::from(raw(&[(
            "precious",
            &["x", "y"],
        )])));
        backend.set_unavailable(true);
        let mut store = store_with(&backend, no_retry()).await;

        assert!(!store.is_loaded());
        assert!(!store.is_durable());
        assert!(store.snapshot().is_empty());

        let err = store.add_group("new").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::PersistenceFailure { applied: false, .. }
        ));
        assert!(store.snapshot().is_empty());
        assert_eq!(backend.save_count(), 0);

        backend.set_unavailable(false);
        store.add_group("new").await.unwrap();

        let stored = backend.stored().await;
        assert_eq!(stored.names().collect::<Vec<_>>(), vec!["precious", "new"]);
        assert_eq!(
            stored.options("precious").unwrap(),
            &["x".to_string(), "y".to_string()]
        );
        assert!(store.is_loaded());
        assert!(store.is_durable());
    }

    #[tokio::test]
    async fn sync_reads_storage_again_after_a_failed_load() {
        let backend = MemoryGroupStore::with_groups(GroupCollection::from(raw(&[("kept", &[])])));
        backend.set_unavailable(true);
        let mut store = store_with(&backend, no_retry()).await;

        assert!(store.sync().await.is_err());
        backend.set_unavailable(false);
        store.sync().await.unwrap();

        assert!(store.is_durable());
        assert_eq!(store.group_names(), vec!["kept"]);
        assert_eq!(backend.save_count(), 0);
    }

    #[tokio::test]
    async fn writes_reach_storage_in_issue_order() {
        let backend = MemoryGroupStore::new();
        let mut store = store_with(&backend, no_retry()).await;

        store.add_group("a").await.unwrap();
        store.add_option("a", "one").await.unwrap();
        store.add_option("a", "two").await.unwrap();
        store.delete_option("a", 0).await.unwrap();

        let history = backend.history().await;
        let lens: Vec<usize> = history
            .iter()
            .map(|groups| groups.options("a").map_or(0, <[String]>::len))
            .collect();
        assert_eq!(lens, vec![0, 1, 2, 1]);
        assert_eq!(
            backend.stored().await.options("a").unwrap(),
            &["two".to_string()]
        );
    }
}
