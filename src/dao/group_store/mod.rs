/// JSON file backend used by the application.
pub mod file;
/// In-memory backend with failure injection, used by tests.
pub mod memory;

use crate::dao::storage::StorageResult;
use crate::state::groups::GroupCollection;
use futures::future::BoxFuture;

/// Abstraction over the durable storage holding the group collection.
///
/// The collection is always read and written as one unit; backends never see
/// partial updates.
pub trait GroupBackend: Send + Sync {
    /// Read the whole stored collection; an absent document reads as empty.
    fn load_groups(&self) -> BoxFuture<'static, StorageResult<GroupCollection>>;
    /// Replace the stored collection with `groups`.
    fn save_groups(&self, groups: GroupCollection) -> BoxFuture<'static, StorageResult<()>>;
    /// Report whether the backend can currently be reached.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
