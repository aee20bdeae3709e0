/// Group collection storage backends.
pub mod group_store;
/// Persisted document layout.
pub mod models;
/// Storage abstraction layer errors.
pub mod storage;
