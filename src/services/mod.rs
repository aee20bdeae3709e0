/// Group and option management with selection handling.
pub mod group_service;
/// Request/reply worker in front of the storage backend.
pub mod persistence_gateway;
/// Spin start, stop and status.
pub mod spin_service;
