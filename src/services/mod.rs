/// Read-only projections of the board, the queue and the ranking.
pub mod board_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Session lifecycle operations: start, toggle, finish, reset.
pub mod lifecycle_service;
/// Merge and repair logic between the in-memory board and the stores.
pub mod reconcile;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage backend supervision and failover.
pub mod storage_supervisor;
