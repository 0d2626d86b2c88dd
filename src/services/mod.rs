/// Operator service for catalog management and rotation commands.
pub mod admin_service;
/// Bridges storage change notifications onto the SSE hubs.
pub mod change_relay;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Read-only projections of the current show.
pub mod public_service;
/// Reaction aggregation over atomic tally counters.
pub mod reaction_service;
/// Active-joke rotation and repair.
pub mod rotation;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor.
pub mod storage_supervisor;
/// Reconnecting subscription channels over the change feed.
pub mod subscription;
/// Advisory per-viewer vote dedup.
pub mod vote_guard;
