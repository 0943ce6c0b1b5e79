/// Connection-facing game operations: create, join, reconnect, play, leave.
pub mod coordinator;
/// Room broadcast and SSE fan-out helpers.
pub mod events;
/// Health check service.
pub mod health_service;
/// Idle-session sweep.
pub mod janitor;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervision and degraded-mode tracking.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
/// Write-behind persistence queue and its drain loop.
pub mod write_behind;
