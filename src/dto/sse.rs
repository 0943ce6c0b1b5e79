use serde::Serialize;

use crate::dto::game::GameSummary;

/// Dispatched payload carried across the SSE channel.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

/// Initial metadata sent to an SSE client when it connects.
#[derive(Debug, Serialize)]
pub struct Handshake {
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

/// Broadcast when the backend enters or leaves degraded mode.
#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub degraded: bool,
}

/// Broadcast whenever the set of browsable games changes.
#[derive(Debug, Serialize)]
pub struct GameListChangedEvent {
    pub games: Vec<GameSummary>,
}
