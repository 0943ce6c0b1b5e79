use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::sse_service,
    state::SharedState,
};

/// Stream realtime lobby and system events to connected frontends.
pub async fn event_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe(&state);
    info!("new SSE connection");

    let handshake = Handshake {
        message: "event stream connected".into(),
        degraded: state.is_degraded().await,
    };
    let greeting = ServerEvent::json(Some("handshake".to_string()), &handshake).ok();

    sse_service::to_sse_stream(receiver, greeting)
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/events", get(event_stream))
}
