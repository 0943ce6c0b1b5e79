use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{Ack, ClientEnvelope, ClientRequest},
    services::{coordinator, coordinator::Seat, events::send_to_connection},
    state::SharedState,
};

/// Handle the full lifecycle of one game WebSocket connection.
///
/// The socket starts unseated; the first successful create/join/reconnect
/// binds it to a session. Dropping the socket releases the binding but never
/// removes the player from the roster.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    let mut seat: Option<Seat> = None;
    info!(connection_id = %connection_id, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                handle_frame(&state, connection_id, &outbound_tx, &mut seat, &text).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection_id = %connection_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection_id = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    if let Some(seat) = seat.take() {
        coordinator::disconnect(&state, &seat, connection_id).await;
    }
    info!(connection_id = %connection_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Parse and dispatch one inbound text frame, always answering with an ack.
async fn handle_frame(
    state: &SharedState,
    connection_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    seat: &mut Option<Seat>,
    text: &str,
) {
    let envelope = match ClientEnvelope::from_json_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(connection_id = %connection_id, error = %err, "rejected inbound frame");
            send_to_connection(outbound_tx, &Ack::error(None, err.to_string()));
            return;
        }
    };
    let request_id = envelope.request_id;

    let ack = match envelope.request {
        ClientRequest::CreateGame {
            player_name,
            title,
            game_type,
            max_players,
        } => {
            if seat.is_some() {
                Ack::error(request_id, "this connection is already in a game")
            } else {
                match coordinator::create_game(
                    state,
                    connection_id,
                    outbound_tx,
                    &player_name,
                    title.as_deref(),
                    game_type,
                    max_players,
                )
                .await
                {
                    Ok((new_seat, snapshot)) => {
                        *seat = Some(new_seat);
                        Ack::with_game(request_id, snapshot)
                    }
                    Err(err) => Ack::error(request_id, err.to_string()),
                }
            }
        }
        ClientRequest::JoinGame {
            game_id,
            player_name,
        } => {
            if seat.is_some() {
                Ack::error(request_id, "this connection is already in a game")
            } else {
                match coordinator::join_game(
                    state,
                    connection_id,
                    outbound_tx,
                    game_id,
                    &player_name,
                )
                .await
                {
                    Ok((new_seat, snapshot)) => {
                        *seat = Some(new_seat);
                        Ack::with_game(request_id, snapshot)
                    }
                    Err(err) => Ack::error(request_id, err.to_string()),
                }
            }
        }
        ClientRequest::Reconnect { game_id, player_id } => {
            if seat.is_some() {
                Ack::error(request_id, "this connection is already in a game")
            } else {
                match coordinator::reconnect(
                    state,
                    connection_id,
                    outbound_tx,
                    game_id,
                    player_id,
                )
                .await
                {
                    Ok((new_seat, snapshot)) => {
                        *seat = Some(new_seat);
                        Ack::with_game(request_id, snapshot)
                    }
                    Err(err) => Ack::error(request_id, err.to_string()),
                }
            }
        }
        ClientRequest::Ready { secret_word } => match seat.as_ref() {
            Some(seat) => match coordinator::ready(state, seat, secret_word.as_deref()).await {
                Ok(()) => Ack::ok(request_id),
                Err(err) => Ack::error(request_id, err.to_string()),
            },
            None => Ack::error(request_id, "join a game first"),
        },
        ClientRequest::SubmitWord { word } => match seat.as_ref() {
            Some(seat) => match coordinator::submit_word(state, seat, &word).await {
                Ok(()) => Ack::ok(request_id),
                Err(err) => Ack::error(request_id, err.to_string()),
            },
            None => Ack::error(request_id, "join a game first"),
        },
        ClientRequest::LeaveGame => match seat.take() {
            Some(taken) => match coordinator::leave_game(state, &taken, connection_id).await {
                Ok(()) => Ack::ok(request_id),
                Err(err) => {
                    // The membership is gone either way; stay unseated.
                    Ack::error(request_id, err.to_string())
                }
            },
            None => Ack::error(request_id, "join a game first"),
        },
        ClientRequest::ListGames => {
            let games = coordinator::list_games(state).await;
            Ack::with_games(request_id, games)
        }
        ClientRequest::Unknown => Ack::error(request_id, "unknown request type"),
    };

    send_to_connection(outbound_tx, &ack);
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
