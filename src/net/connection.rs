//! Per-client socket task.
//!
//! One task per connection pumps inbound binary frames into the game loop
//! and drains the loop's outbound queue back onto the socket, until either
//! side goes away.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info};

use crate::game::{ClientMessage, GameTx, ServerMessage};

/// One-byte frame the game loop reads as "this connection is gone".
pub const DISCONNECT_SENTINEL: u8 = 0xFF;

pub async fn handle_connection(
    ws_stream: WebSocketStream<TcpStream>,
    conn_id: u64,
    game_tx: GameTx,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
) {
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Binary(data))) => {
                    let _ = game_tx.send(ClientMessage {
                        conn_id,
                        data: data.to_vec(),
                    });
                }
                Some(Ok(Message::Close(_))) | None => break,
                // The protocol is binary-only; text/ping/pong frames are dropped
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Connection {conn_id} read error: {e}");
                    break;
                }
            },
            queued = outbound.recv() => match queued {
                Some(msg) => {
                    if sink.send(Message::Binary(msg.data.into())).await.is_err() {
                        break;
                    }
                }
                // Game loop dropped our sender; nothing left to deliver
                None => break,
            },
        }
    }

    // Have the game loop retire this player at the next tick boundary
    let _ = game_tx.send(ClientMessage {
        conn_id,
        data: vec![DISCONNECT_SENTINEL],
    });

    info!("Connection {conn_id} closed");
}
