//! WebSocket connection to a room relay.

use brickroom_core::{decode, encode, ClientMsg, RoomId, ServerMsg};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use crate::link::RoomLink;

pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3000/ws";

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid relay url: {0}")]
    Url(#[from] url::ParseError),
    #[error("relay url must use ws or wss, got {0:?}")]
    Scheme(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

pub fn parse_relay_url(raw: &str) -> Result<Url, SyncError> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(SyncError::Scheme(other.to_string())),
    }
}

/// Sending half of a live connection. Cloning shares the socket.
#[derive(Clone, Debug)]
pub struct WsRoomLink {
    tx: mpsc::UnboundedSender<ClientMsg>,
}

impl RoomLink for WsRoomLink {
    fn send(&self, msg: ClientMsg) {
        if self.tx.send(msg).is_err() {
            log::debug!("room connection closed; dropping outgoing message");
        }
    }
}

pub struct RoomConnection {
    link: WsRoomLink,
    events: mpsc::UnboundedReceiver<ServerMsg>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl RoomConnection {
    pub fn link(&self) -> WsRoomLink {
        self.link.clone()
    }

    /// Next message from the relay; `None` once the socket is gone.
    pub async fn recv(&mut self) -> Option<ServerMsg> {
        self.events.recv().await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> Option<ServerMsg> {
        timeout(dur, self.events.recv()).await.ok().flatten()
    }

    pub fn close(self) {
        self.reader.abort();
        self.writer.abort();
    }

    /// Flushes queued messages and closes the socket. Every other clone of
    /// the link must already be dropped, or this waits for them.
    pub async fn finish(self) {
        let Self {
            link,
            events,
            writer,
            reader,
        } = self;
        drop(link);
        let _ = writer.await;
        reader.abort();
        drop(events);
    }
}

/// Connects and joins `room_id`. Frames are rkyv-encoded [`ClientMsg`] and
/// [`ServerMsg`] values carried as binary WebSocket messages.
pub async fn connect_room(url: &str, room_id: &RoomId) -> Result<RoomConnection, SyncError> {
    let url = parse_relay_url(url)?;
    let (ws, _response) = connect_async(url.as_str()).await?;
    let (mut write, mut read) = ws.split();
    log::info!("connected to {url}");

    let (tx, mut outgoing) = mpsc::unbounded_channel::<ClientMsg>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = outgoing.recv().await {
            let Some(bytes) = encode(&msg) else {
                log::warn!("failed to encode outgoing message");
                continue;
            };
            if write.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    let (events_tx, events) = mpsc::unbounded_channel();
    let reader = tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Binary(bytes)) => match decode::<ServerMsg>(&bytes) {
                    Some(msg) => {
                        if events_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    None => log::debug!("dropping undecodable frame ({} bytes)", bytes.len()),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    log::debug!("relay read failed: {err}");
                    break;
                }
            }
        }
    });

    let link = WsRoomLink { tx };
    link.send(ClientMsg::JoinRoom {
        room_id: room_id.to_string(),
    });
    Ok(RoomConnection {
        link,
        events,
        writer,
        reader,
    })
}

/// Like [`connect_room`], retrying with a doubling delay. Malformed urls
/// fail on the first attempt.
pub async fn connect_room_with_retry(
    url: &str,
    room_id: &RoomId,
    attempts: u32,
    initial_backoff: Duration,
) -> Result<RoomConnection, SyncError> {
    let mut backoff = initial_backoff;
    let mut attempt = 1;
    loop {
        match connect_room(url, room_id).await {
            Ok(connection) => return Ok(connection),
            Err(err @ (SyncError::Url(_) | SyncError::Scheme(_))) => return Err(err),
            Err(err) if attempt >= attempts => return Err(err),
            Err(err) => {
                log::warn!("connect attempt {attempt}/{attempts} failed: {err}; retrying in {backoff:?}");
                sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}
