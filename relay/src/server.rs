use std::io;
use std::net::SocketAddr;

use brickroom_core::SessionId;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error, Message};

use crate::config::RelayConfig;
use crate::hub::{Outbox, RoomHub};

enum HubCommand {
    Connect {
        outbox: Outbox,
        reply: oneshot::Sender<SessionId>,
    },
    Frame {
        session_id: SessionId,
        bytes: Vec<u8>,
    },
    Disconnect {
        session_id: SessionId,
    },
}

pub struct RelayHandle {
    local_addr: SocketAddr,
    task: JoinHandle<io::Result<()>>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.local_addr)
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Binds `config.bind` and serves in a background task.
pub async fn spawn(config: RelayConfig) -> io::Result<RelayHandle> {
    let listener = TcpListener::bind(config.bind).await?;
    let local_addr = listener.local_addr()?;
    let task = tokio::spawn(serve(listener, config));
    Ok(RelayHandle { local_addr, task })
}

pub async fn serve(listener: TcpListener, config: RelayConfig) -> io::Result<()> {
    let (hub_tx, hub_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_hub(hub_rx));

    log::info!(
        "relay listening on {} ({:?} mode)",
        listener.local_addr()?,
        config.mode
    );
    loop {
        let (stream, peer) = listener.accept().await?;
        let hub_tx = hub_tx.clone();
        tokio::spawn(handle_connection(
            stream,
            peer,
            hub_tx,
            websocket_config(config.max_message_bytes),
        ));
    }
}

/// Oversized messages fail the read inside tungstenite, before they are
/// buffered, and end the session.
fn websocket_config(max_message_bytes: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_message_bytes);
    config.max_frame_size = Some(max_message_bytes);
    config
}

async fn run_hub(mut commands: mpsc::UnboundedReceiver<HubCommand>) {
    let mut hub = RoomHub::new();
    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Connect { outbox, reply } => {
                let session_id = hub.connect(outbox);
                if reply.send(session_id).is_err() {
                    hub.disconnect(session_id);
                }
            }
            HubCommand::Frame { session_id, bytes } => {
                hub.handle_frame(session_id, &bytes);
            }
            HubCommand::Disconnect { session_id } => hub.disconnect(session_id),
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: mpsc::UnboundedSender<HubCommand>,
    ws_config: WebSocketConfig,
) {
    let ws = match tokio_tungstenite::accept_async_with_config(stream, Some(ws_config)).await {
        Ok(ws) => ws,
        Err(err) => {
            log::debug!("websocket handshake with {peer} failed: {err}");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    let (outbox, mut pending) = mpsc::unbounded_channel::<Vec<u8>>();
    let (reply, session) = oneshot::channel();
    if hub.send(HubCommand::Connect { outbox, reply }).is_err() {
        return;
    }
    let Ok(session_id) = session.await else {
        return;
    };
    log::info!("session {session_id} connected from {peer}");

    let writer = tokio::spawn(async move {
        while let Some(bytes) = pending.recv().await {
            if write.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Binary(bytes)) => {
                let command = HubCommand::Frame {
                    session_id,
                    bytes: bytes.to_vec(),
                };
                if hub.send(command).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(Error::Capacity(err)) => {
                log::warn!("session {session_id}: {err}; closing");
                break;
            }
            Err(err) => {
                log::debug!("session {session_id}: read failed: {err}");
                break;
            }
        }
    }

    let _ = hub.send(HubCommand::Disconnect { session_id });
    let _ = writer.await;
}
