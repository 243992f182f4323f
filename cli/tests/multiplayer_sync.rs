use brickroom::sync::RoomConnection;
use brickroom::{
    connect_room, connect_room_with_retry, ClickOutcome, Editor, PointerEvent, RemoteOutcome,
    SyncError, WsRoomLink,
};
use brickroom_core::codec::{decode, encode};
use brickroom_core::{Brick, BrickType, ClientMsg, RoomEvent, RoomId, ServerMsg};
use brickroom_relay::{RelayConfig, RelayHandle};
use futures_util::{SinkExt, StreamExt};
use glam::DVec3;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STEP: Duration = Duration::from_secs(3);
const QUIET: Duration = Duration::from_millis(300);

async fn start_relay() -> Result<RelayHandle, Box<dyn std::error::Error>> {
    let config = RelayConfig {
        bind: "127.0.0.1:0".parse()?,
        ..RelayConfig::default()
    };
    Ok(brickroom_relay::spawn(config).await?)
}

async fn connect_peer(url: &str, room: &str) -> Result<Peer, Box<dyn std::error::Error>> {
    let room_id = RoomId::parse(room)?;
    let connection = connect_room(url, &room_id).await?;
    let editor = Editor::joining(room_id, connection.link());
    Ok(Peer { editor, connection })
}

struct Peer {
    editor: Editor<WsRoomLink>,
    connection: RoomConnection,
}

impl Peer {
    /// Connects, joins and waits for the room to be in sync.
    async fn join(url: &str, room: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut peer = connect_peer(url, room).await?;
        let peers = match peer.pump_until(|o| matches!(o, RemoteOutcome::Joined { .. })).await {
            Some(RemoteOutcome::Joined { peers }) => peers,
            other => return Err(format!("expected joined, got {other:?}").into()),
        };
        if peers > 0 {
            peer.pump_until(|o| *o == RemoteOutcome::Applied)
                .await
                .ok_or("no snapshot from peers")?;
        }
        Ok(peer)
    }

    async fn pump_until(
        &mut self,
        pred: impl Fn(&RemoteOutcome) -> bool,
    ) -> Option<RemoteOutcome> {
        let deadline = Instant::now() + STEP;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let msg = self.connection.recv_timeout(remaining).await?;
            let outcome = self.editor.apply_server_msg(msg);
            if pred(&outcome) {
                return Some(outcome);
            }
        }
    }

    /// Applies whatever arrives within `window`.
    async fn settle(&mut self, window: Duration) -> Vec<RemoteOutcome> {
        let deadline = Instant::now() + window;
        let mut outcomes = Vec::new();
        while let Some(msg) = self
            .connection
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .await
        {
            outcomes.push(self.editor.apply_server_msg(msg));
        }
        outcomes
    }

    /// Joins a second client while pumping `self`, which the relay asks to
    /// serve the newcomer's snapshot.
    async fn join_alongside(
        &mut self,
        url: &str,
        room: &str,
    ) -> Result<Peer, Box<dyn std::error::Error>> {
        let url = url.to_string();
        let room = room.to_string();
        let joining =
            tokio::spawn(async move { Peer::join(&url, &room).await.map_err(|e| e.to_string()) });
        self.pump_until(|o| matches!(o, RemoteOutcome::SnapshotServed { .. }))
            .await
            .ok_or("existing peer was never asked for a snapshot")?;
        Ok(joining.await??)
    }

    fn click_ground(&mut self, x: f64, z: f64) -> ClickOutcome {
        self.editor.handle_pointer(PointerEvent::Ground {
            point: DVec3::new(x, 0.0, z),
        })
    }
}

/// Next decodable server message within `dur`; `None` on close or timeout.
async fn recv_with_timeout(
    read: &mut futures_util::stream::SplitStream<WsStream>,
    dur: Duration,
) -> Option<ServerMsg> {
    let next = async {
        loop {
            match read.next().await? {
                Ok(Message::Binary(bytes)) => {
                    if let Some(msg) = decode::<ServerMsg>(&bytes) {
                        return Some(msg);
                    }
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) | Err(_) => {}
            }
        }
    };
    timeout(dur, next).await.ok().flatten()
}

async fn send_client_msg(
    write: &mut futures_util::stream::SplitSink<WsStream, Message>,
    msg: ClientMsg,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = encode(&msg).ok_or("client message failed to encode")?;
    write.send(Message::Binary(bytes.into())).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn placement_is_observed_by_second_client() -> Result<(), Box<dyn std::error::Error>> {
    let relay = start_relay().await?;
    let mut a = Peer::join(&relay.ws_url(), "default-room").await?;
    let mut b = a.join_alongside(&relay.ws_url(), "default-room").await?;

    let ClickOutcome::Placed(brick) = a.click_ground(0.3, 0.8) else {
        return Err("first placement should succeed".into());
    };
    b.pump_until(|o| *o == RemoteOutcome::Applied)
        .await
        .ok_or("second client never saw the brick")?;
    assert_eq!(b.editor.bricks().as_slice(), &[brick]);

    // The sender never hears its own event back.
    assert!(a
        .settle(QUIET)
        .await
        .iter()
        .all(|o| *o != RemoteOutcome::Applied));
    relay.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_placement_is_not_broadcast() -> Result<(), Box<dyn std::error::Error>> {
    let relay = start_relay().await?;
    let mut a = Peer::join(&relay.ws_url(), "r").await?;
    let mut b = a.join_alongside(&relay.ws_url(), "r").await?;

    assert!(matches!(a.click_ground(0.3, 0.8), ClickOutcome::Placed(_)));
    a.editor.select_type(BrickType::OneByOne);
    assert_eq!(a.click_ground(0.3, 0.8), ClickOutcome::Rejected);

    let outcomes = b.settle(QUIET).await;
    assert_eq!(outcomes, vec![RemoteOutcome::Applied]);
    assert_eq!(b.editor.bricks().len(), 1);
    relay.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn removal_and_clear_propagate() -> Result<(), Box<dyn std::error::Error>> {
    let relay = start_relay().await?;
    let mut a = Peer::join(&relay.ws_url(), "r").await?;
    let mut b = a.join_alongside(&relay.ws_url(), "r").await?;

    let ClickOutcome::Placed(first) = a.click_ground(0.0, 0.0) else {
        return Err("placement failed".into());
    };
    assert!(matches!(a.click_ground(3.0, 3.0), ClickOutcome::Placed(_)));
    b.settle(QUIET).await;
    assert_eq!(b.editor.bricks().len(), 2);

    b.editor.remove_brick(&first.id).ok_or("b should hold the brick")?;
    a.pump_until(|o| *o == RemoteOutcome::Applied)
        .await
        .ok_or("removal never reached a")?;
    assert_eq!(a.editor.bricks().len(), 1);
    assert!(!a.editor.bricks().contains(&first.id));

    a.editor.clear();
    b.pump_until(|o| *o == RemoteOutcome::Applied)
        .await
        .ok_or("clear never reached b")?;
    assert!(b.editor.bricks().is_empty());
    relay.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_joiner_receives_a_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    let relay = start_relay().await?;
    let mut a = Peer::join(&relay.ws_url(), "r").await?;
    assert!(matches!(a.click_ground(0.0, 0.0), ClickOutcome::Placed(_)));
    assert!(matches!(a.click_ground(4.0, 0.0), ClickOutcome::Placed(_)));

    let c = a.join_alongside(&relay.ws_url(), "r").await?;
    assert_eq!(c.editor.bricks().as_slice(), a.editor.bricks().as_slice());
    relay.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rooms_do_not_leak_and_disconnects_are_silent() -> Result<(), Box<dyn std::error::Error>> {
    let relay = start_relay().await?;
    let mut red = Peer::join(&relay.ws_url(), "red").await?;
    let mut blue = Peer::join(&relay.ws_url(), "blue").await?;

    assert!(matches!(red.click_ground(0.0, 0.0), ClickOutcome::Placed(_)));
    assert!(blue.settle(QUIET).await.is_empty());
    assert!(blue.editor.bricks().is_empty());

    let Peer { editor, connection } = blue;
    drop(editor);
    connection.finish().await;
    assert!(red.settle(QUIET).await.is_empty());
    relay.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn raw_socket_ping_and_garbage() -> Result<(), Box<dyn std::error::Error>> {
    let relay = start_relay().await?;
    let url = Url::parse(&relay.ws_url())?;
    let (ws, _) = connect_async(url.as_str()).await?;
    let (mut write, mut read) = ws.split();

    let welcome = recv_with_timeout(&mut read, STEP).await;
    assert!(matches!(welcome, Some(ServerMsg::Welcome { .. })));

    write
        .send(Message::Binary(b"not an rkyv frame".to_vec().into()))
        .await?;
    send_client_msg(&mut write, ClientMsg::Ping { nonce: Some(42) }).await?;
    assert_eq!(
        recv_with_timeout(&mut read, STEP).await,
        Some(ServerMsg::Pong { nonce: Some(42) })
    );

    send_client_msg(
        &mut write,
        ClientMsg::JoinRoom {
            room_id: "has spaces".to_string(),
        },
    )
    .await?;
    assert!(matches!(
        recv_with_timeout(&mut read, STEP).await,
        Some(ServerMsg::Error { .. })
    ));

    send_client_msg(
        &mut write,
        ClientMsg::Event {
            room_id: "nobody-here".to_string(),
            event: RoomEvent::Clear,
        },
    )
    .await?;
    assert_eq!(recv_with_timeout(&mut read, QUIET).await, None);
    relay.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn placing_before_the_snapshot_arrives_keeps_rooms_in_sync(
) -> Result<(), Box<dyn std::error::Error>> {
    let relay = start_relay().await?;
    let mut a = Peer::join(&relay.ws_url(), "r").await?;
    assert!(matches!(a.click_ground(0.0, 0.0), ClickOutcome::Placed(_)));

    let mut b = connect_peer(&relay.ws_url(), "r").await?;
    let ClickOutcome::Placed(early) = b.click_ground(5.0, 5.0) else {
        return Err("early placement failed".into());
    };

    a.pump_until(|o| matches!(o, RemoteOutcome::SnapshotServed { .. }))
        .await
        .ok_or("a was never asked for a snapshot")?;
    a.pump_until(|o| *o == RemoteOutcome::Applied)
        .await
        .ok_or("a never saw the early brick")?;
    b.pump_until(|o| *o == RemoteOutcome::Applied)
        .await
        .ok_or("b never got the snapshot")?;

    assert!(!b.editor.awaiting_snapshot());
    assert_eq!(a.editor.bricks().len(), 2);
    assert_eq!(b.editor.bricks().as_slice(), a.editor.bricks().as_slice());
    assert!(b.editor.bricks().contains(&early.id));
    relay.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connecting_retries_until_the_relay_is_up() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?;
    let starter = tokio::spawn(async move {
        sleep(Duration::from_millis(300)).await;
        brickroom_relay::spawn(RelayConfig {
            bind: addr,
            ..RelayConfig::default()
        })
        .await
    });

    let room_id = RoomId::parse("late")?;
    let connection = connect_room_with_retry(
        &format!("ws://{addr}/ws"),
        &room_id,
        8,
        Duration::from_millis(50),
    )
    .await?;
    let relay = starter.await??;

    let mut peer = Peer {
        editor: Editor::joining(room_id, connection.link()),
        connection,
    };
    assert_eq!(
        peer.pump_until(|o| matches!(o, RemoteOutcome::Joined { .. }))
            .await,
        Some(RemoteOutcome::Joined { peers: 0 })
    );
    relay.shutdown();
    Ok(())
}

#[tokio::test]
async fn bad_relay_urls_are_not_retried() -> Result<(), Box<dyn std::error::Error>> {
    let room_id = RoomId::parse("r")?;
    let attempt = connect_room_with_retry(
        "http://127.0.0.1:1/ws",
        &room_id,
        5,
        Duration::from_secs(10),
    );
    let result = timeout(Duration::from_secs(1), attempt).await?;
    assert!(matches!(result, Err(SyncError::Scheme(_))));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_messages_are_not_relayed() -> Result<(), Box<dyn std::error::Error>> {
    let relay = brickroom_relay::spawn(RelayConfig {
        bind: "127.0.0.1:0".parse()?,
        max_message_bytes: 16 * 1024,
        ..RelayConfig::default()
    })
    .await?;
    let mut a = Peer::join(&relay.ws_url(), "r").await?;

    let (ws, _) = connect_async(relay.ws_url()).await?;
    let (mut write, mut read) = ws.split();
    send_client_msg(
        &mut write,
        ClientMsg::JoinRoom {
            room_id: "r".to_string(),
        },
    )
    .await?;
    a.pump_until(|o| matches!(o, RemoteOutcome::SnapshotServed { .. }))
        .await
        .ok_or("a was never asked for a snapshot")?;

    let huge = Brick {
        id: "huge".to_string(),
        position: [0.0, 0.5, 0.0],
        color: "#".repeat(64 * 1024),
        kind: BrickType::TwoByTwo,
        rotation: 0.0,
    };
    send_client_msg(
        &mut write,
        ClientMsg::Event {
            room_id: "r".to_string(),
            event: RoomEvent::Place { brick: huge },
        },
    )
    .await?;

    assert!(a.settle(QUIET).await.is_empty());
    assert!(a.editor.bricks().is_empty());

    // The relay drops the oversized sender.
    let deadline = Instant::now() + STEP;
    while recv_with_timeout(&mut read, deadline.saturating_duration_since(Instant::now()))
        .await
        .is_some()
    {}
    assert!(Instant::now() < deadline, "oversized sender was never disconnected");
    relay.shutdown();
    Ok(())
}
