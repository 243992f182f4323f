use rkyv::{Archive, Deserialize, Serialize};

use crate::brick::Brick;
use crate::room::RoomEvent;

pub type SessionId = u64;

pub const DEFAULT_ROOM_ID: &str = "default-room";

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ClientMsg {
    JoinRoom {
        room_id: String,
    },
    Event {
        room_id: String,
        event: RoomEvent,
    },
    /// Answer to a `ServerMsg::SnapshotRequest`, routed back to `requester`.
    Snapshot {
        room_id: String,
        requester: SessionId,
        bricks: Vec<Brick>,
    },
    Ping {
        nonce: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ServerMsg {
    Welcome {
        session_id: SessionId,
    },
    Joined {
        room_id: String,
        peers: u32,
    },
    Event {
        room_id: String,
        event: RoomEvent,
    },
    SnapshotRequest {
        room_id: String,
        requester: SessionId,
    },
    Snapshot {
        room_id: String,
        bricks: Vec<Brick>,
    },
    Pong {
        nonce: Option<u64>,
    },
    Error {
        code: String,
        message: String,
    },
}
