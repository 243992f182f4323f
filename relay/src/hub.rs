//! Room membership and fan-out.
//!
//! The hub never looks inside a brick: it routes by room id and forwards
//! events to every member except the sender. It is driven by a single task
//! in [`crate::server`], so membership changes and forwards are applied in
//! the order frames arrive.

use std::collections::HashMap;

use brickroom_core::{decode, encode, Brick, ClientMsg, RoomEvent, RoomId, ServerMsg, SessionId};
use tokio::sync::mpsc;

/// Encoded frames waiting to be written to one connection.
pub type Outbox = mpsc::UnboundedSender<Vec<u8>>;

struct Session {
    outbox: Outbox,
    room: Option<String>,
}

pub struct RoomHub {
    sessions: HashMap<SessionId, Session>,
    rooms: HashMap<String, Vec<SessionId>>,
    next_session_id: SessionId,
}

impl RoomHub {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            rooms: HashMap::new(),
            next_session_id: 1,
        }
    }

    pub fn connect(&mut self, outbox: Outbox) -> SessionId {
        let session_id = self.next_session_id;
        self.next_session_id += 1;
        self.sessions.insert(
            session_id,
            Session {
                outbox,
                room: None,
            },
        );
        self.send_to(session_id, &ServerMsg::Welcome { session_id });
        session_id
    }

    /// Returns `false` when the frame could not be decoded and was dropped.
    pub fn handle_frame(&mut self, session_id: SessionId, bytes: &[u8]) -> bool {
        let Some(msg) = decode::<ClientMsg>(bytes) else {
            log::debug!(
                "session {session_id}: dropping undecodable frame ({} bytes)",
                bytes.len()
            );
            return false;
        };
        self.handle_msg(session_id, msg);
        true
    }

    pub fn handle_msg(&mut self, session_id: SessionId, msg: ClientMsg) {
        if !self.sessions.contains_key(&session_id) {
            return;
        }
        match msg {
            ClientMsg::JoinRoom { room_id } => self.join(session_id, room_id),
            ClientMsg::Event { room_id, event } => self.relay_event(session_id, room_id, event),
            ClientMsg::Snapshot {
                room_id,
                requester,
                bricks,
            } => self.forward_snapshot(session_id, room_id, requester, bricks),
            ClientMsg::Ping { nonce } => self.send_to(session_id, &ServerMsg::Pong { nonce }),
        }
    }

    pub fn disconnect(&mut self, session_id: SessionId) {
        self.leave_room(session_id);
        if self.sessions.remove(&session_id).is_some() {
            log::info!("session {session_id} disconnected");
        }
    }

    pub fn members(&self, room_id: &str) -> &[SessionId] {
        self.rooms
            .get(room_id)
            .map(|members| members.as_slice())
            .unwrap_or(&[])
    }

    pub fn room_of(&self, session_id: SessionId) -> Option<&str> {
        self.sessions.get(&session_id)?.room.as_deref()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn join(&mut self, session_id: SessionId, room_id: String) {
        if let Err(err) = RoomId::parse(&room_id) {
            self.send_to(
                session_id,
                &ServerMsg::Error {
                    code: "invalid_room_id".to_string(),
                    message: err.to_string(),
                },
            );
            return;
        }

        if self.room_of(session_id) != Some(room_id.as_str()) {
            self.leave_room(session_id);
            self.rooms
                .entry(room_id.clone())
                .or_default()
                .push(session_id);
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.room = Some(room_id.clone());
            }
            log::info!("session {session_id} joined room {room_id}");
        }

        let peers: Vec<SessionId> = self
            .members(&room_id)
            .iter()
            .copied()
            .filter(|id| *id != session_id)
            .collect();
        self.send_to(
            session_id,
            &ServerMsg::Joined {
                room_id: room_id.clone(),
                peers: peers.len() as u32,
            },
        );
        // the longest-standing member answers for the room
        if let Some(source) = peers.first() {
            self.send_to(
                *source,
                &ServerMsg::SnapshotRequest {
                    room_id,
                    requester: session_id,
                },
            );
        }
    }

    fn leave_room(&mut self, session_id: SessionId) {
        let Some(room_id) = self
            .sessions
            .get_mut(&session_id)
            .and_then(|session| session.room.take())
        else {
            return;
        };
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.retain(|id| *id != session_id);
            if members.is_empty() {
                self.rooms.remove(&room_id);
                log::debug!("room {room_id} is empty");
            }
        }
    }

    fn relay_event(&mut self, sender: SessionId, room_id: String, event: RoomEvent) {
        log::debug!("session {sender}: {} in room {room_id}", event.name());
        let msg = ServerMsg::Event {
            room_id: room_id.clone(),
            event,
        };
        self.fan_out(&room_id, sender, &msg);
    }

    fn forward_snapshot(
        &mut self,
        sender: SessionId,
        room_id: String,
        requester: SessionId,
        bricks: Vec<Brick>,
    ) {
        if self.room_of(sender) != Some(room_id.as_str())
            || self.room_of(requester) != Some(room_id.as_str())
        {
            log::debug!("session {sender}: snapshot for {requester} no longer routable");
            return;
        }
        log::debug!(
            "session {sender}: snapshot of {} bricks for session {requester}",
            bricks.len()
        );
        self.send_to(requester, &ServerMsg::Snapshot { room_id, bricks });
    }

    fn send_to(&self, session_id: SessionId, msg: &ServerMsg) {
        let Some(session) = self.sessions.get(&session_id) else {
            return;
        };
        let Some(bytes) = encode(msg) else {
            return;
        };
        if session.outbox.send(bytes).is_err() {
            log::debug!("session {session_id}: outbox closed");
        }
    }

    fn fan_out(&self, room_id: &str, except: SessionId, msg: &ServerMsg) {
        let Some(bytes) = encode(msg) else {
            return;
        };
        for member in self.members(room_id) {
            if *member == except {
                continue;
            }
            if let Some(session) = self.sessions.get(member) {
                let _ = session.outbox.send(bytes.clone());
            }
        }
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}
