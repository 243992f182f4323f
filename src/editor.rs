//! The local editing session for one room.
//!
//! The editor owns the room's brick set as this client sees it. Local clicks
//! go through the placement engine and the collision check before they
//! mutate the set and are sent to the relay. Events relayed from peers are
//! applied as they arrive and, under [`RemotePolicy::Trust`], are not checked
//! again.
//!
//! Between sending `JoinRoom` and receiving a peer snapshot, every local and
//! remote event is also logged. The snapshot was taken before any of them
//! reached the serving peer, so they are replayed on top of it.

use std::f64::consts::FRAC_PI_2;

use brickroom_core::placement::{face_placement, ground_placement};
use brickroom_core::{
    apply_room_event, find_collision, generate_brick_id, validate_brick, validate_bricks, Brick,
    BrickSet, BrickType, ClientMsg, Creation, RoomEvent, RoomId, ServerMsg, SessionId,
    DEFAULT_BRICK_COLOR,
};
use glam::DVec3;

use crate::link::RoomLink;

/// How events relayed from peers are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemotePolicy {
    /// Apply as received.
    #[default]
    Trust,
    /// Re-run shape validation and the collision check first.
    Validate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    Ground {
        point: DVec3,
    },
    Brick {
        brick_id: String,
        point: DVec3,
        normal: Option<DVec3>,
        alt_key: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Placed(Brick),
    Removed(Brick),
    /// The candidate overlapped an existing brick or sat below the ground.
    Rejected,
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    Applied,
    Unchanged,
    Rejected(String),
    Joined { peers: u32 },
    SnapshotServed { requester: SessionId },
    ServerError { code: String, message: String },
    Ignored,
}

/// Tool state: what the next click will place.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub color: String,
    pub kind: BrickType,
    pub quarter_turns: u8,
    pub erasing: bool,
}

impl Palette {
    pub fn rotation(&self) -> f64 {
        f64::from(self.quarter_turns % 4) * FRAC_PI_2
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            color: DEFAULT_BRICK_COLOR.to_string(),
            kind: BrickType::default(),
            quarter_turns: 0,
            erasing: false,
        }
    }
}

pub struct Editor<L> {
    room_id: RoomId,
    bricks: BrickSet,
    palette: Palette,
    policy: RemotePolicy,
    session_id: Option<SessionId>,
    /// Events since the join, while a peer snapshot is still expected.
    since_join: Option<Vec<RoomEvent>>,
    link: L,
}

impl<L: RoomLink> Editor<L> {
    pub fn new(room_id: RoomId, link: L) -> Self {
        Self {
            room_id,
            bricks: BrickSet::new(),
            palette: Palette::default(),
            policy: RemotePolicy::default(),
            session_id: None,
            since_join: None,
            link,
        }
    }

    /// An editor for a connection that has already sent `JoinRoom`.
    pub fn joining(room_id: RoomId, link: L) -> Self {
        let mut editor = Self::new(room_id, link);
        editor.since_join = Some(Vec::new());
        editor
    }

    pub fn with_policy(mut self, policy: RemotePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn bricks(&self) -> &BrickSet {
        &self.bricks
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn policy(&self) -> RemotePolicy {
        self.policy
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    pub fn join(&mut self) {
        self.link.send(ClientMsg::JoinRoom {
            room_id: self.room_id.to_string(),
        });
        self.since_join = Some(Vec::new());
    }

    pub fn awaiting_snapshot(&self) -> bool {
        self.since_join.is_some()
    }

    /// Stops waiting for a peer snapshot; later snapshots replace the set
    /// outright.
    pub fn abandon_snapshot(&mut self) {
        self.since_join = None;
    }

    pub fn select_color(&mut self, color: impl Into<String>) {
        self.palette.color = color.into();
    }

    pub fn select_type(&mut self, kind: BrickType) {
        self.palette.kind = kind;
    }

    pub fn rotate(&mut self) {
        self.palette.quarter_turns = (self.palette.quarter_turns + 1) % 4;
    }

    pub fn set_erasing(&mut self, erasing: bool) {
        self.palette.erasing = erasing;
    }

    pub fn toggle_erasing(&mut self) -> bool {
        self.palette.erasing = !self.palette.erasing;
        self.palette.erasing
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> ClickOutcome {
        match event {
            PointerEvent::Ground { point } => {
                let position =
                    ground_placement(point, self.palette.kind, self.palette.rotation());
                self.place_at(position)
            }
            PointerEvent::Brick {
                brick_id,
                point,
                normal,
                alt_key,
            } => {
                if alt_key || self.palette.erasing {
                    return match self.remove_brick(&brick_id) {
                        Some(brick) => ClickOutcome::Removed(brick),
                        None => ClickOutcome::Ignored,
                    };
                }
                let Some(normal) = normal else {
                    return ClickOutcome::Ignored;
                };
                let Some(target) = self.bricks.get(&brick_id) else {
                    return ClickOutcome::Ignored;
                };
                match face_placement(
                    target,
                    point,
                    normal,
                    self.palette.kind,
                    self.palette.rotation(),
                ) {
                    Some(position) => self.place_at(position),
                    None => ClickOutcome::Rejected,
                }
            }
        }
    }

    /// Places a brick from the palette at an already snapped center.
    pub fn place_at(&mut self, position: DVec3) -> ClickOutcome {
        let kind = self.palette.kind;
        let rotation = self.palette.rotation();
        if let Some(blocking) = find_collision(position, kind, rotation, &self.bricks) {
            log::debug!(
                "{kind} at {:?} overlaps brick {}; not placed",
                position.to_array(),
                blocking.id
            );
            return ClickOutcome::Rejected;
        }
        let brick = Brick {
            id: generate_brick_id(),
            position: position.to_array(),
            color: self.palette.color.clone(),
            kind,
            rotation,
        };
        self.bricks.push(brick.clone());
        self.emit(RoomEvent::Place {
            brick: brick.clone(),
        });
        ClickOutcome::Placed(brick)
    }

    pub fn remove_brick(&mut self, brick_id: &str) -> Option<Brick> {
        let removed = self.bricks.remove(brick_id)?;
        self.emit(RoomEvent::Remove {
            brick_id: removed.id.clone(),
        });
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.bricks.clear();
        self.emit(RoomEvent::Clear);
    }

    /// Replaces the room's bricks: peers get a clear followed by one place
    /// per brick.
    pub fn load_bricks(&mut self, bricks: Vec<Brick>) {
        self.bricks.replace(bricks);
        self.emit(RoomEvent::Clear);
        for brick in self.bricks.to_vec() {
            self.emit(RoomEvent::Place { brick });
        }
    }

    pub fn load_creation(&mut self, creation: &Creation) {
        self.load_bricks(creation.bricks.clone());
    }

    pub fn apply_server_msg(&mut self, msg: ServerMsg) -> RemoteOutcome {
        match msg {
            ServerMsg::Welcome { session_id } => {
                self.session_id = Some(session_id);
                RemoteOutcome::Ignored
            }
            ServerMsg::Joined { room_id, peers } => {
                if room_id != self.room_id.as_str() {
                    return RemoteOutcome::Ignored;
                }
                if peers == 0 {
                    self.since_join = None;
                }
                RemoteOutcome::Joined { peers }
            }
            ServerMsg::Event { room_id, event } => {
                if room_id != self.room_id.as_str() {
                    return RemoteOutcome::Ignored;
                }
                self.apply_remote_event(event)
            }
            ServerMsg::SnapshotRequest { room_id, requester } => {
                if room_id != self.room_id.as_str() {
                    return RemoteOutcome::Ignored;
                }
                self.link.send(ClientMsg::Snapshot {
                    room_id,
                    requester,
                    bricks: self.bricks.to_vec(),
                });
                RemoteOutcome::SnapshotServed { requester }
            }
            ServerMsg::Snapshot { room_id, bricks } => {
                if room_id != self.room_id.as_str() {
                    return RemoteOutcome::Ignored;
                }
                if self.policy == RemotePolicy::Validate {
                    if let Err(err) = validate_bricks(&bricks) {
                        return RemoteOutcome::Rejected(err.to_string());
                    }
                }
                self.bricks.replace(bricks);
                for event in self.since_join.take().unwrap_or_default() {
                    if let RoomEvent::Place { brick } = &event {
                        if self.bricks.contains(&brick.id) {
                            continue;
                        }
                    }
                    apply_room_event(&event, &mut self.bricks);
                }
                RemoteOutcome::Applied
            }
            ServerMsg::Pong { .. } => RemoteOutcome::Ignored,
            ServerMsg::Error { code, message } => {
                log::warn!("relay error {code}: {message}");
                RemoteOutcome::ServerError { code, message }
            }
        }
    }

    fn apply_remote_event(&mut self, event: RoomEvent) -> RemoteOutcome {
        if self.policy == RemotePolicy::Validate {
            if let RoomEvent::Place { brick } = &event {
                if let Err(reason) = self.check_remote_brick(brick) {
                    log::debug!("rejecting remote brick {}: {reason}", brick.id);
                    return RemoteOutcome::Rejected(reason);
                }
            }
        }
        if let Some(log) = self.since_join.as_mut() {
            log.push(event.clone());
        }
        if apply_room_event(&event, &mut self.bricks) {
            RemoteOutcome::Applied
        } else {
            RemoteOutcome::Unchanged
        }
    }

    fn check_remote_brick(&self, brick: &Brick) -> Result<(), String> {
        validate_brick(brick).map_err(|err| err.to_string())?;
        if self.bricks.contains(&brick.id) {
            return Err(format!("duplicate brick id {}", brick.id));
        }
        if let Some(blocking) =
            find_collision(brick.center(), brick.kind, brick.rotation, &self.bricks)
        {
            return Err(format!("overlaps brick {}", blocking.id));
        }
        Ok(())
    }

    fn emit(&mut self, event: RoomEvent) {
        if let Some(log) = self.since_join.as_mut() {
            log.push(event.clone());
        }
        self.link.send(ClientMsg::Event {
            room_id: self.room_id.to_string(),
            event,
        });
    }
}
