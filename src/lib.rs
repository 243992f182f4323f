//! Client side of brickroom: the editing session, its link to a room relay,
//! and the creation gallery.

pub mod editor;
pub mod gallery;
pub mod link;
pub mod sync;

pub use editor::{ClickOutcome, Editor, Palette, PointerEvent, RemoteOutcome, RemotePolicy};
pub use gallery::{Author, Gallery, GalleryError};
pub use link::{MemoryLink, OfflineLink, RoomLink};
pub use sync::{
    connect_room, connect_room_with_retry, parse_relay_url, RoomConnection, SyncError,
    WsRoomLink, DEFAULT_RELAY_URL,
};
