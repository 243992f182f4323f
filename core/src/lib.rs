pub mod brick;
pub mod codec;
pub mod creation;
pub mod id;
pub mod placement;
pub mod protocol;
pub mod room;
pub mod room_id;
pub mod validate;

pub use brick::{
    stud_offsets, Brick, BrickType, ParseBrickTypeError, BRICK_HEIGHT, BRICK_PALETTE,
    DEFAULT_BRICK_COLOR,
};
pub use codec::{decode, encode};
pub use creation::{Creation, CREATION_VERSION, ANONYMOUS_AUTHOR};
pub use id::{generate_brick_id, generate_creation_id, is_valid_token, ID_ALPHABET};
pub use placement::{
    brick_bounds, check_collision, effective_footprint, face_placement, find_collision,
    ground_placement, snap_to_grid, Aabb, Axis, COLLISION_EPSILON, GROUND_LAYER_Y,
};
pub use protocol::{ClientMsg, ServerMsg, SessionId, DEFAULT_ROOM_ID};
pub use room::{apply_room_event, BrickSet, RoomEvent};
pub use room_id::{is_valid_room_id, RoomId, RoomIdError, ROOM_ID_ALPHABET, ROOM_ID_MAX_LEN};
pub use validate::{validate_brick, validate_bricks, BrickError};
