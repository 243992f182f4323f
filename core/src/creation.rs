use serde::{Deserialize, Serialize};

use crate::brick::Brick;

pub const CREATION_VERSION: u32 = 1;
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// A saved gallery entry. `thumbnail` is a reference understood by the store
/// that wrote it (a relative file name for the filesystem gallery).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creation {
    pub version: u32,
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub author_name: String,
    pub bricks: Vec<Brick>,
    pub thumbnail: String,
    pub created_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at_ms: Option<i64>,
}

impl Creation {
    pub fn brick_count(&self) -> usize {
        self.bricks.len()
    }
}

pub fn encode_bricks(bricks: &[Brick]) -> serde_json::Result<String> {
    serde_json::to_string(bricks)
}

pub fn decode_bricks(raw: &str) -> serde_json::Result<Vec<Brick>> {
    serde_json::from_str(raw)
}

/// Newest first; ties fall back to id so listings are stable.
pub fn sort_newest_first(creations: &mut [Creation]) {
    creations.sort_by(|a, b| {
        b.created_at_ms
            .cmp(&a.created_at_ms)
            .then_with(|| a.id.cmp(&b.id))
    });
}
