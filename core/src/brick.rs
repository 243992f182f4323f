use std::fmt;
use std::str::FromStr;

use glam::DVec3;
use rkyv::{Archive, Deserialize, Serialize};

pub const BRICK_HEIGHT: f64 = 1.0;
pub const STUD_PITCH: f64 = 0.5;
pub const STUD_HEIGHT: f64 = 0.601;

pub const DEFAULT_BRICK_COLOR: &str = "#ff8a80";
pub const BRICK_PALETTE: [&str; 8] = [
    "#ff8a80", "#b9f6ca", "#82b1ff", "#ffff8d", "#ffffff", "#212121", "#ffd180", "#ea80fc",
];

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(u8)]
pub enum BrickType {
    #[serde(rename = "1x1")]
    OneByOne,
    #[serde(rename = "1x2")]
    OneByTwo,
    #[serde(rename = "1x4")]
    OneByFour,
    #[default]
    #[serde(rename = "2x2")]
    TwoByTwo,
    #[serde(rename = "2x4")]
    TwoByFour,
    #[serde(rename = "4x4")]
    FourByFour,
}

impl BrickType {
    pub const ALL: [BrickType; 6] = [
        BrickType::OneByOne,
        BrickType::OneByTwo,
        BrickType::OneByFour,
        BrickType::TwoByTwo,
        BrickType::TwoByFour,
        BrickType::FourByFour,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BrickType::OneByOne => "1x1",
            BrickType::OneByTwo => "1x2",
            BrickType::OneByFour => "1x4",
            BrickType::TwoByTwo => "2x2",
            BrickType::TwoByFour => "2x4",
            BrickType::FourByFour => "4x4",
        }
    }

    /// Unrotated `(width, depth)` in world units.
    pub fn dimensions(self) -> (f64, f64) {
        match self {
            BrickType::OneByOne => (0.5, 0.5),
            BrickType::OneByTwo => (0.5, 1.0),
            BrickType::OneByFour => (0.5, 2.0),
            BrickType::TwoByTwo => (1.0, 1.0),
            BrickType::TwoByFour => (1.0, 2.0),
            BrickType::FourByFour => (2.0, 2.0),
        }
    }
}

impl fmt::Display for BrickType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown brick type '{0}' (expected one of 1x1, 1x2, 1x4, 2x2, 2x4, 4x4)")]
pub struct ParseBrickTypeError(pub String);

impl FromStr for BrickType {
    type Err = ParseBrickTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        BrickType::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseBrickTypeError(trimmed.to_string()))
    }
}

/// A placed brick. The JSON form is the gallery's storage representation, so
/// field names follow the web client (`type` instead of `kind`).
#[derive(
    Debug,
    Clone,
    PartialEq,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Brick {
    pub id: String,
    pub position: [f64; 3],
    pub color: String,
    #[serde(rename = "type")]
    pub kind: BrickType,
    pub rotation: f64,
}

impl Brick {
    pub fn center(&self) -> DVec3 {
        DVec3::from_array(self.position)
    }

    /// Zero-based layer index the brick rests on.
    pub fn layer(&self) -> i64 {
        (self.position[1] - BRICK_HEIGHT * 0.5).round() as i64
    }
}

/// Local stud centers on top of a brick, before its rotation is applied.
pub fn stud_offsets(kind: BrickType) -> Vec<[f64; 3]> {
    let (width, depth) = kind.dimensions();
    let count_x = (width / STUD_PITCH).round() as usize;
    let count_z = (depth / STUD_PITCH).round() as usize;
    let start_x = -(width / 2.0) + STUD_PITCH / 2.0;
    let start_z = -(depth / 2.0) + STUD_PITCH / 2.0;
    let mut studs = Vec::with_capacity(count_x * count_z);
    for x in 0..count_x {
        for z in 0..count_z {
            studs.push([
                start_x + x as f64 * STUD_PITCH,
                STUD_HEIGHT,
                start_z + z as f64 * STUD_PITCH,
            ]);
        }
    }
    studs
}
