//! Grid snapping, footprints and overlap tests for brick placement.
//!
//! Odd footprints (0.5, 1.5 units) are centered between half-unit grid lines
//! while even ones are centered on them, which is what lets any mix of brick
//! types tile without gaps.

use std::f64::consts::PI;

use glam::DVec3;

use crate::brick::{Brick, BrickType, BRICK_HEIGHT};

pub const GRID_UNIT: f64 = 0.5;
pub const GROUND_LAYER_Y: f64 = BRICK_HEIGHT * 0.5;
pub const ROTATION_SWAP_TOLERANCE: f64 = 0.1;
pub const COLLISION_EPSILON: f64 = 0.01;
pub const NORMAL_AXIS_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Rounds halves toward positive infinity, matching the web client.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub fn snap_to_grid(value: f64, size: f64) -> f64 {
    let odd = (size * 2.0) % 2.0 != 0.0;
    if odd {
        (value * 2.0).floor() / 2.0 + 0.25
    } else {
        round_half_up(value * 2.0) / 2.0
    }
}

/// `(width, depth)` after rotation; quarter turns swap the axes.
pub fn effective_footprint(kind: BrickType, rotation: f64) -> (f64, f64) {
    let (width, depth) = kind.dimensions();
    if (rotation % PI).abs() > ROTATION_SWAP_TOLERANCE {
        (depth, width)
    } else {
        (width, depth)
    }
}

pub fn snap_to_layer(y: f64) -> f64 {
    round_half_up(y - GROUND_LAYER_Y) + GROUND_LAYER_Y
}

pub fn dominant_axis(normal: DVec3) -> Option<Axis> {
    if normal.x.abs() > NORMAL_AXIS_THRESHOLD {
        Some(Axis::X)
    } else if normal.y.abs() > NORMAL_AXIS_THRESHOLD {
        Some(Axis::Y)
    } else if normal.z.abs() > NORMAL_AXIS_THRESHOLD {
        Some(Axis::Z)
    } else {
        None
    }
}

pub fn ground_placement(point: DVec3, kind: BrickType, rotation: f64) -> DVec3 {
    let (width, depth) = effective_footprint(kind, rotation);
    DVec3::new(
        snap_to_grid(point.x, width),
        GROUND_LAYER_Y,
        snap_to_grid(point.z, depth),
    )
}

/// Candidate center for a click on `target`'s face. Returns `None` when the
/// result would sit below the ground layer.
pub fn face_placement(
    target: &Brick,
    hit: DVec3,
    normal: DVec3,
    kind: BrickType,
    rotation: f64,
) -> Option<DVec3> {
    let (new_width, new_depth) = effective_footprint(kind, rotation);
    let (old_width, old_depth) = effective_footprint(target.kind, target.rotation);
    let center = target.center();

    let mut candidate = hit;
    match dominant_axis(normal) {
        Some(Axis::X) => {
            candidate.x = center.x + normal.x * (old_width / 2.0 + new_width / 2.0);
        }
        Some(Axis::Y) => {
            candidate.y = center.y + normal.y * (BRICK_HEIGHT / 2.0 + BRICK_HEIGHT / 2.0);
        }
        Some(Axis::Z) => {
            candidate.z = center.z + normal.z * (old_depth / 2.0 + new_depth / 2.0);
        }
        None => {}
    }

    candidate.x = snap_to_grid(candidate.x, new_width);
    candidate.z = snap_to_grid(candidate.z, new_depth);
    candidate.y = snap_to_layer(candidate.y);
    if candidate.y < GROUND_LAYER_Y {
        return None;
    }
    Some(candidate)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn from_center(center: DVec3, size: DVec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn shrink(self, epsilon: f64) -> Self {
        Self {
            min: self.min + DVec3::splat(epsilon),
            max: self.max - DVec3::splat(epsilon),
        }
    }

    /// Strict interval overlap on all three axes; shared faces do not count.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }
}

pub fn brick_bounds(position: DVec3, kind: BrickType, rotation: f64) -> Aabb {
    let (width, depth) = effective_footprint(kind, rotation);
    Aabb::from_center(position, DVec3::new(width, BRICK_HEIGHT, depth))
}

/// First existing brick that a candidate pose would overlap.
pub fn find_collision<'a, I>(
    position: DVec3,
    kind: BrickType,
    rotation: f64,
    bricks: I,
) -> Option<&'a Brick>
where
    I: IntoIterator<Item = &'a Brick>,
{
    let candidate = brick_bounds(position, kind, rotation).shrink(COLLISION_EPSILON);
    bricks.into_iter().find(|brick| {
        let existing = brick_bounds(brick.center(), brick.kind, brick.rotation);
        candidate.overlaps(&existing)
    })
}

pub fn check_collision<'a, I>(position: DVec3, kind: BrickType, rotation: f64, bricks: I) -> bool
where
    I: IntoIterator<Item = &'a Brick>,
{
    find_collision(position, kind, rotation, bricks).is_some()
}
