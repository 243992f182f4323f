use crate::brick::Brick;
use crate::placement::GROUND_LAYER_Y;

pub const BRICK_ID_MAX_LEN: usize = 64;
pub const BRICK_COLOR_MAX_LEN: usize = 32;
const LAYER_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrickError {
    #[error("brick id must not be empty")]
    EmptyId,
    #[error("brick id is {found} chars, limit is {max}")]
    IdTooLong { max: usize, found: usize },
    #[error("brick position must be finite")]
    NonFinitePosition,
    #[error("brick height {y} is not on a layer at or above the ground")]
    OffLayer { y: f64 },
    #[error("brick rotation must be finite")]
    NonFiniteRotation,
    #[error("brick color must be 1..={max} chars")]
    InvalidColor { max: usize },
    #[error("duplicate brick id {0}")]
    DuplicateId(String),
}

/// Shape checks for bricks that arrive from peers or from disk.
pub fn validate_brick(brick: &Brick) -> Result<(), BrickError> {
    if brick.id.trim().is_empty() {
        return Err(BrickError::EmptyId);
    }
    if brick.id.len() > BRICK_ID_MAX_LEN {
        return Err(BrickError::IdTooLong {
            max: BRICK_ID_MAX_LEN,
            found: brick.id.len(),
        });
    }
    if !brick.position.iter().all(|value| value.is_finite()) {
        return Err(BrickError::NonFinitePosition);
    }
    let y = brick.position[1];
    let layer = y - GROUND_LAYER_Y;
    if layer < -LAYER_TOLERANCE || (layer - layer.round()).abs() > LAYER_TOLERANCE {
        return Err(BrickError::OffLayer { y });
    }
    if !brick.rotation.is_finite() {
        return Err(BrickError::NonFiniteRotation);
    }
    if brick.color.trim().is_empty() || brick.color.len() > BRICK_COLOR_MAX_LEN {
        return Err(BrickError::InvalidColor {
            max: BRICK_COLOR_MAX_LEN,
        });
    }
    Ok(())
}

pub fn validate_bricks(bricks: &[Brick]) -> Result<(), BrickError> {
    let mut seen = std::collections::HashSet::with_capacity(bricks.len());
    for brick in bricks {
        validate_brick(brick)?;
        if !seen.insert(brick.id.as_str()) {
            return Err(BrickError::DuplicateId(brick.id.clone()));
        }
    }
    Ok(())
}
