use rkyv::{Archive, Deserialize, Serialize};

use crate::brick::Brick;

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum RoomEvent {
    Place { brick: Brick },
    Remove { brick_id: String },
    Clear,
}

impl RoomEvent {
    /// Event name as the web client spells it.
    pub fn name(&self) -> &'static str {
        match self {
            RoomEvent::Place { .. } => "place-brick",
            RoomEvent::Remove { .. } => "remove-brick",
            RoomEvent::Clear => "clear",
        }
    }
}

/// Bricks of one room in placement order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrickSet {
    bricks: Vec<Brick>,
}

impl BrickSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bricks(bricks: Vec<Brick>) -> Self {
        Self { bricks }
    }

    pub fn len(&self) -> usize {
        self.bricks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bricks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Brick> {
        self.bricks.iter()
    }

    pub fn as_slice(&self) -> &[Brick] {
        &self.bricks
    }

    pub fn to_vec(&self) -> Vec<Brick> {
        self.bricks.clone()
    }

    pub fn get(&self, brick_id: &str) -> Option<&Brick> {
        self.bricks.iter().find(|brick| brick.id == brick_id)
    }

    pub fn contains(&self, brick_id: &str) -> bool {
        self.get(brick_id).is_some()
    }

    pub fn push(&mut self, brick: Brick) {
        self.bricks.push(brick);
    }

    /// Removes the first brick with `brick_id`.
    pub fn remove(&mut self, brick_id: &str) -> Option<Brick> {
        let index = self.bricks.iter().position(|brick| brick.id == brick_id)?;
        Some(self.bricks.remove(index))
    }

    pub fn clear(&mut self) {
        self.bricks.clear();
    }

    pub fn replace(&mut self, bricks: Vec<Brick>) {
        self.bricks = bricks;
    }
}

impl<'a> IntoIterator for &'a BrickSet {
    type Item = &'a Brick;
    type IntoIter = std::slice::Iter<'a, Brick>;

    fn into_iter(self) -> Self::IntoIter {
        self.bricks.iter()
    }
}

/// Applies a relayed event as-is. Returns whether the set changed.
pub fn apply_room_event(event: &RoomEvent, set: &mut BrickSet) -> bool {
    match event {
        RoomEvent::Place { brick } => {
            set.push(brick.clone());
            true
        }
        RoomEvent::Remove { brick_id } => set.remove(brick_id).is_some(),
        RoomEvent::Clear => {
            let changed = !set.is_empty();
            set.clear();
            changed
        }
    }
}
