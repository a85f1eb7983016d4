//! World Components
//!
//! Positions on the continuous 2D map agents wander across.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Component: An agent's current position in the world
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// This position moved by (dx, dy) and clamped to a square world of the given size
    pub fn offset_within(&self, dx: f64, dy: f64, world_size: f64) -> Position {
        // Negative or NaN sizes collapse the world to the origin
        let world_size = if world_size >= 0.0 { world_size } else { 0.0 };
        Position {
            x: (self.x + dx).clamp(0.0, world_size),
            y: (self.y + dy).clamp(0.0, world_size),
        }
    }
}
