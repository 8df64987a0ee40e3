//! Idle formations: where drones park while no word is displayed.

use crate::{math, Vector2D};

/// Layout used while the swarm has no formation to spell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdleLayout {
    /// Rows of `columns` drones, `spacing` apart, growing right and down
    /// from the canvas center.
    Grid { columns: u32, spacing: f32 },
    /// Drones spiral around the canvas center and drift as the phase
    /// advances.
    Orbit { spread_x: f32, spread_y: f32 },
}

impl Default for IdleLayout {
    fn default() -> Self {
        IdleLayout::Grid {
            columns: 15,
            spacing: 50.0,
        }
    }
}

impl IdleLayout {
    /// Parking spot of the `index`-th drone at `phase` on a canvas of the
    /// given size.
    pub fn position(&self, index: usize, phase: f32, width: f32, height: f32) -> Vector2D {
        let center = Vector2D::new(math::floor(width / 2.0), math::floor(height / 2.0));
        match *self {
            IdleLayout::Grid { columns, spacing } => {
                let columns = columns.max(1) as usize;
                let column = (index % columns) as f32;
                let row = (index / columns) as f32;
                center + Vector2D::new(column * spacing, row * spacing)
            }
            IdleLayout::Orbit { spread_x, spread_y } => {
                let i = index as f32;
                let turn = phase + i;
                center
                    + Vector2D::new(
                        i * spread_x * math::cos(turn),
                        i * spread_y * math::sin(turn),
                    )
            }
        }
    }
}
