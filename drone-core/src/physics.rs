//! Boundary between the swarm and the rigid-body engine driving it.
//!
//! The core never integrates motion or resolves contacts itself. Everything
//! it needs from the engine goes through [`PhysicsWorld`].

use crate::{math, Vector2D};

/// Opaque handle to a body living in a [`PhysicsWorld`].
///
/// Worlds may recycle the storage of destroyed bodies; the generation
/// tells a stale handle apart from the body now occupying its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    pub index: u32,
    pub generation: u32,
}

impl BodyHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Kinematic state of a body as reported by the world.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    pub position: Vector2D,
    pub velocity: Vector2D,
    pub angle: f32,
    pub angular_velocity: f32,
}

/// Thruster commands for a two-thruster drone body.
///
/// Thrust is a fraction of full power in `[0, 1]`; angles are radians
/// relative to the body, within `[-π/2, π/2]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Actuation {
    pub left_thrust: f32,
    pub right_thrust: f32,
    pub left_angle: f32,
    pub right_angle: f32,
}

/// Static axis-aligned wall, described by its center and full extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub center: Vector2D,
    pub width: f32,
    pub height: f32,
}

impl Boundary {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            center: Vector2D::new(x, y),
            width,
            height,
        }
    }

    /// The four walls framing a `width` x `height` canvas: bottom, top,
    /// left, right. The floor is extra wide so drones skidding off the
    /// sides still hit it.
    pub fn canvas_edges(width: f32, height: f32) -> [Boundary; 4] {
        [
            Boundary::new(width / 2.0, height + 10.0, width * 4.0, 20.0),
            Boundary::new(width / 2.0, -10.0, width, 20.0),
            Boundary::new(-10.0, height / 2.0, 20.0, height),
            Boundary::new(width + 10.0, height / 2.0, 20.0, height),
        ]
    }

    /// Whether a square of side `size` centered at `position` overlaps
    /// this wall.
    pub fn overlaps_square(&self, position: Vector2D, size: f32) -> bool {
        let half = size / 2.0;
        let dx = math::abs(position.x - self.center.x);
        let dy = math::abs(position.y - self.center.y);
        dx < self.width / 2.0 + half && dy < self.height / 2.0 + half
    }
}

/// Rigid-body engine consumed by drones and the coordinator.
///
/// Implementations must tolerate `remove_body` and `destroy_body` on a
/// handle that is no longer present.
pub trait PhysicsWorld {
    /// Inserts a new drone body and returns its handle.
    fn add_body(&mut self, position: Vector2D, angle: f32) -> BodyHandle;

    /// Re-inserts a body previously taken out with [`remove_body`](Self::remove_body),
    /// keeping its last known state.
    fn restore_body(&mut self, handle: BodyHandle);

    /// Takes a body out of the simulation. It can be restored later.
    fn remove_body(&mut self, handle: BodyHandle);

    /// Drops a body for good and frees its storage. The handle is dead
    /// afterwards, even for [`restore_body`](Self::restore_body).
    fn destroy_body(&mut self, handle: BodyHandle);

    fn contains(&self, handle: BodyHandle) -> bool;

    /// Advances the simulation by `dt` seconds.
    fn advance(&mut self, dt: f32);

    fn boundaries(&self) -> &[Boundary];

    fn collides(&self, handle: BodyHandle, boundary: &Boundary) -> bool;

    fn body_state(&self, handle: BodyHandle) -> BodyState;

    fn set_actuation(&mut self, handle: BodyHandle, actuation: Actuation);

    /// A uniformly random point on the canvas.
    fn random_position(&mut self) -> Vector2D;

    /// Canvas width and height in world units.
    fn size(&self) -> (f32, f32);
}
