//! A small reference [`PhysicsWorld`]: square two-thruster bodies, gravity,
//! linear and angular damping, axis-aligned walls around the canvas.
//!
//! Good enough to drive the swarm headless and in tests. Bodies never
//! collide with each other. Thrusters sit level with the center of mass,
//! so symmetric thrust never spins a body whatever the swivel angle.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::physics::{Actuation, BodyHandle, BodyState, Boundary, PhysicsWorld};
use crate::Vector2D;

#[derive(Debug, Clone)]
struct SimBody {
    state: BodyState,
    actuation: Actuation,
    in_world: bool,
}

/// Storage cell for one body. The generation is bumped every time the
/// body living here is destroyed.
#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    body: Option<SimBody>,
}

pub struct SimpleWorld {
    width: f32,
    height: f32,
    boundaries: Vec<Boundary>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    rng: StdRng,
    /// Downward acceleration, world units per second squared.
    pub gravity: f32,
    /// Force of one thruster at full power.
    pub thruster_force: f32,
    pub body_size: f32,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl SimpleWorld {
    pub fn new(width: f32, height: f32) -> Self {
        Self::with_rng(width, height, StdRng::from_entropy())
    }

    /// Same as [`new`](Self::new) with a deterministic random source.
    pub fn with_seed(width: f32, height: f32, seed: u64) -> Self {
        Self::with_rng(width, height, StdRng::seed_from_u64(seed))
    }

    fn with_rng(width: f32, height: f32, rng: StdRng) -> Self {
        Self {
            width,
            height,
            boundaries: Boundary::canvas_edges(width, height).to_vec(),
            slots: Vec::new(),
            free: Vec::new(),
            rng,
            gravity: 200.0,
            thruster_force: 400.0,
            body_size: 20.0,
            mass: 1.0,
            linear_damping: 0.5,
            angular_damping: 2.0,
        }
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_thruster_force(mut self, force: f32) -> Self {
        self.thruster_force = force;
        self
    }

    fn body(&self, handle: BodyHandle) -> Option<&SimBody> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.body.as_ref())
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut SimBody> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.body.as_mut())
    }

    /// Teleports a body and stops it.
    pub fn place(&mut self, handle: BodyHandle, position: Vector2D) {
        if let Some(body) = self.body_mut(handle) {
            body.state = BodyState {
                position,
                ..BodyState::default()
            };
        }
    }

    pub fn actuation(&self, handle: BodyHandle) -> Option<Actuation> {
        self.body(handle).map(|b| b.actuation)
    }

    /// Number of bodies currently simulated.
    pub fn body_count(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|slot| slot.body.as_ref())
            .filter(|b| b.in_world)
            .count()
    }

    /// Number of storage slots ever allocated, live or free.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn moment_of_inertia(&self) -> f32 {
        self.mass * self.body_size * self.body_size / 6.0
    }

    fn thruster_offsets(&self) -> [Vector2D; 2] {
        let half = self.body_size / 2.0;
        [Vector2D::new(-half, 0.0), Vector2D::new(half, 0.0)]
    }
}

impl PhysicsWorld for SimpleWorld {
    fn add_body(&mut self, position: Vector2D, angle: f32) -> BodyHandle {
        let body = SimBody {
            state: BodyState {
                position,
                angle,
                ..BodyState::default()
            },
            actuation: Actuation::default(),
            in_world: true,
        };

        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.body = Some(body);
                BodyHandle::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    body: Some(body),
                });
                BodyHandle::new(index, 0)
            }
        }
    }

    fn restore_body(&mut self, handle: BodyHandle) {
        if let Some(body) = self.body_mut(handle) {
            body.in_world = true;
        }
    }

    fn remove_body(&mut self, handle: BodyHandle) {
        if let Some(body) = self.body_mut(handle) {
            body.in_world = false;
        }
    }

    fn destroy_body(&mut self, handle: BodyHandle) {
        if self.body(handle).is_none() {
            return;
        }
        let slot = &mut self.slots[handle.index as usize];
        slot.body = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
    }

    fn contains(&self, handle: BodyHandle) -> bool {
        self.body(handle).map_or(false, |b| b.in_world)
    }

    fn advance(&mut self, dt: f32) {
        let offsets = self.thruster_offsets();
        let inertia = self.moment_of_inertia();
        let gravity = Vector2D::new(0.0, self.gravity);
        let linear_keep = (1.0 - self.linear_damping * dt).max(0.0);
        let angular_keep = (1.0 - self.angular_damping * dt).max(0.0);

        let live = self
            .slots
            .iter_mut()
            .filter_map(|slot| slot.body.as_mut())
            .filter(|b| b.in_world);
        for body in live {
            let state = &mut body.state;
            let thrusters = [
                (body.actuation.left_thrust, body.actuation.left_angle, offsets[0]),
                (body.actuation.right_thrust, body.actuation.right_angle, offsets[1]),
            ];

            let mut force = Vector2D::zero();
            let mut torque = 0.0;
            for (thrust, angle, offset) in thrusters {
                // Thrusters push along the body's -y axis, swivelled by their angle.
                let local = Vector2D::new(angle.sin(), -angle.cos()) * (thrust * self.thruster_force);
                let world_force = local.rotate(state.angle);
                torque += offset.rotate(state.angle).cross(&world_force);
                force += world_force;
            }

            let acceleration = force * (1.0 / self.mass) + gravity;
            state.velocity = (state.velocity + acceleration * dt) * linear_keep;
            state.angular_velocity =
                (state.angular_velocity + torque / inertia * dt) * angular_keep;
            state.position += state.velocity * dt;
            state.angle += state.angular_velocity * dt;
        }
    }

    fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    fn collides(&self, handle: BodyHandle, boundary: &Boundary) -> bool {
        match self.body(handle) {
            Some(body) if body.in_world => {
                boundary.overlaps_square(body.state.position, self.body_size)
            }
            _ => false,
        }
    }

    fn body_state(&self, handle: BodyHandle) -> BodyState {
        self.body(handle).map(|b| b.state).unwrap_or_default()
    }

    fn set_actuation(&mut self, handle: BodyHandle, actuation: Actuation) {
        if let Some(body) = self.body_mut(handle) {
            body.actuation = actuation;
        }
    }

    fn random_position(&mut self) -> Vector2D {
        Vector2D::new(
            self.rng.gen_range(0.0..self.width),
            self.rng.gen_range(0.0..self.height),
        )
    }

    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }
}
