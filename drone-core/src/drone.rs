//! A single drone: one physical body, one controller and the state machine
//! deciding where it flies, how it is scored and when it dies.

use alloc::boxed::Box;
use core::f32::consts::FRAC_PI_2;
use core::fmt;

use crate::controller::{ControllerError, MotionController, Observation};
use crate::physics::{Actuation, BodyHandle, PhysicsWorld};
use crate::{math, Vector2D};

/// Upper bound on the number of waypoints a drone can sequence through.
pub const MAX_WAYPOINTS: usize = 16;

/// Default waypoint tour, as fractions of canvas width and height.
pub const DEFAULT_WAYPOINTS: [(f32, f32); 9] = [
    (0.5, 0.5),
    (0.3, 0.6),
    (0.5, 0.8),
    (0.3, 0.4),
    (0.2, 0.8),
    (0.5, 0.5),
    (0.8, 0.2),
    (0.8, 0.8),
    (0.2, 0.2),
];

pub type Waypoints = heapless::Vec<Vector2D, MAX_WAYPOINTS>;

/// Stable identity of a drone inside one coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DroneId(pub u64);

impl fmt::Display for DroneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "drone-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DroneMode {
    /// Tours `target_sequence`, racing a time budget for every waypoint.
    Sequenced,
    /// Steered from outside through a manual target; never times out.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    /// Body and controller are kept until the countdown runs out.
    Destroyed { settle_ticks_remaining: u32 },
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyCause {
    Collision,
    TimeBudget,
    SequenceComplete,
    Retired,
    ControllerFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DroneError {
    EmptyWaypoints,
    TooManyWaypoints { requested: usize, max: usize },
    /// A waypoint had a NaN or infinite coordinate.
    InvalidWaypoint { index: usize },
}

impl fmt::Display for DroneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DroneError::EmptyWaypoints => write!(f, "waypoint list is empty"),
            DroneError::TooManyWaypoints { requested, max } => {
                write!(f, "{} waypoints requested, limit is {}", requested, max)
            }
            DroneError::InvalidWaypoint { index } => {
                write!(f, "waypoint {} is not a finite coordinate", index)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DroneError {}

/// Tuning shared by every drone of a swarm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DroneConfig {
    /// Side of the square body, in world units.
    pub size: f32,
    /// Ticks allowed to reach a waypoint in sequenced mode.
    pub time_budget: u32,
    /// Ticks to hover inside `arrival_radius` before a waypoint counts.
    pub dwell_threshold: u32,
    pub arrival_radius: f32,
    /// Bonus per unused tick of the time budget on arrival.
    pub speed_weight: f32,
    pub flat_bonus: f32,
    /// Reaping passes between destruction and disposal.
    pub settle_ticks: u32,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            size: 20.0,
            time_budget: 600,
            dwell_threshold: 100,
            arrival_radius: 20.0,
            speed_weight: 0.1,
            flat_bonus: 200.0,
            settle_ticks: 120,
        }
    }
}

/// Read-only view of a drone for renderers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DroneSnapshot {
    pub id: DroneId,
    pub position: Vector2D,
    pub angle: f32,
    pub target: Vector2D,
    pub mode: DroneMode,
    pub lifecycle: Lifecycle,
    pub score: f32,
}

/// Scales [`DEFAULT_WAYPOINTS`] to a canvas, flooring to whole units.
pub fn default_waypoints(width: f32, height: f32) -> Waypoints {
    DEFAULT_WAYPOINTS
        .iter()
        .map(|&(fx, fy)| Vector2D::new(math::floor(width * fx), math::floor(height * fy)))
        .collect()
}

pub struct Drone {
    id: DroneId,
    body: BodyHandle,
    body_in_world: bool,
    controller: Box<dyn MotionController>,
    config: DroneConfig,

    target_sequence: Waypoints,
    current_target_index: usize,
    manual_target: Option<Vector2D>,
    mode: DroneMode,

    elapsed_ticks: u32,
    time_budget: u32,
    dwell_ticks: u32,
    total_dwell_ticks: u32,
    score: f32,

    lifecycle: Lifecycle,
    destroy_cause: Option<DestroyCause>,
}

impl fmt::Debug for Drone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drone")
            .field("id", &self.id)
            .field("body", &self.body)
            .field("mode", &self.mode)
            .field("lifecycle", &self.lifecycle)
            .field("score", &self.score)
            .finish_non_exhaustive()
    }
}

impl Drone {
    /// Creates a sequenced drone at `position` touring the default waypoints
    /// of the world's canvas.
    pub fn new<W: PhysicsWorld + ?Sized>(
        id: DroneId,
        world: &mut W,
        controller: Box<dyn MotionController>,
        position: Vector2D,
        config: DroneConfig,
    ) -> Self {
        let (width, height) = world.size();
        let body = world.add_body(position, 0.0);

        Self {
            id,
            body,
            body_in_world: true,
            controller,
            config,
            target_sequence: default_waypoints(width, height),
            current_target_index: 0,
            manual_target: None,
            mode: DroneMode::Sequenced,
            elapsed_ticks: 0,
            time_budget: config.time_budget,
            dwell_ticks: 0,
            total_dwell_ticks: 0,
            score: 0.0,
            lifecycle: Lifecycle::Active,
            destroy_cause: None,
        }
    }

    /// Builds an independent drone at `position` with a duplicated
    /// controller. The new drone starts with this drone's score.
    pub fn duplicate<W: PhysicsWorld + ?Sized>(
        &self,
        id: DroneId,
        world: &mut W,
        position: Vector2D,
    ) -> Self {
        let mut copy = Drone::new(id, world, self.controller.duplicate(), position, self.config);
        copy.target_sequence = self.target_sequence.clone();
        copy.score = self.score;
        copy
    }

    /// Replaces the waypoint tour and restarts it from the first entry.
    pub fn set_waypoints(&mut self, waypoints: &[Vector2D]) -> Result<(), DroneError> {
        if waypoints.is_empty() {
            return Err(DroneError::EmptyWaypoints);
        }
        let sequence = Waypoints::from_slice(waypoints).map_err(|_| {
            DroneError::TooManyWaypoints {
                requested: waypoints.len(),
                max: MAX_WAYPOINTS,
            }
        })?;
        if let Some(index) = waypoints.iter().position(|p| !p.is_finite()) {
            return Err(DroneError::InvalidWaypoint { index });
        }

        self.target_sequence = sequence;
        self.current_target_index = 0;
        self.dwell_ticks = 0;
        self.elapsed_ticks = 0;
        Ok(())
    }

    /// Steers the drone toward `target` from now on, switching it to
    /// manual mode.
    pub fn set_target(&mut self, target: Vector2D) {
        self.mode = DroneMode::Manual;
        self.manual_target = Some(target);
        self.time_budget = u32::MAX;
    }

    /// Drops the manual target and resumes the waypoint tour with a fresh
    /// time budget.
    pub fn clear_manual_target(&mut self) {
        self.mode = DroneMode::Sequenced;
        self.manual_target = None;
        self.time_budget = self.config.time_budget;
        self.elapsed_ticks = 0;
        self.dwell_ticks = 0;
    }

    /// The point the drone currently steers toward.
    pub fn target(&self) -> Vector2D {
        match self.manual_target {
            Some(target) => target,
            // Sequences are never empty and the index stays in range.
            None => self.target_sequence[self.current_target_index],
        }
    }

    /// Distance to [`target`](Self::target), rounded to whole units.
    pub fn distance_to_target<W: PhysicsWorld + ?Sized>(&self, world: &W) -> f32 {
        let position = world.body_state(self.body).position;
        math::round(self.target().distance(&position))
    }

    /// Advances the drone by one tick.
    ///
    /// Only active drones do anything. A controller failure is returned
    /// with the drone left active; the caller decides what to do with it.
    pub fn update<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
    ) -> Result<(), ControllerError> {
        if !self.is_active() {
            return Ok(());
        }

        let hit_boundary = world
            .boundaries()
            .iter()
            .any(|boundary| world.collides(self.body, boundary));
        if hit_boundary {
            self.dwell_ticks = 0;
            self.destroy(world, DestroyCause::Collision);
            // A body that is about to go away need not keep colliding.
            if self.mode != DroneMode::Manual {
                self.remove_body(world);
            }
            return Ok(());
        }

        let distance = self.distance_to_target(world);
        self.score += 1.0 / (distance + 1.0);

        if self.mode == DroneMode::Sequenced && distance <= self.config.arrival_radius {
            self.dwell_ticks += 1;
            self.total_dwell_ticks += 1;
            if self.dwell_ticks >= self.config.dwell_threshold {
                let spare = self.time_budget.saturating_sub(self.elapsed_ticks) as f32;
                self.score += spare * self.config.speed_weight + self.config.flat_bonus;
                self.current_target_index += 1;
                self.dwell_ticks = 0;
                self.elapsed_ticks = 0;

                if self.current_target_index == self.target_sequence.len() {
                    self.current_target_index = 0;
                    self.destroy(world, DestroyCause::SequenceComplete);
                    return Ok(());
                }
            }
        } else {
            self.dwell_ticks = 0;
        }

        self.steer(world)?;

        self.elapsed_ticks += 1;
        if self.mode == DroneMode::Sequenced && self.elapsed_ticks >= self.time_budget {
            self.destroy(world, DestroyCause::TimeBudget);
        }

        Ok(())
    }

    fn steer<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) -> Result<(), ControllerError> {
        let state = world.body_state(self.body);
        let observation = Observation {
            velocity: state.velocity,
            angular_velocity: state.angular_velocity,
            angle: state.angle,
            target_vector: self.target() - state.position,
        };

        let outputs = self.controller.predict(&observation)?;

        // Magnitude from the absolute value, direction within a quarter turn
        // either side of the body axis.
        let actuation = Actuation {
            left_thrust: math::abs(outputs[0]).min(1.0),
            right_thrust: math::abs(outputs[1]).min(1.0),
            left_angle: outputs[2].clamp(-1.0, 1.0) * FRAC_PI_2,
            right_angle: outputs[3].clamp(-1.0, 1.0) * FRAC_PI_2,
        };
        world.set_actuation(self.body, actuation);
        Ok(())
    }

    /// Marks the drone destroyed, cuts its thrusters and starts the
    /// settling countdown. The body coasts until disposal.
    /// Destroying a drone that is already destroyed changes nothing.
    pub fn destroy<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, cause: DestroyCause) {
        debug_assert!(
            self.lifecycle != Lifecycle::Disposed,
            "{} destroyed after disposal",
            self.id
        );
        if self.lifecycle == Lifecycle::Active {
            log::debug!("{} destroyed: {:?}", self.id, cause);
            self.lifecycle = Lifecycle::Destroyed {
                settle_ticks_remaining: self.config.settle_ticks,
            };
            self.destroy_cause = Some(cause);
            world.set_actuation(self.body, Actuation::default());
        }
    }

    /// One reaping pass. Counts the settling delay down and disposes the
    /// drone once it has elapsed. Returns `true` when the drone is disposed.
    pub fn settle<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) -> bool {
        match self.lifecycle {
            Lifecycle::Active => false,
            Lifecycle::Destroyed {
                settle_ticks_remaining: 0,
            } => {
                self.dispose(world);
                true
            }
            Lifecycle::Destroyed {
                settle_ticks_remaining,
            } => {
                self.lifecycle = Lifecycle::Destroyed {
                    settle_ticks_remaining: settle_ticks_remaining - 1,
                };
                false
            }
            Lifecycle::Disposed => true,
        }
    }

    /// Releases the body and the controller. Terminal.
    pub fn dispose<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        debug_assert!(
            self.lifecycle != Lifecycle::Disposed,
            "{} disposed twice",
            self.id
        );
        if self.lifecycle == Lifecycle::Disposed {
            return;
        }
        world.destroy_body(self.body);
        self.body_in_world = false;
        self.controller.release();
        self.lifecycle = Lifecycle::Disposed;
        log::debug!("{} disposed", self.id);
    }

    /// Takes the body out of the world without touching the lifecycle.
    pub fn freeze<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        self.remove_body(world);
    }

    /// Puts a frozen body back into the world.
    pub fn unfreeze<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        if !self.body_in_world && self.lifecycle != Lifecycle::Disposed {
            world.restore_body(self.body);
            self.body_in_world = true;
        }
    }

    fn remove_body<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        if self.body_in_world {
            world.remove_body(self.body);
            self.body_in_world = false;
        }
    }

    pub fn snapshot<W: PhysicsWorld + ?Sized>(&self, world: &W) -> DroneSnapshot {
        let state = world.body_state(self.body);
        DroneSnapshot {
            id: self.id,
            position: state.position,
            angle: state.angle,
            target: self.target(),
            mode: self.mode,
            lifecycle: self.lifecycle,
            score: self.score,
        }
    }

    pub fn id(&self) -> DroneId {
        self.id
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn position<W: PhysicsWorld + ?Sized>(&self, world: &W) -> Vector2D {
        world.body_state(self.body).position
    }

    pub fn mode(&self) -> DroneMode {
        self.mode
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn destroy_cause(&self) -> Option<DestroyCause> {
        self.destroy_cause
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Destroyed { .. })
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle == Lifecycle::Disposed
    }

    pub fn has_body(&self) -> bool {
        self.body_in_world
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }

    pub fn time_budget(&self) -> u32 {
        self.time_budget
    }

    pub fn dwell_ticks(&self) -> u32 {
        self.dwell_ticks
    }

    pub fn total_dwell_ticks(&self) -> u32 {
        self.total_dwell_ticks
    }

    pub fn current_target_index(&self) -> usize {
        self.current_target_index
    }

    pub fn manual_target(&self) -> Option<Vector2D> {
        self.manual_target
    }

    pub fn target_sequence(&self) -> &[Vector2D] {
        &self.target_sequence
    }

    pub fn config(&self) -> &DroneConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Control;
    use crate::world::SimpleWorld;
    use alloc::rc::Rc;
    use core::cell::Cell;

    /// Holds still and counts how often it was asked.
    struct IdleController {
        calls: Rc<Cell<u32>>,
        released: Rc<Cell<bool>>,
    }

    impl IdleController {
        fn boxed() -> Box<dyn MotionController> {
            Box::new(Self {
                calls: Rc::new(Cell::new(0)),
                released: Rc::new(Cell::new(false)),
            })
        }
    }

    impl MotionController for IdleController {
        fn predict(&mut self, _: &Observation) -> Result<Control, ControllerError> {
            self.calls.set(self.calls.get() + 1);
            Ok([0.0; 4])
        }

        fn duplicate(&self) -> Box<dyn MotionController> {
            IdleController::boxed()
        }

        fn release(&mut self) {
            self.released.set(true);
        }
    }

    fn still_world() -> SimpleWorld {
        SimpleWorld::new(800.0, 600.0).with_gravity(0.0)
    }

    fn config() -> DroneConfig {
        DroneConfig {
            time_budget: 50,
            dwell_threshold: 5,
            settle_ticks: 3,
            ..DroneConfig::default()
        }
    }

    fn drone_at(world: &mut SimpleWorld, position: Vector2D) -> Drone {
        Drone::new(DroneId(1), world, IdleController::boxed(), position, config())
    }

    #[test]
    fn test_default_waypoints_scale_to_canvas() {
        let waypoints = default_waypoints(801.0, 601.0);
        assert_eq!(waypoints.len(), 9);
        assert_eq!(waypoints[0], Vector2D::new(400.0, 300.0));
        assert_eq!(waypoints[1], Vector2D::new(240.0, 360.0));
        assert_eq!(waypoints[8], Vector2D::new(160.0, 120.0));
    }

    #[test]
    fn test_new_drone_targets_first_waypoint() {
        let mut world = still_world();
        let drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        assert_eq!(drone.mode(), DroneMode::Sequenced);
        assert_eq!(drone.target(), Vector2D::new(400.0, 300.0));
        assert!(drone.is_active());
        assert!(world.contains(drone.body()));
    }

    #[test]
    fn test_manual_target_takes_precedence() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.set_target(Vector2D::new(10.0, 20.0));
        assert_eq!(drone.mode(), DroneMode::Manual);
        assert_eq!(drone.target(), Vector2D::new(10.0, 20.0));

        drone.clear_manual_target();
        assert_eq!(drone.mode(), DroneMode::Sequenced);
        assert_eq!(drone.target(), Vector2D::new(400.0, 300.0));
        assert_eq!(drone.time_budget(), 50);
    }

    #[test]
    fn test_distance_is_rounded() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.set_target(Vector2D::new(101.0, 101.0));
        assert_eq!(drone.distance_to_target(&world), 1.0);
    }

    #[test]
    fn test_score_accumulates_homing_reward() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.set_target(Vector2D::new(100.0, 109.0));

        drone.update(&mut world).unwrap();
        assert!((drone.score() - 0.1).abs() < 1e-6);

        let mut last = drone.score();
        for _ in 0..20 {
            drone.update(&mut world).unwrap();
            assert!(drone.score() > last);
            last = drone.score();
        }
    }

    #[test]
    fn test_time_budget_destroys_on_exact_tick() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));

        for _ in 0..49 {
            drone.update(&mut world).unwrap();
        }
        assert!(drone.is_active());
        assert_eq!(drone.elapsed_ticks(), 49);

        drone.update(&mut world).unwrap();
        assert!(drone.is_destroyed());
        assert_eq!(drone.destroy_cause(), Some(DestroyCause::TimeBudget));
        // Timed-out drones keep their body while settling.
        assert!(world.contains(drone.body()));
    }

    #[test]
    fn test_manual_mode_never_times_out() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.set_target(Vector2D::new(500.0, 500.0));
        for _ in 0..200 {
            drone.update(&mut world).unwrap();
        }
        assert!(drone.is_active());
    }

    #[test]
    fn test_dwelling_advances_sequence_with_bonus() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone
            .set_waypoints(&[Vector2D::new(105.0, 100.0), Vector2D::new(700.0, 500.0)])
            .unwrap();

        for _ in 0..4 {
            drone.update(&mut world).unwrap();
        }
        assert_eq!(drone.dwell_ticks(), 4);
        assert_eq!(drone.elapsed_ticks(), 4);
        let before = drone.score();

        drone.update(&mut world).unwrap();
        assert_eq!(drone.current_target_index(), 1);
        assert_eq!(drone.dwell_ticks(), 0);
        // The clock restarts and the arrival tick already counts.
        assert_eq!(drone.elapsed_ticks(), 1);
        // (50 - 4) * 0.1 + 200 on top of the homing reward 1 / 6.
        let gained = drone.score() - before;
        assert!((gained - (204.6 + 1.0 / 6.0)).abs() < 1e-3);

        drone.update(&mut world).unwrap();
        assert_eq!(drone.elapsed_ticks(), 2);
    }

    #[test]
    fn test_leaving_radius_resets_dwell() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.set_waypoints(&[Vector2D::new(100.0, 100.0)]).unwrap();

        drone.update(&mut world).unwrap();
        drone.update(&mut world).unwrap();
        assert_eq!(drone.dwell_ticks(), 2);

        world.place(drone.body(), Vector2D::new(300.0, 300.0));
        drone.update(&mut world).unwrap();
        assert_eq!(drone.dwell_ticks(), 0);
        assert_eq!(drone.total_dwell_ticks(), 2);
    }

    #[test]
    fn test_completing_sequence_destroys() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.set_waypoints(&[Vector2D::new(100.0, 100.0)]).unwrap();

        for _ in 0..5 {
            drone.update(&mut world).unwrap();
        }
        assert!(drone.is_destroyed());
        assert_eq!(drone.destroy_cause(), Some(DestroyCause::SequenceComplete));
        assert_eq!(drone.current_target_index(), 0);
    }

    #[test]
    fn test_manual_mode_ignores_arrival() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.set_waypoints(&[Vector2D::new(100.0, 100.0)]).unwrap();
        drone.set_target(Vector2D::new(100.0, 100.0));

        for _ in 0..20 {
            drone.update(&mut world).unwrap();
        }
        assert!(drone.is_active());
        assert_eq!(drone.dwell_ticks(), 0);
        assert_eq!(drone.current_target_index(), 0);
    }

    #[test]
    fn test_collision_removes_sequenced_body() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(5.0, 300.0));
        let score = drone.score();

        drone.update(&mut world).unwrap();
        assert!(drone.is_destroyed());
        assert_eq!(drone.destroy_cause(), Some(DestroyCause::Collision));
        assert!(!world.contains(drone.body()));
        assert_eq!(drone.score(), score);
    }

    #[test]
    fn test_collision_keeps_manual_body() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(5.0, 300.0));
        drone.set_target(Vector2D::new(400.0, 300.0));

        drone.update(&mut world).unwrap();
        assert!(drone.is_destroyed());
        assert!(world.contains(drone.body()));
    }

    #[test]
    fn test_destroyed_drone_is_inert() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.destroy(&mut world, DestroyCause::Retired);
        let score = drone.score();
        drone.update(&mut world).unwrap();
        assert_eq!(drone.score(), score);
        assert_eq!(drone.elapsed_ticks(), 0);
    }

    #[test]
    fn test_settle_disposes_after_delay() {
        let mut world = still_world();
        let released = Rc::new(Cell::new(false));
        let controller = Box::new(IdleController {
            calls: Rc::new(Cell::new(0)),
            released: released.clone(),
        });
        let mut drone = Drone::new(
            DroneId(9),
            &mut world,
            controller,
            Vector2D::new(100.0, 100.0),
            config(),
        );

        drone.destroy(&mut world, DestroyCause::Retired);
        for _ in 0..3 {
            assert!(!drone.settle(&mut world));
            assert!(drone.is_destroyed());
        }
        assert!(drone.settle(&mut world));
        assert!(drone.is_disposed());
        assert!(released.get());
        assert!(!world.contains(drone.body()));
    }

    #[test]
    fn test_update_runs_controller_once_per_tick() {
        let mut world = still_world();
        let calls = Rc::new(Cell::new(0));
        let controller = Box::new(IdleController {
            calls: calls.clone(),
            released: Rc::new(Cell::new(false)),
        });
        let mut drone = Drone::new(
            DroneId(2),
            &mut world,
            controller,
            Vector2D::new(100.0, 100.0),
            config(),
        );
        for _ in 0..7 {
            drone.update(&mut world).unwrap();
        }
        assert_eq!(calls.get(), 7);
    }

    #[test]
    fn test_freeze_and_unfreeze() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.freeze(&mut world);
        assert!(!world.contains(drone.body()));
        assert!(!drone.has_body());
        drone.unfreeze(&mut world);
        assert!(world.contains(drone.body()));
        assert_eq!(drone.position(&world), Vector2D::new(100.0, 100.0));
    }

    #[test]
    fn test_duplicate_carries_score_and_spawns_fresh_body() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.set_target(Vector2D::new(100.0, 100.0));
        drone.update(&mut world).unwrap();

        let copy = drone.duplicate(DroneId(2), &mut world, Vector2D::new(400.0, 200.0));
        assert_eq!(copy.score(), drone.score());
        assert_ne!(copy.body(), drone.body());
        assert_eq!(copy.position(&world), Vector2D::new(400.0, 200.0));
        assert_eq!(copy.mode(), DroneMode::Sequenced);
    }

    #[test]
    fn test_set_waypoints_rejects_bad_input() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        assert_eq!(drone.set_waypoints(&[]), Err(DroneError::EmptyWaypoints));

        let too_many = [Vector2D::zero(); MAX_WAYPOINTS + 1];
        assert_eq!(
            drone.set_waypoints(&too_many),
            Err(DroneError::TooManyWaypoints {
                requested: MAX_WAYPOINTS + 1,
                max: MAX_WAYPOINTS
            })
        );

        let bad = [Vector2D::zero(), Vector2D::new(f32::NAN, 1.0)];
        assert_eq!(
            drone.set_waypoints(&bad),
            Err(DroneError::InvalidWaypoint { index: 1 })
        );
        assert_eq!(drone.target_sequence().len(), 9);
    }

    #[test]
    fn test_destroy_cuts_thrusters() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        let full = Actuation {
            left_thrust: 1.0,
            right_thrust: 1.0,
            ..Actuation::default()
        };
        world.set_actuation(drone.body(), full);

        drone.destroy(&mut world, DestroyCause::Retired);
        assert_eq!(world.actuation(drone.body()), Some(Actuation::default()));
    }

    #[test]
    fn test_dispose_frees_world_slot() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.destroy(&mut world, DestroyCause::Retired);
        drone.dispose(&mut world);

        assert!(!drone.has_body());
        let next = world.add_body(Vector2D::new(50.0, 50.0), 0.0);
        assert_eq!(next.index, drone.body().index);
        assert_eq!(world.slot_count(), 1);

        // A disposed drone cannot pull the recycled body back.
        drone.unfreeze(&mut world);
        assert!(!drone.has_body());
    }

    #[test]
    fn test_settle_on_disposed_drone_is_a_no_op() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.dispose(&mut world);
        assert!(drone.settle(&mut world));
        assert!(drone.is_disposed());
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "disposed twice")]
    fn test_double_dispose_panics_in_debug() {
        let mut world = still_world();
        let mut drone = drone_at(&mut world, Vector2D::new(100.0, 100.0));
        drone.dispose(&mut world);
        drone.dispose(&mut world);
    }

    #[test]
    fn test_drone_error_display() {
        let err = DroneError::TooManyWaypoints {
            requested: 20,
            max: MAX_WAYPOINTS,
        };
        assert_eq!(err.to_string(), "20 waypoints requested, limit is 16");
    }
}
