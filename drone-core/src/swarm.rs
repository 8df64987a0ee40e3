//! The swarm coordinator: owns the world and every drone, maps formations
//! onto drones and drives the per-tick update.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::mem;

use crate::controller::MotionController;
use crate::drone::{DestroyCause, Drone, DroneConfig, DroneId, DroneSnapshot};
use crate::formation::IdleLayout;
use crate::physics::PhysicsWorld;
use crate::{math, Vector2D};

#[derive(Debug, Clone, PartialEq)]
pub enum SwarmError {
    /// A target point had a NaN or infinite coordinate.
    InvalidTarget { index: usize },
    TooManyTargets { requested: usize, max: usize },
    UnknownDrone(DroneId),
    NoPointerDrone,
}

impl fmt::Display for SwarmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwarmError::InvalidTarget { index } => {
                write!(f, "target point {} is not a finite coordinate", index)
            }
            SwarmError::TooManyTargets { requested, max } => {
                write!(f, "formation needs {} drones, limit is {}", requested, max)
            }
            SwarmError::UnknownDrone(id) => write!(f, "{} is not an active drone", id),
            SwarmError::NoPointerDrone => write!(f, "no pointer drone has been spawned"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SwarmError {}

/// Configuration for the swarm coordinator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwarmConfig {
    pub drone: DroneConfig,
    /// Seconds of simulated time per tick.
    pub dt: f32,
    /// Largest formation `retarget` accepts.
    pub max_drones: usize,
    pub idle_layout: IdleLayout,
    /// Phase advance of the idle layout per tick.
    pub idle_phase_step: f32,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            drone: DroneConfig::default(),
            dt: 1.0 / 60.0,
            max_drones: 2000,
            idle_layout: IdleLayout::default(),
            idle_phase_step: 0.01,
        }
    }
}

/// What a call to [`SwarmCoordinator::retarget`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetargetReport {
    pub spawned: usize,
    pub reused: usize,
    pub retired: usize,
    /// The requested formation was already displayed.
    pub unchanged: bool,
    /// The swarm switched to the idle layout.
    pub idle: bool,
}

/// Birth location used when none is configured: horizontally centered,
/// 400 units above the bottom edge.
pub fn default_spawn_point(width: f32, height: f32) -> Vector2D {
    Vector2D::new(math::round(width / 2.0), math::round(height) - 400.0)
}

/// Picks the drone that should fly to `target`.
///
/// Without spawning, this is the candidate nearest to `target`, ties going
/// to the earliest. When a spawn is permitted, only candidates strictly
/// closer to `target` than `spawn_point` qualify; `None` then means a new
/// drone should be spawned.
pub fn pick_candidate<I>(
    candidates: I,
    target: Vector2D,
    spawn_point: Vector2D,
    can_spawn: bool,
) -> Option<usize>
where
    I: IntoIterator<Item = (usize, Vector2D)>,
{
    let spawn_distance = spawn_point.distance(&target);
    let mut best = None;
    let mut shortest = f32::INFINITY;

    for (index, position) in candidates {
        let distance = position.distance(&target);
        let beats_spawn = !can_spawn || distance < spawn_distance;
        if beats_spawn && distance < shortest {
            best = Some(index);
            shortest = distance;
        }
    }

    best
}

pub struct SwarmCoordinator<W: PhysicsWorld> {
    world: W,
    template: Box<dyn MotionController>,
    config: SwarmConfig,
    spawn_point: Vector2D,

    active: Vec<Drone>,
    retiring: Vec<Drone>,
    pointer: Option<Drone>,

    formation: Vec<Vector2D>,
    idle_phase: f32,
    next_id: u64,
    tick_count: u64,
}

impl<W: PhysicsWorld> SwarmCoordinator<W> {
    /// `template` is never flown itself; every spawned drone gets a
    /// duplicate of it.
    pub fn new(
        world: W,
        template: Box<dyn MotionController>,
        config: SwarmConfig,
        spawn_point: Vector2D,
    ) -> Self {
        Self {
            world,
            template,
            config,
            spawn_point,
            active: Vec::new(),
            retiring: Vec::new(),
            pointer: None,
            formation: Vec::new(),
            idle_phase: 0.0,
            next_id: 0,
            tick_count: 0,
        }
    }

    /// Like [`new`](Self::new), spawning at [`default_spawn_point`] for the
    /// world's canvas.
    pub fn with_default_spawn(
        world: W,
        template: Box<dyn MotionController>,
        config: SwarmConfig,
    ) -> Self {
        let (width, height) = world.size();
        Self::new(world, template, config, default_spawn_point(width, height))
    }

    /// Switches to a new formation, reusing, spawning and retiring drones
    /// so that exactly one active drone flies to each point.
    ///
    /// An empty list switches to the idle layout without retiring anyone.
    /// Invalid input is rejected before anything changes.
    pub fn retarget(&mut self, points: &[Vector2D]) -> Result<RetargetReport, SwarmError> {
        if points.len() > self.config.max_drones {
            return Err(SwarmError::TooManyTargets {
                requested: points.len(),
                max: self.config.max_drones,
            });
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(SwarmError::InvalidTarget { index });
        }

        if points == self.formation.as_slice() {
            return Ok(RetargetReport {
                unchanged: true,
                idle: points.is_empty(),
                ..RetargetReport::default()
            });
        }

        self.formation = points.to_vec();
        if points.is_empty() {
            log::debug!("formation cleared, {} drones go idle", self.active.len());
            return Ok(RetargetReport {
                idle: true,
                ..RetargetReport::default()
            });
        }

        let wanted = points.len();
        let pool_size = self.active.len();
        let mut pool: Vec<Option<Drone>> = mem::take(&mut self.active)
            .into_iter()
            .map(Some)
            .collect();
        let positions: Vec<Vector2D> = pool
            .iter()
            .flatten()
            .map(|drone| drone.position(&self.world))
            .collect();

        let mut report = RetargetReport::default();
        let mut assigned = Vec::with_capacity(wanted);

        for &target in points {
            let can_spawn = pool_size + report.spawned < wanted;
            let unclaimed = pool
                .iter()
                .zip(positions.iter())
                .enumerate()
                .filter(|(_, (slot, _))| slot.is_some())
                .map(|(index, (_, &position))| (index, position));

            let chosen = pick_candidate(unclaimed, target, self.spawn_point, can_spawn)
                .and_then(|index| pool[index].take());
            let mut drone = match chosen {
                Some(drone) => {
                    report.reused += 1;
                    drone
                }
                None => {
                    report.spawned += 1;
                    self.spawn_drone(self.spawn_point)
                }
            };
            drone.set_target(target);
            assigned.push(drone);
        }

        for mut drone in pool.into_iter().flatten() {
            drone.destroy(&mut self.world, DestroyCause::Retired);
            self.retiring.push(drone);
            report.retired += 1;
        }
        self.active = assigned;

        log::debug!(
            "retargeted to {} points: {} reused, {} spawned, {} retired",
            wanted,
            report.reused,
            report.spawned,
            report.retired
        );
        Ok(report)
    }

    /// Advances the whole swarm by one frame.
    pub fn tick(&mut self) {
        if self.formation.is_empty() {
            self.apply_idle_layout();
        }

        self.update_pointer();

        let mut survivors = Vec::with_capacity(self.active.len());
        for mut drone in mem::take(&mut self.active) {
            if let Err(err) = drone.update(&mut self.world) {
                log::warn!("{} controller failed, destroying it: {}", drone.id(), err);
                drone.destroy(&mut self.world, DestroyCause::ControllerFailure);
            }
            if drone.is_active() {
                survivors.push(drone);
            } else {
                self.retiring.push(drone);
            }
        }
        self.active = survivors;

        self.reap();
        self.world.advance(self.config.dt);
        self.tick_count += 1;
    }

    fn apply_idle_layout(&mut self) {
        let (width, height) = self.world.size();
        for (index, drone) in self.active.iter_mut().enumerate() {
            let spot = self
                .config
                .idle_layout
                .position(index, self.idle_phase, width, height);
            drone.set_target(spot);
        }
        self.idle_phase += self.config.idle_phase_step;
    }

    fn update_pointer(&mut self) {
        let Some(pointer) = self.pointer.as_mut() else {
            return;
        };
        if let Err(err) = pointer.update(&mut self.world) {
            log::warn!("pointer {} controller failed: {}", pointer.id(), err);
            pointer.destroy(&mut self.world, DestroyCause::ControllerFailure);
        }
        if pointer.is_active() {
            return;
        }

        if let Some(wreck) = self.pointer.take() {
            let target = wreck.target();
            self.retiring.push(wreck);
            let mut replacement = self.spawn_drone(self.spawn_point);
            replacement.set_target(target);
            log::debug!("pointer drone respawned as {}", replacement.id());
            self.pointer = Some(replacement);
        }
    }

    /// Disposes every retiring drone whose settling delay has run out.
    fn reap(&mut self) {
        let world = &mut self.world;
        self.retiring.retain_mut(|drone| !drone.settle(world));
    }

    fn spawn_drone(&mut self, position: Vector2D) -> Drone {
        let id = DroneId(self.next_id);
        self.next_id += 1;
        log::debug!("spawning {} at ({}, {})", id, position.x, position.y);
        Drone::new(
            id,
            &mut self.world,
            self.template.duplicate(),
            position,
            self.config.drone,
        )
    }

    /// Adds an active drone at `position` outside of any formation. It
    /// tours the default waypoints until a retarget claims it.
    pub fn spawn_at(&mut self, position: Vector2D) -> DroneId {
        let drone = self.spawn_drone(position);
        let id = drone.id();
        self.active.push(drone);
        id
    }

    /// Spawns the pointer-following drone if there is none yet.
    pub fn spawn_pointer_drone(&mut self) -> DroneId {
        if let Some(pointer) = &self.pointer {
            return pointer.id();
        }
        let mut drone = self.spawn_drone(self.spawn_point);
        drone.set_target(self.spawn_point);
        let id = drone.id();
        self.pointer = Some(drone);
        id
    }

    pub fn set_pointer_target(&mut self, point: Vector2D) -> Result<(), SwarmError> {
        if !point.is_finite() {
            return Err(SwarmError::InvalidTarget { index: 0 });
        }
        let pointer = self.pointer.as_mut().ok_or(SwarmError::NoPointerDrone)?;
        pointer.set_target(point);
        Ok(())
    }

    /// Points a single active drone (or the pointer drone) at `point`.
    ///
    /// While the swarm is idle the next tick moves formation drones back
    /// to their idle spots.
    pub fn set_manual_override(&mut self, id: DroneId, point: Vector2D) -> Result<(), SwarmError> {
        if !point.is_finite() {
            return Err(SwarmError::InvalidTarget { index: 0 });
        }
        let drone = self
            .active
            .iter_mut()
            .chain(self.pointer.iter_mut())
            .find(|drone| drone.id() == id)
            .ok_or(SwarmError::UnknownDrone(id))?;
        drone.set_target(point);
        Ok(())
    }

    /// Disposes every drone immediately, skipping the settling delay, and
    /// forgets the current formation.
    pub fn dispose_all(&mut self) {
        let world = &mut self.world;
        for mut drone in self
            .active
            .drain(..)
            .chain(self.retiring.drain(..))
            .chain(self.pointer.take())
        {
            if !drone.is_disposed() {
                drone.dispose(world);
            }
        }
        self.formation.clear();
    }

    /// Snapshots of the pointer, active and retiring drones, in that order.
    pub fn snapshots(&self) -> Vec<DroneSnapshot> {
        self.pointer
            .iter()
            .chain(self.active.iter())
            .chain(self.retiring.iter())
            .map(|drone| drone.snapshot(&self.world))
            .collect()
    }

    pub fn drone(&self, id: DroneId) -> Option<&Drone> {
        self.active
            .iter()
            .chain(self.pointer.iter())
            .chain(self.retiring.iter())
            .find(|drone| drone.id() == id)
    }

    pub fn active(&self) -> &[Drone] {
        &self.active
    }

    pub fn retiring(&self) -> &[Drone] {
        &self.retiring
    }

    pub fn pointer(&self) -> Option<&Drone> {
        self.pointer.as_ref()
    }

    pub fn formation(&self) -> &[Vector2D] {
        &self.formation
    }

    pub fn is_idle(&self) -> bool {
        self.formation.is_empty()
    }

    pub fn spawn_point(&self) -> Vector2D {
        self.spawn_point
    }

    pub fn set_spawn_point(&mut self, spawn_point: Vector2D) {
        self.spawn_point = spawn_point;
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn idle_phase(&self) -> f32 {
        self.idle_phase
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }
}
