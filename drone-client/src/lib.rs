//! Headless driver for the drone swarm: loads a formation script, runs the
//! simulation in a [`SimpleWorld`] and streams JSON-lines snapshots.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use drone_core::{
    default_spawn_point, Drone, DroneConfig, DroneMode, HomingController, IdleLayout, Lifecycle,
    SimpleWorld, SwarmConfig, SwarmCoordinator, Vector2D,
};
use drone_shared::{
    DroneGroup, DroneSnapshot, DroneState, FormationUpdate, IdleLayoutSettings, Point,
    PointerUpdate, SwarmSettings, SwarmSnapshot, SwarmStatus,
};
use serde::{Deserialize, Serialize};

/// A timed list of formation and pointer changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Script {
    pub steps: Vec<ScriptStep>,
}

/// Applied right before the tick with the same number runs, e.g.
/// `{ "tick": 30, "points": [...] }` or `{ "tick": 60, "pointer": {...} }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptStep {
    pub tick: u64,
    #[serde(flatten)]
    pub formation: FormationUpdate,
    #[serde(flatten)]
    pub pointer: PointerUpdate,
}

pub fn load_script(path: &Path) -> Result<Script> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse script {}", path.display()))
}

pub fn load_settings(path: &Path) -> Result<SwarmSettings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings {}", path.display()))?;
    SwarmSettings::from_json(&text)
        .with_context(|| format!("Failed to parse settings {}", path.display()))
}

pub fn swarm_config(settings: &SwarmSettings) -> SwarmConfig {
    let idle_layout = match settings.idle_layout {
        IdleLayoutSettings::Grid { columns, spacing } => IdleLayout::Grid { columns, spacing },
        IdleLayoutSettings::Orbit { spread_x, spread_y } => IdleLayout::Orbit { spread_x, spread_y },
    };
    SwarmConfig {
        drone: DroneConfig {
            size: settings.drone_size,
            time_budget: settings.time_budget,
            dwell_threshold: settings.dwell_threshold,
            arrival_radius: settings.arrival_radius,
            speed_weight: settings.speed_weight,
            flat_bonus: settings.flat_bonus,
            settle_ticks: settings.settle_ticks,
        },
        dt: 1.0 / settings.ticks_per_second.max(1.0),
        max_drones: settings.max_drones,
        idle_layout,
        idle_phase_step: settings.idle_phase_step,
    }
}

/// Canvas and run parameters that do not belong in a settings file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOptions {
    pub width: f32,
    pub height: f32,
    pub seed: Option<u64>,
    /// Spawn the pointer drone before the first tick.
    pub pointer: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            seed: None,
            pointer: false,
        }
    }
}

fn to_vector(point: Point) -> Vector2D {
    Vector2D::new(point.x, point.y)
}

fn to_point(vector: Vector2D) -> Point {
    Point::new(vector.x, vector.y)
}

pub struct Simulation {
    swarm: SwarmCoordinator<SimpleWorld>,
    steps: Vec<ScriptStep>,
    next_step: usize,
    spawned: usize,
    retired: usize,
}

impl Simulation {
    pub fn new(settings: &SwarmSettings, options: RunOptions, script: Script) -> Self {
        let world = match options.seed {
            Some(seed) => SimpleWorld::with_seed(options.width, options.height, seed),
            None => SimpleWorld::new(options.width, options.height),
        }
        .with_gravity(settings.gravity)
        .with_thruster_force(settings.thruster_force);

        let spawn_point = settings
            .spawn_point
            .map(to_vector)
            .unwrap_or_else(|| default_spawn_point(options.width, options.height));

        let mut controller = HomingController::new();
        controller.gravity = settings.gravity;
        controller.thruster_accel = settings.thruster_force;

        let mut swarm = SwarmCoordinator::new(
            world,
            Box::new(controller),
            swarm_config(settings),
            spawn_point,
        );
        if options.pointer {
            swarm.spawn_pointer_drone();
        }

        let mut steps = script.steps;
        steps.sort_by_key(|step| step.tick);

        Self {
            swarm,
            steps,
            next_step: 0,
            spawned: 0,
            retired: 0,
        }
    }

    /// Applies the script steps that are due, then advances one tick.
    pub fn step(&mut self) -> Result<()> {
        let now = self.swarm.tick_count();
        while let Some(step) = self.steps.get(self.next_step) {
            if step.tick > now {
                break;
            }
            let step = step.clone();
            self.next_step += 1;
            self.apply(&step)
                .with_context(|| format!("Script step for tick {} failed", step.tick))?;
        }

        self.swarm.tick();
        Ok(())
    }

    fn apply(&mut self, step: &ScriptStep) -> Result<()> {
        if let Some(points) = &step.formation.points {
            let targets: Vec<Vector2D> = points.iter().copied().map(to_vector).collect();
            let report = self.swarm.retarget(&targets)?;
            self.spawned += report.spawned;
            self.retired += report.retired;
            log::info!(
                "Tick {}: formation of {} points ({} spawned, {} retired)",
                self.swarm.tick_count(),
                targets.len(),
                report.spawned,
                report.retired
            );
        }
        if let Some(pointer) = step.pointer.pointer {
            self.swarm.spawn_pointer_drone();
            self.swarm.set_pointer_target(to_vector(pointer))?;
            log::debug!("Pointer moved to ({}, {})", pointer.x, pointer.y);
        }
        Ok(())
    }

    pub fn snapshot(&self) -> SwarmSnapshot {
        let world = self.swarm.world();
        let describe = |drone: &Drone, group: DroneGroup| {
            let view = drone.snapshot(world);
            DroneSnapshot {
                id: view.id.0,
                group,
                state: match view.lifecycle {
                    Lifecycle::Active => DroneState::Active,
                    Lifecycle::Destroyed { .. } => DroneState::Destroyed,
                    Lifecycle::Disposed => DroneState::Disposed,
                },
                position: to_point(view.position),
                angle: view.angle,
                target: to_point(view.target),
                manual: view.mode == DroneMode::Manual,
                score: view.score,
            }
        };

        let drones = self
            .swarm
            .pointer()
            .map(|d| describe(d, DroneGroup::Pointer))
            .into_iter()
            .chain(self.swarm.active().iter().map(|d| describe(d, DroneGroup::Active)))
            .chain(
                self.swarm
                    .retiring()
                    .iter()
                    .map(|d| describe(d, DroneGroup::Retiring)),
            )
            .collect();

        SwarmSnapshot {
            tick: self.swarm.tick_count(),
            idle: self.swarm.is_idle(),
            drones,
        }
    }

    pub fn status(&self) -> SwarmStatus {
        SwarmStatus {
            ticks: self.swarm.tick_count(),
            active: self.swarm.active().len(),
            retiring: self.swarm.retiring().len(),
            pointer: self.swarm.pointer().is_some(),
            spawned: self.spawned,
            retired: self.retired,
        }
    }

    pub fn swarm(&self) -> &SwarmCoordinator<SimpleWorld> {
        &self.swarm
    }

    /// Releases every drone. The simulation can keep ticking afterwards.
    pub fn shutdown(&mut self) {
        self.swarm.dispose_all();
    }
}

/// Runs `ticks` ticks, writing a snapshot line after every
/// `snapshot_every`-th tick when a period is given.
pub fn run<W: Write>(
    simulation: &mut Simulation,
    ticks: u64,
    snapshot_every: Option<u64>,
    out: &mut W,
) -> Result<SwarmStatus> {
    for _ in 0..ticks {
        simulation.step()?;

        let tick = simulation.swarm().tick_count();
        if let Some(every) = snapshot_every.filter(|every| *every > 0) {
            if tick % every == 0 {
                let line = simulation
                    .snapshot()
                    .to_json_line()
                    .context("Failed to encode snapshot")?;
                writeln!(out, "{}", line).context("Failed to write snapshot")?;
            }
        }
    }
    out.flush().context("Failed to flush snapshots")?;

    Ok(simulation.status())
}
