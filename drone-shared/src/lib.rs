#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// A 2D point in canvas coordinates, y pointing down
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        libm::sqrtf(dx * dx + dy * dy)
    }
}

/// New formation for the swarm. `None` leaves the current formation
/// alone; an empty list sends the swarm idle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormationUpdate {
    #[serde(default)]
    pub points: Option<Vec<Point>>,
}

/// Where the pointer-following drone should fly. `None` leaves it alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PointerUpdate {
    #[serde(default)]
    pub pointer: Option<Point>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdleLayoutSettings {
    Grid { columns: u32, spacing: f32 },
    Orbit { spread_x: f32, spread_y: f32 },
}

impl Default for IdleLayoutSettings {
    fn default() -> Self {
        IdleLayoutSettings::Grid {
            columns: 15,
            spacing: 50.0,
        }
    }
}

/// Swarm tuning as read from a settings file. Missing fields take their
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SwarmSettings {
    pub drone_size: f32,
    pub time_budget: u32,
    pub dwell_threshold: u32,
    pub arrival_radius: f32,
    pub speed_weight: f32,
    pub flat_bonus: f32,
    pub settle_ticks: u32,
    pub ticks_per_second: f32,
    pub max_drones: usize,
    pub idle_layout: IdleLayoutSettings,
    pub idle_phase_step: f32,
    /// Overrides the birth location derived from the canvas size.
    pub spawn_point: Option<Point>,
    pub gravity: f32,
    pub thruster_force: f32,
}

impl Default for SwarmSettings {
    fn default() -> Self {
        Self {
            drone_size: 20.0,
            time_budget: 600,
            dwell_threshold: 100,
            arrival_radius: 20.0,
            speed_weight: 0.1,
            flat_bonus: 200.0,
            settle_ticks: 120,
            ticks_per_second: 60.0,
            max_drones: 2000,
            idle_layout: IdleLayoutSettings::default(),
            idle_phase_step: 0.01,
            spawn_point: None,
            gravity: 200.0,
            thruster_force: 400.0,
        }
    }
}

#[cfg(feature = "std")]
impl SwarmSettings {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Which collection of the coordinator a drone belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DroneGroup {
    Pointer,
    Active,
    Retiring,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DroneState {
    Active,
    Destroyed,
    Disposed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DroneSnapshot {
    pub id: u64,
    pub group: DroneGroup,
    pub state: DroneState,
    pub position: Point,
    pub angle: f32,
    pub target: Point,
    /// Steered by an outside target rather than its waypoint tour.
    pub manual: bool,
    pub score: f32,
}

/// One frame of the swarm, written as a JSON line by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwarmSnapshot {
    pub tick: u64,
    pub idle: bool,
    pub drones: Vec<DroneSnapshot>,
}

impl SwarmSnapshot {
    pub fn count(&self, group: DroneGroup) -> usize {
        self.drones.iter().filter(|d| d.group == group).count()
    }
}

#[cfg(feature = "std")]
impl SwarmSnapshot {
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Summary reported when a run finishes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwarmStatus {
    pub ticks: u64,
    pub active: usize,
    pub retiring: usize,
    pub pointer: bool,
    pub spawned: usize,
    pub retired: usize,
}
