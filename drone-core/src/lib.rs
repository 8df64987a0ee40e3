#![cfg_attr(not(feature = "std"), no_std)]

//! Simulation core for a swarm of thruster drones that spell out formations.
//!
//! A [`SwarmCoordinator`] owns a [`PhysicsWorld`] and the live [`Drone`]s.
//! Every frame the driver calls [`SwarmCoordinator::tick`]; whenever the
//! desired shape changes it calls [`SwarmCoordinator::retarget`] with the
//! new list of target points.

extern crate alloc;

pub mod controller;
pub mod drone;
pub mod formation;
pub mod physics;
pub mod swarm;
#[cfg(feature = "std")]
pub mod world;

pub use controller::{
    Control, ControllerError, HomingController, LinearPolicy, MotionController, Observation,
};
pub use drone::{
    DestroyCause, Drone, DroneConfig, DroneError, DroneId, DroneMode, DroneSnapshot, Lifecycle,
};
pub use formation::IdleLayout;
pub use physics::{Actuation, BodyHandle, BodyState, Boundary, PhysicsWorld};
pub use swarm::{
    default_spawn_point, pick_candidate, RetargetReport, SwarmConfig, SwarmCoordinator, SwarmError,
};
#[cfg(feature = "std")]
pub use world::SimpleWorld;

/// A 2D vector used for positions, velocities and target points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2D {
    pub x: f32,
    pub y: f32,
}

impl Vector2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn magnitude(&self) -> f32 {
        math::sqrt(self.x * self.x + self.y * self.y)
    }

    pub fn distance(&self, other: &Vector2D) -> f32 {
        (*self - *other).magnitude()
    }

    /// Rotates the vector counter-clockwise by `angle` radians.
    pub fn rotate(&self, angle: f32) -> Self {
        let (sin, cos) = (math::sin(angle), math::cos(angle));
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    /// 2D cross product (z component of the 3D cross product).
    pub fn cross(&self, other: &Vector2D) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl core::ops::Add for Vector2D {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl core::ops::Sub for Vector2D {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl core::ops::Mul<f32> for Vector2D {
    type Output = Self;

    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

impl core::ops::AddAssign for Vector2D {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

/// Float helpers that fall back to `libm` when `std` is unavailable.
pub(crate) mod math {
    pub fn sqrt(v: f32) -> f32 {
        #[cfg(feature = "std")]
        {
            v.sqrt()
        }
        #[cfg(not(feature = "std"))]
        {
            libm::sqrtf(v)
        }
    }

    pub fn sin(v: f32) -> f32 {
        #[cfg(feature = "std")]
        {
            v.sin()
        }
        #[cfg(not(feature = "std"))]
        {
            libm::sinf(v)
        }
    }

    pub fn cos(v: f32) -> f32 {
        #[cfg(feature = "std")]
        {
            v.cos()
        }
        #[cfg(not(feature = "std"))]
        {
            libm::cosf(v)
        }
    }

    pub fn abs(v: f32) -> f32 {
        libm::fabsf(v)
    }

    pub fn tanh(v: f32) -> f32 {
        libm::tanhf(v)
    }

    pub fn round(v: f32) -> f32 {
        libm::roundf(v)
    }

    pub fn floor(v: f32) -> f32 {
        libm::floorf(v)
    }

    pub fn atan2(y: f32, x: f32) -> f32 {
        libm::atan2f(y, x)
    }
}
