//! Motion controllers: map what a drone senses to thruster commands.
//!
//! The swarm only relies on the [`MotionController`] contract. Two
//! implementations ship with the crate: a hand-tuned [`HomingController`]
//! and a [`LinearPolicy`] whose weights can be shared between drones or
//! forked and mutated.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::f32::consts::FRAC_PI_2;
use core::fmt;

use crate::{math, Vector2D};

/// Raw controller outputs, nominally each in `[-1, 1]`:
/// left thrust, right thrust, left angle, right angle.
pub type Control = [f32; 4];

/// What a drone reports to its controller every tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Observation {
    pub velocity: Vector2D,
    pub angular_velocity: f32,
    pub angle: f32,
    /// Target position minus drone position.
    pub target_vector: Vector2D,
}

impl Observation {
    pub fn features(&self) -> [f32; OBSERVATION_SIZE] {
        [
            self.velocity.x,
            self.velocity.y,
            self.angular_velocity,
            self.angle,
            self.target_vector.x,
            self.target_vector.y,
        ]
    }
}

pub const OBSERVATION_SIZE: usize = 6;
pub const CONTROL_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// `predict` was called after `release`.
    Released,
    /// The controller produced NaN or infinite outputs.
    NonFiniteOutput,
    /// Failure reported by an external inference backend.
    Backend(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::Released => write!(f, "controller used after release"),
            ControllerError::NonFiniteOutput => write!(f, "controller produced non-finite output"),
            ControllerError::Backend(msg) => write!(f, "controller backend failed: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ControllerError {}

/// Capability interface for anything that can steer a drone.
pub trait MotionController {
    fn predict(&mut self, observation: &Observation) -> Result<Control, ControllerError>;

    /// Produces an independent instance. Whether parameters are shared or
    /// copied is up to the implementation.
    fn duplicate(&self) -> Box<dyn MotionController>;

    /// Frees whatever the controller holds. Later `predict` calls fail.
    fn release(&mut self);
}

/// Rule-based steering: a PD loop on the target vector, vectoring both
/// thrusters toward the desired acceleration and trimming attitude with
/// differential thrust.
#[derive(Debug, Clone, PartialEq)]
pub struct HomingController {
    pub position_gain: f32,
    pub velocity_damping: f32,
    /// Downward acceleration the controller has to cancel.
    pub gravity: f32,
    /// Acceleration produced by one thruster at full power.
    pub thruster_accel: f32,
    pub attitude_gain: f32,
    pub spin_damping: f32,
    released: bool,
}

impl Default for HomingController {
    fn default() -> Self {
        Self {
            position_gain: 4.0,
            velocity_damping: 3.0,
            gravity: 200.0,
            thruster_accel: 400.0,
            attitude_gain: 0.6,
            spin_damping: 0.2,
            released: false,
        }
    }
}

impl HomingController {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MotionController for HomingController {
    fn predict(&mut self, observation: &Observation) -> Result<Control, ControllerError> {
        if self.released {
            return Err(ControllerError::Released);
        }

        let desired = observation.target_vector * self.position_gain
            - observation.velocity * self.velocity_damping
            - Vector2D::new(0.0, self.gravity);

        // Thrusters push along the body's -y axis rotated by their own angle.
        let body_frame = desired.rotate(-observation.angle);
        let vector_angle = math::atan2(body_frame.x, -body_frame.y).clamp(-FRAC_PI_2, FRAC_PI_2);
        let angle_output = vector_angle / FRAC_PI_2;

        let base = (desired.magnitude() / (2.0 * self.thruster_accel)).clamp(0.0, 1.0);
        let trim = self.attitude_gain * observation.angle
            + self.spin_damping * observation.angular_velocity;

        let control = [
            (base - trim).clamp(-1.0, 1.0),
            (base + trim).clamp(-1.0, 1.0),
            angle_output,
            angle_output,
        ];

        if control.iter().all(|v| v.is_finite()) {
            Ok(control)
        } else {
            Err(ControllerError::NonFiniteOutput)
        }
    }

    fn duplicate(&self) -> Box<dyn MotionController> {
        let mut copy = self.clone();
        copy.released = false;
        Box::new(copy)
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Weights of a single dense layer with `tanh` activation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyWeights {
    pub weights: [[f32; OBSERVATION_SIZE]; CONTROL_SIZE],
    pub bias: [f32; CONTROL_SIZE],
}

/// Per-feature scaling applied before the dense layer.
const INPUT_SCALE: [f32; OBSERVATION_SIZE] = [0.01, 0.01, 1.0, 1.0, 0.0025, 0.0025];

/// Learned policy: `tanh(W · scaled(observation) + b)`.
///
/// `duplicate` hands out another reference to the same weights;
/// [`fork`](LinearPolicy::fork) copies them so they can be mutated
/// independently.
#[derive(Debug, Clone)]
pub struct LinearPolicy {
    weights: Option<Arc<PolicyWeights>>,
}

impl LinearPolicy {
    pub fn new(weights: PolicyWeights) -> Self {
        Self {
            weights: Some(Arc::new(weights)),
        }
    }

    /// A policy whose weights are private to it. A released policy forks
    /// into another released policy.
    pub fn fork(&self) -> Self {
        Self {
            weights: self.weights.as_ref().map(|w| Arc::new(PolicyWeights::clone(w))),
        }
    }

    pub fn weights(&self) -> Option<&PolicyWeights> {
        self.weights.as_deref()
    }

    /// Whether both policies read the same weight allocation.
    pub fn shares_weights_with(&self, other: &LinearPolicy) -> bool {
        match (&self.weights, &other.weights) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Nudges every parameter by a uniform offset in `[-rate, rate]`.
    /// Weights still shared with other policies are copied first.
    #[cfg(feature = "std")]
    pub fn mutate<R: rand::Rng>(&mut self, rate: f32, rng: &mut R) {
        if rate <= 0.0 {
            return;
        }
        if let Some(weights) = self.weights.as_mut() {
            let weights = Arc::make_mut(weights);
            for row in weights.weights.iter_mut() {
                for w in row.iter_mut() {
                    *w += rng.gen_range(-rate..=rate);
                }
            }
            for b in weights.bias.iter_mut() {
                *b += rng.gen_range(-rate..=rate);
            }
        }
    }
}

impl MotionController for LinearPolicy {
    fn predict(&mut self, observation: &Observation) -> Result<Control, ControllerError> {
        let weights = self.weights.as_ref().ok_or(ControllerError::Released)?;
        let features = observation.features();

        let mut control = [0.0; CONTROL_SIZE];
        for (out, (row, bias)) in control
            .iter_mut()
            .zip(weights.weights.iter().zip(weights.bias.iter()))
        {
            let sum: f32 = row
                .iter()
                .zip(features.iter().zip(INPUT_SCALE.iter()))
                .map(|(w, (x, scale))| w * x * scale)
                .sum();
            *out = math::tanh(sum + bias);
        }

        if control.iter().all(|v| v.is_finite()) {
            Ok(control)
        } else {
            Err(ControllerError::NonFiniteOutput)
        }
    }

    fn duplicate(&self) -> Box<dyn MotionController> {
        Box::new(self.clone())
    }

    fn release(&mut self) {
        self.weights = None;
    }
}
