#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use drone_core::{
    Control, ControllerError, DroneConfig, MotionController, Observation, SimpleWorld,
    SwarmConfig, SwarmCoordinator, Vector2D,
};

pub const WIDTH: f32 = 800.0;
pub const HEIGHT: f32 = 600.0;

/// Outputs zero thrust, so bodies in a gravity-free world never move.
pub struct StillController;

impl MotionController for StillController {
    fn predict(&mut self, _: &Observation) -> Result<Control, ControllerError> {
        Ok([0.0; 4])
    }

    fn duplicate(&self) -> Box<dyn MotionController> {
        Box::new(StillController)
    }

    fn release(&mut self) {}
}

/// Both thrusters at full power, pointing straight down the body axis.
pub struct FullThrustController;

impl MotionController for FullThrustController {
    fn predict(&mut self, _: &Observation) -> Result<Control, ControllerError> {
        Ok([1.0, 1.0, 0.0, 0.0])
    }

    fn duplicate(&self) -> Box<dyn MotionController> {
        Box::new(FullThrustController)
    }

    fn release(&mut self) {}
}

/// Fails every prediction.
pub struct FailingController;

impl MotionController for FailingController {
    fn predict(&mut self, _: &Observation) -> Result<Control, ControllerError> {
        Err(ControllerError::Backend("inference session lost".to_string()))
    }

    fn duplicate(&self) -> Box<dyn MotionController> {
        Box::new(FailingController)
    }

    fn release(&mut self) {}
}

/// Every duplicate takes the next serial number from a shared counter;
/// odd-numbered instances fail every prediction.
pub struct FlakyController {
    serial: u32,
    counter: Rc<Cell<u32>>,
}

impl FlakyController {
    pub fn template() -> Box<dyn MotionController> {
        Box::new(Self {
            serial: 0,
            counter: Rc::new(Cell::new(0)),
        })
    }
}

impl MotionController for FlakyController {
    fn predict(&mut self, _: &Observation) -> Result<Control, ControllerError> {
        if self.serial % 2 == 1 {
            Err(ControllerError::Backend(format!("instance {} crashed", self.serial)))
        } else {
            Ok([0.0; 4])
        }
    }

    fn duplicate(&self) -> Box<dyn MotionController> {
        let serial = self.counter.get();
        self.counter.set(serial + 1);
        Box::new(Self {
            serial,
            counter: self.counter.clone(),
        })
    }

    fn release(&mut self) {}
}

pub fn config(settle_ticks: u32) -> SwarmConfig {
    SwarmConfig {
        drone: DroneConfig {
            settle_ticks,
            ..DroneConfig::default()
        },
        ..SwarmConfig::default()
    }
}

/// A coordinator over a gravity-free world whose drones hold still.
pub fn still_swarm(spawn_point: Vector2D) -> SwarmCoordinator<SimpleWorld> {
    still_swarm_with(spawn_point, Box::new(StillController), config(3))
}

pub fn still_swarm_with(
    spawn_point: Vector2D,
    template: Box<dyn MotionController>,
    config: SwarmConfig,
) -> SwarmCoordinator<SimpleWorld> {
    let world = SimpleWorld::with_seed(WIDTH, HEIGHT, 5).with_gravity(0.0);
    SwarmCoordinator::new(world, template, config, spawn_point)
}

pub fn active_targets(swarm: &SwarmCoordinator<SimpleWorld>) -> Vec<Vector2D> {
    swarm.active().iter().map(|d| d.target()).collect()
}
