use bevy::math::Vec2;
use rand::RngCore;
use slotmap::new_key_type;

use crate::brain::{Brain, MotorCommand};
use crate::config::SimulationConfig;
use crate::physics::{Body, BodyKey};
use crate::vision::{PerceptionBuffer, Vision};

new_key_type! {
    /// Stable handle of a goopie in the arena.
    pub struct GoopieKey;
}

/// A goopie: energy, age and fitness bookkeeping around a brain and a vision strategy.
/// Position and heading live on the physics body.
#[derive(Debug)]
pub struct Goopie {
    pub energy: f32,
    pub age: f32,
    /// Lifetime energy gained from food. Never decreases.
    pub fitness: f32,
    pub generation: u32,
    pub radius: f32,
    pub body: BodyKey,
    pub vision: Vision,
    pub brain: Box<dyn Brain>,
    alive: bool,
    last_command: MotorCommand,
}

/// A child produced by reproduction, waiting for the arena to place it.
#[derive(Debug)]
pub struct Offspring {
    pub brain: Box<dyn Brain>,
    pub energy: f32,
    pub position: Vec2,
    pub angle: f32,
    pub generation: u32,
}

/// Outcome of one tick for a goopie.
#[derive(Debug, Default)]
pub struct Lifecycle {
    /// True only on the tick the goopie dies.
    pub died: bool,
    pub child: Option<Offspring>,
}

impl Goopie {
    pub fn new(brain: Box<dyn Brain>, vision: Vision, body: BodyKey, radius: f32, energy: f32) -> Self {
        Self {
            energy,
            age: 0.0,
            fitness: 0.0,
            generation: 0,
            radius,
            body,
            vision,
            brain,
            alive: true,
            last_command: MotorCommand::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn perception(&self) -> &PerceptionBuffer {
        self.vision.buffer()
    }

    pub fn last_command(&self) -> MotorCommand {
        self.last_command
    }

    /// Take up to `amount` energy without exceeding the unit cap. Returns what was gained.
    pub fn eat(&mut self, amount: f32) -> f32 {
        if !self.alive {
            return 0.0;
        }
        let gained = amount.min(1.0 - self.energy).max(0.0);
        self.energy += gained;
        self.fitness += gained;
        gained
    }

    pub fn consume_energy(&mut self, amount: f32) {
        self.energy -= amount;
    }

    /// One tick: decay, death check, brain, movement, reproduction.
    ///
    /// Must run after every contact of the tick has been dispatched, so the perception
    /// buffer is complete.
    pub fn step(
        &mut self,
        body: &mut Body,
        config: &SimulationConfig,
        rng: &mut dyn RngCore,
        may_reproduce: bool,
    ) -> Lifecycle {
        if !self.alive {
            return Lifecycle::default();
        }

        let dt = config.time_step;
        self.consume_energy(config.energy_decay_rate * dt);
        self.age += dt;
        if self.energy <= 0.0 {
            self.alive = false;
            return Lifecycle {
                died: true,
                child: None,
            };
        }

        let speed = body.velocity.length() / config.max_speed;
        let command = self.brain.evaluate(self.vision.buffer(), self.energy, speed);
        self.last_command = command;
        apply_command(body, command, config);

        let child = (may_reproduce && self.ready_to_reproduce(config))
            .then(|| self.reproduce(body, config, rng));
        Lifecycle { died: false, child }
    }

    pub fn ready_to_reproduce(&self, config: &SimulationConfig) -> bool {
        self.alive && self.age > config.reproduction_age && self.energy > config.reproduction_energy
    }

    fn reproduce(&mut self, body: &Body, config: &SimulationConfig, rng: &mut dyn RngCore) -> Offspring {
        let mut brain = self.brain.clone_box();
        brain.mutate(rng, config.mutation_probability, config.mutation_amount);
        self.consume_energy(config.child_energy);
        Offspring {
            brain,
            energy: config.child_energy,
            position: body.position,
            angle: body.angle,
            generation: self.generation + 1,
        }
    }
}

/// Turn, push forward along the new heading, then keep velocity on the heading axis
/// and under the speed cap.
pub fn apply_command(body: &mut Body, command: MotorCommand, config: &SimulationConfig) {
    body.angle += command.turn * config.max_turn_rate;
    let heading = body.heading();
    body.apply_force(heading * command.thrust * config.max_acceleration);

    body.angular_velocity = 0.0;
    body.velocity = heading * body.velocity.dot(heading);
    body.velocity = body.velocity.clamp_length_max(config.max_speed);
}
