//! Configuration constants and runtime settings for the goopies simulator

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ARENA SETTINGS
// ============================================================================

/// Half extent of the square arena (walls sit at ±SPACE_SIZE)
pub const SPACE_SIZE: f32 = 2500.0;

/// Thickness radius of the boundary walls
pub const WALL_THICKNESS: f32 = 10.0;

/// Number of goopies spawned at arena creation
pub const INITIAL_GOOPIE_COUNT: usize = 100;

/// Number of food items spawned at arena creation
pub const INITIAL_FOOD_COUNT: usize = 400;

/// Goopies spawn within ±(SPACE_SIZE * GOOPIE_SPAWN_FRACTION)
pub const GOOPIE_SPAWN_FRACTION: f32 = 0.8;

/// Food spawns within ±(SPACE_SIZE * FOOD_SPAWN_FRACTION)
pub const FOOD_SPAWN_FRACTION: f32 = 0.9;

/// Fixed physics timestep in seconds
pub const TIME_STEP: f32 = 0.01;

// ============================================================================
// GOOPIE BODY & MOVEMENT
// ============================================================================

/// Body radius of a goopie
pub const GOOPIE_RADIUS: f32 = 30.0;

/// Body mass of a goopie
pub const GOOPIE_MASS: f32 = 1.0;

/// Maximum forward speed (units per second)
pub const MAX_SPEED: f32 = 200.0;

/// Maximum heading change per tick (radians) at full turn output
pub const MAX_TURN_RATE: f32 = 0.05;

/// Thrust force at full thrust output
pub const MAX_ACCELERATION: f32 = 400.0;

// ============================================================================
// VISION
// ============================================================================

/// Radius of the sensor shape around each goopie
pub const VISION_RADIUS: f32 = 300.0;

/// Number of angular buckets per perception channel
pub const VISION_BUFFER_WIDTH: usize = 10;

/// Factor by which walls are extrapolated past their endpoints for wall vision
pub const WALL_EXTRAPOLATION: f32 = 10.0;

// ============================================================================
// ENERGY & LIFECYCLE
// ============================================================================

/// Energy a goopie starts with when spawned into the arena
pub const STARTING_ENERGY: f32 = 1.0;

/// Passive energy loss per second
pub const ENERGY_DECAY_RATE: f32 = 0.1;

/// Age (seconds) a goopie must exceed before it can reproduce
pub const REPRODUCTION_AGE: f32 = 3.0;

/// Energy a goopie must exceed before it can reproduce
pub const REPRODUCTION_ENERGY: f32 = 0.8;

/// Energy handed from parent to child on reproduction
pub const CHILD_ENERGY: f32 = 0.4;

// ============================================================================
// FOOD
// ============================================================================

/// Radius of a food item
pub const FOOD_RADIUS: f32 = 10.0;

/// Energy yielded by one food item
pub const FOOD_AMOUNT: f32 = 0.1;

/// Biomass (goopie energy + food energy) the arena tops up to with new food; 0 disables
pub const BIOMASS_TARGET: f32 = 140.0;

/// Upper bound on food items alive at once
pub const MAX_FOOD: usize = 2000;

/// Maximum number of food items respawned in a single tick
pub const FOOD_RESPAWN_PER_TICK: usize = 5;

// ============================================================================
// EVOLUTION
// ============================================================================

/// Number of fittest brains retained by the archive (K)
pub const ARCHIVE_CAPACITY: usize = 10;

/// Softmax temperature for fitness-weighted ancestor sampling
pub const SAMPLING_TEMPERATURE: f32 = 3.0;

/// Probability that a respawned goopie gets a fresh random brain instead of an ancestor
pub const RANDOM_RESPAWN_RATE: f32 = 0.1;

/// Per-parameter probability of a mutation
pub const MUTATION_PROBABILITY: f32 = 0.2;

/// Standard deviation of a mutation perturbation
pub const MUTATION_AMOUNT: f32 = 0.1;

// ============================================================================
// REPORTING
// ============================================================================

/// Ticks between population summary log lines; 0 disables them
pub const LOG_INTERVAL: u64 = 1000;

// ============================================================================
// VIEWER
// ============================================================================

/// Click tolerance around a goopie's body when selecting it
pub const SELECTION_MARGIN: f32 = 10.0;

/// Camera zoom limits (orthographic scale)
pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 20.0;

/// Fractional zoom change per mouse wheel notch
pub const ZOOM_STEP: f32 = 0.1;

/// Which perception strategy goopies are built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisionKind {
    /// Angular buffer of `vision_buffer_width` cells per channel.
    #[default]
    Wide,
    /// Distance and bearing of the nearest object per channel.
    Closest,
}

/// Invalid construction parameters. These abort arena construction.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid configuration: {field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: f32 },
    #[error("invalid configuration: {field} must lie in [0, 1] (got {value})")]
    NotUnit { field: &'static str, value: f32 },
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Runtime settings for an arena. Defaults mirror the constants above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Optional seed; `None` seeds the arena rng from entropy.
    pub seed: Option<u64>,
    pub space_size: f32,
    pub wall_thickness: f32,
    pub initial_goopies: usize,
    pub initial_food: usize,
    pub time_step: f32,

    pub goopie_radius: f32,
    pub goopie_mass: f32,
    pub max_speed: f32,
    pub max_turn_rate: f32,
    pub max_acceleration: f32,

    pub vision: VisionKind,
    pub vision_radius: f32,
    pub vision_buffer_width: usize,

    pub starting_energy: f32,
    pub energy_decay_rate: f32,
    pub reproduction_age: f32,
    pub reproduction_energy: f32,
    pub child_energy: f32,

    pub food_radius: f32,
    pub food_amount: f32,
    pub biomass_target: f32,
    pub max_food: usize,
    pub food_respawn_per_tick: usize,

    pub archive_capacity: usize,
    pub sampling_temperature: f32,
    pub random_respawn_rate: f32,
    pub mutation_probability: f32,
    pub mutation_amount: f32,
    /// Respawn from the archive until at least this many goopies are alive.
    pub min_population: usize,
    /// Reproduction is suppressed at or above this population; `None` leaves growth open.
    pub max_population: Option<usize>,

    pub log_interval: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            space_size: SPACE_SIZE,
            wall_thickness: WALL_THICKNESS,
            initial_goopies: INITIAL_GOOPIE_COUNT,
            initial_food: INITIAL_FOOD_COUNT,
            time_step: TIME_STEP,
            goopie_radius: GOOPIE_RADIUS,
            goopie_mass: GOOPIE_MASS,
            max_speed: MAX_SPEED,
            max_turn_rate: MAX_TURN_RATE,
            max_acceleration: MAX_ACCELERATION,
            vision: VisionKind::Wide,
            vision_radius: VISION_RADIUS,
            vision_buffer_width: VISION_BUFFER_WIDTH,
            starting_energy: STARTING_ENERGY,
            energy_decay_rate: ENERGY_DECAY_RATE,
            reproduction_age: REPRODUCTION_AGE,
            reproduction_energy: REPRODUCTION_ENERGY,
            child_energy: CHILD_ENERGY,
            food_radius: FOOD_RADIUS,
            food_amount: FOOD_AMOUNT,
            biomass_target: BIOMASS_TARGET,
            max_food: MAX_FOOD,
            food_respawn_per_tick: FOOD_RESPAWN_PER_TICK,
            archive_capacity: ARCHIVE_CAPACITY,
            sampling_temperature: SAMPLING_TEMPERATURE,
            random_respawn_rate: RANDOM_RESPAWN_RATE,
            mutation_probability: MUTATION_PROBABILITY,
            mutation_amount: MUTATION_AMOUNT,
            min_population: INITIAL_GOOPIE_COUNT,
            max_population: None,
            log_interval: LOG_INTERVAL,
        }
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::NotUnit { field, value })
    }
}

impl SimulationConfig {
    /// Reject parameters the arena cannot be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("space_size", self.space_size)?;
        positive("wall_thickness", self.wall_thickness)?;
        positive("time_step", self.time_step)?;
        positive("goopie_radius", self.goopie_radius)?;
        positive("goopie_mass", self.goopie_mass)?;
        positive("max_speed", self.max_speed)?;
        positive("vision_radius", self.vision_radius)?;
        positive("food_radius", self.food_radius)?;
        positive("food_amount", self.food_amount)?;
        positive("sampling_temperature", self.sampling_temperature)?;
        unit("starting_energy", self.starting_energy)?;
        unit("child_energy", self.child_energy)?;
        unit("reproduction_energy", self.reproduction_energy)?;
        unit("random_respawn_rate", self.random_respawn_rate)?;
        unit("mutation_probability", self.mutation_probability)?;

        if self.max_turn_rate < 0.0 || self.max_acceleration < 0.0 {
            return Err(ConfigError::Invalid("movement limits must not be negative"));
        }
        if self.energy_decay_rate < 0.0 || self.mutation_amount < 0.0 || self.biomass_target < 0.0 {
            return Err(ConfigError::Invalid("rates must not be negative"));
        }
        if self.child_energy > self.reproduction_energy {
            return Err(ConfigError::Invalid(
                "child_energy must not exceed reproduction_energy",
            ));
        }
        if self.initial_goopies == 0 {
            return Err(ConfigError::Invalid("initial_goopies must be at least 1"));
        }
        if self.vision_buffer_width == 0 {
            return Err(ConfigError::Invalid("vision_buffer_width must be at least 1"));
        }
        if self.archive_capacity == 0 {
            return Err(ConfigError::Invalid("archive_capacity must be at least 1"));
        }
        if self.max_population.is_some_and(|cap| cap < self.min_population) {
            return Err(ConfigError::Invalid("max_population must not be below min_population"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SimulationConfig::default().validate(), Ok(()));
    }

    #[test]
    fn negative_radius_is_rejected() {
        let config = SimulationConfig {
            goopie_radius: -1.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { field: "goopie_radius", .. })
        ));
    }

    #[test]
    fn zero_population_is_rejected() {
        let config = SimulationConfig {
            initial_goopies: 0,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn reproduction_cannot_overdraw_the_parent() {
        let config = SimulationConfig {
            reproduction_energy: 0.3,
            child_energy: 0.6,
            ..SimulationConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Invalid(
                "child_energy must not exceed reproduction_energy"
            ))
        );

        let config = SimulationConfig {
            reproduction_energy: 1.5,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotUnit { field: "reproduction_energy", .. })
        ));
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{ "seed": 7, "vision": "closest", "initial_food": 3 }"#)
                .expect("parse config");
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.vision, VisionKind::Closest);
        assert_eq!(config.initial_food, 3);
        assert_eq!(config.space_size, SPACE_SIZE);
    }
}
