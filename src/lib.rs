//! Goopies: circular agents that sense through collisions, eat, reproduce and evolve.

pub mod archive;
pub mod arena;
pub mod brain;
pub mod checkpoint;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod food;
pub mod goopie;
pub mod physics;
pub mod plugin;
pub mod vision;
pub mod wall;

pub use arena::{Arena, ArenaStats, TickReport};
pub use config::{SimulationConfig, VisionKind};
pub use error::SimulationError;
pub use plugin::{RunSettings, SimulationPlugin, SimulationState};
