use bevy::math::Vec2;
use rand::{Rng, RngCore};
use slotmap::new_key_type;

use crate::physics::BodyKey;

new_key_type! {
    /// Stable handle of a food item in the arena.
    pub struct FoodKey;
}

/// A food pellet. It yields a fixed amount of energy and disappears once eaten.
#[derive(Debug, Clone, PartialEq)]
pub struct Food {
    pub amount: f32,
    pub radius: f32,
    pub body: BodyKey,
}

impl Food {
    pub fn new(amount: f32, radius: f32, body: BodyKey) -> Self {
        Self { amount, radius, body }
    }
}

/// Uniform position within ±extent on both axes.
pub fn random_position(rng: &mut dyn RngCore, extent: f32) -> Vec2 {
    Vec2::new(
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
    )
}

/// How many pellets to add so that `biomass` climbs back toward `target`.
/// Bounded by the per-tick allowance and by the free food slots.
pub fn respawn_count(
    biomass: f32,
    target: f32,
    amount: f32,
    food_count: usize,
    max_food: usize,
    per_tick: usize,
) -> usize {
    if target <= 0.0 || biomass >= target || amount <= 0.0 {
        return 0;
    }
    let deficit = ((target - biomass) / amount).ceil() as usize;
    deficit
        .min(per_tick)
        .min(max_food.saturating_sub(food_count))
}
