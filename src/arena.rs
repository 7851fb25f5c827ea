//! The arena: owns goopies, food, walls, the physics world and the archive, and runs
//! the tick loop.

use bevy::log::{debug, info, warn};
use bevy::math::Vec2;
use bevy::prelude::Resource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::SlotMap;

use crate::archive::Archive;
use crate::brain::{Brain, ConvBrain};
use crate::config::{
    ConfigError, FOOD_SPAWN_FRACTION, GOOPIE_SPAWN_FRACTION, SimulationConfig, VisionKind,
    WALL_EXTRAPOLATION,
};
use crate::dispatch::{DispatchError, Interaction, Owner, classify, register_routes};
use crate::food::{Food, FoodKey, random_position, respawn_count};
use crate::goopie::{Goopie, GoopieKey};
use crate::physics::{Body, BodyKey, Category, PhysicsWorld};
use crate::vision::{ClosestVision, Observer, Silhouette, Vision};
use crate::wall::Wall;

/// Summary of the arena for logs and the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArenaStats {
    pub tick: u64,
    pub population: usize,
    pub food: usize,
    pub births: u64,
    pub deaths: u64,
    pub best_fitness: f32,
    pub mean_archive_fitness: f32,
    pub archive_len: usize,
    pub fitness_threshold: f32,
}

/// What happened during one call to [`Arena::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub tick: u64,
    pub births: usize,
    pub deaths: usize,
    pub eaten: usize,
    pub respawned: usize,
}

#[derive(Resource)]
pub struct Arena {
    config: SimulationConfig,
    rng: StdRng,
    physics: PhysicsWorld<Owner>,
    goopies: SlotMap<GoopieKey, Goopie>,
    foods: SlotMap<FoodKey, Food>,
    walls: Vec<Wall>,
    archive: Archive,
    tick: u64,
    births: u64,
    deaths: u64,
}

impl Arena {
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        let archive = Archive::new(config.archive_capacity);
        Self::with_archive(config, archive)
    }

    /// Build an arena whose initial population is drawn from an existing archive.
    pub fn with_archive(config: SimulationConfig, archive: Archive) -> Result<Self, ConfigError> {
        config.validate()?;
        let width = input_width(&config);
        if archive.entries().iter().any(|entry| {
            entry.brain.width != width
                || entry.brain.parameters.len() != ConvBrain::parameter_count(width)
        }) {
            return Err(ConfigError::Invalid(
                "archived brains do not match the configured vision",
            ));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut physics = PhysicsWorld::new(config.goopie_radius.max(config.food_radius) * 2.0);
        register_routes(&mut physics);

        let walls = Wall::boundary(config.space_size, config.wall_thickness).to_vec();
        for (index, wall) in walls.iter().enumerate() {
            physics.add_static_segment(
                wall.a,
                wall.b,
                wall.thickness,
                Category::WallBody,
                Owner::Wall(index),
            );
        }

        let mut arena = Self {
            config,
            rng,
            physics,
            goopies: SlotMap::with_key(),
            foods: SlotMap::with_key(),
            walls,
            archive,
            tick: 0,
            births: 0,
            deaths: 0,
        };
        for _ in 0..arena.config.initial_goopies {
            arena.respawn_goopie();
        }
        for _ in 0..arena.config.initial_food {
            arena.spawn_food();
        }

        info!(
            "arena ready: {} goopies, {} food, half extent {}, {:?} vision",
            arena.goopies.len(),
            arena.foods.len(),
            arena.config.space_size,
            arena.config.vision,
        );
        Ok(arena)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn goopies(&self) -> &SlotMap<GoopieKey, Goopie> {
        &self.goopies
    }

    pub fn foods(&self) -> &SlotMap<FoodKey, Food> {
        &self.foods
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn body(&self, key: BodyKey) -> Option<&Body> {
        self.physics.body(key)
    }

    /// Energy held by live goopies plus energy lying around as food.
    pub fn biomass(&self) -> f32 {
        let goopies: f32 = self.goopies.values().map(|g| g.energy.max(0.0)).sum();
        let food: f32 = self.foods.values().map(|f| f.amount).sum();
        goopies + food
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            tick: self.tick,
            population: self.goopies.len(),
            food: self.foods.len(),
            births: self.births,
            deaths: self.deaths,
            best_fitness: self.archive.best_fitness().unwrap_or(0.0),
            mean_archive_fitness: self.archive.mean_fitness().unwrap_or(0.0),
            archive_len: self.archive.len(),
            fitness_threshold: self.archive.fitness_threshold(),
        }
    }

    /// Advance the world by one fixed time step.
    ///
    /// Perception is reset for everyone before contacts are dispatched, and every contact
    /// is dispatched before any goopie reads its perception.
    pub fn step(&mut self) -> Result<TickReport, DispatchError> {
        for goopie in self.goopies.values_mut() {
            goopie.vision.reset();
        }

        let contacts = self.physics.step(self.config.time_step);
        let interactions = contacts
            .iter()
            .map(classify)
            .collect::<Result<Vec<_>, _>>()?;

        // Kept in dispatch order so removal frees slots the same way every run.
        let mut eaten = Vec::new();
        for interaction in interactions {
            match interaction {
                Interaction::Feed { goopie, food } => self.feed(goopie, food, &mut eaten),
                Interaction::Sense { goopie, target, channel } => {
                    let Some(observer) = self.observer(goopie) else {
                        continue;
                    };
                    let Some(silhouette) = self.silhouette(target, observer.position) else {
                        warn!("no silhouette for {target:?} seen by {goopie:?}");
                        continue;
                    };
                    if let Some(seer) = self.goopies.get_mut(goopie) {
                        seer.vision.observe(&observer, &silhouette, channel);
                    }
                }
            }
        }

        let (dead, children) = self.update_goopies();

        for key in &dead {
            if let Some(goopie) = self.goopies.remove(*key) {
                self.physics.remove_body(goopie.body);
                if self.archive.submit(goopie.brain.snapshot(), goopie.fitness) {
                    debug!(
                        "goopie {key:?} died with fitness {:.3} and was archived",
                        goopie.fitness
                    );
                }
            }
        }
        self.deaths += dead.len() as u64;

        let births = children.len();
        for child in children {
            let key = self.spawn_goopie(child.brain, child.position, child.angle, child.energy);
            if let Some(goopie) = self.goopies.get_mut(key) {
                goopie.generation = child.generation;
            }
        }
        self.births += births as u64;

        for key in &eaten {
            if let Some(food) = self.foods.remove(*key) {
                self.physics.remove_body(food.body);
            }
        }

        let mut respawned = 0;
        while self.goopies.len() < self.config.min_population {
            self.respawn_goopie();
            respawned += 1;
        }
        if respawned > 0 {
            debug!("respawned {respawned} goopies to hold the population floor");
        }

        let missing = respawn_count(
            self.biomass(),
            self.config.biomass_target,
            self.config.food_amount,
            self.foods.len(),
            self.config.max_food,
            self.config.food_respawn_per_tick,
        );
        for _ in 0..missing {
            self.spawn_food();
        }

        self.tick += 1;
        if self.config.log_interval > 0 && self.tick % self.config.log_interval == 0 {
            let stats = self.stats();
            info!(
                "tick {}: {} goopies, {} food, best fitness {:.3}, archive mean {:.3}",
                stats.tick, stats.population, stats.food, stats.best_fitness,
                stats.mean_archive_fitness,
            );
        }

        Ok(TickReport {
            tick: self.tick,
            births,
            deaths: dead.len(),
            eaten: eaten.len(),
            respawned,
        })
    }

    fn feed(&mut self, goopie: GoopieKey, food: FoodKey, eaten: &mut Vec<FoodKey>) {
        if eaten.contains(&food) {
            return;
        }
        let (Some(goopie), Some(pellet)) = (self.goopies.get_mut(goopie), self.foods.get(food))
        else {
            return;
        };
        if !goopie.is_alive() {
            return;
        }
        goopie.eat(pellet.amount);
        eaten.push(food);
    }

    fn observer(&self, key: GoopieKey) -> Option<Observer> {
        let goopie = self.goopies.get(key)?;
        let body = self.physics.body(goopie.body)?;
        Some(Observer {
            position: body.position,
            heading: body.angle,
            radius: goopie.radius,
            vision_radius: self.config.vision_radius,
        })
    }

    fn silhouette(&self, target: Owner, viewer: Vec2) -> Option<Silhouette> {
        match target {
            Owner::Food(key) => {
                let food = self.foods.get(key)?;
                let body = self.physics.body(food.body)?;
                Some(Silhouette {
                    position: body.position,
                    radius: food.radius,
                })
            }
            Owner::Goopie(key) => {
                let goopie = self.goopies.get(key)?;
                let body = self.physics.body(goopie.body)?;
                Some(Silhouette {
                    position: body.position,
                    radius: goopie.radius,
                })
            }
            Owner::Wall(index) => self.walls.get(index)?.silhouette(
                viewer,
                self.config.vision_radius,
                self.config.wall_thickness, // vision margin
                WALL_EXTRAPOLATION,
            ),
        }
    }

    /// Run every goopie's tick. Structural changes are returned for the caller to apply.
    fn update_goopies(&mut self) -> (Vec<GoopieKey>, Vec<crate::goopie::Offspring>) {
        let mut dead = Vec::new();
        let mut children = Vec::new();
        let population = self.goopies.len();

        for (key, goopie) in self.goopies.iter_mut() {
            let Some(body) = self.physics.body_mut(goopie.body) else {
                continue;
            };
            let may_reproduce = self
                .config
                .max_population
                .is_none_or(|cap| population - dead.len() + children.len() < cap);
            let life = goopie.step(body, &self.config, &mut self.rng, may_reproduce);
            if life.died {
                dead.push(key);
            }
            if let Some(child) = life.child {
                debug!("goopie {key:?} reproduced (generation {})", child.generation);
                children.push(child);
            }
        }
        (dead, children)
    }

    fn spawn_goopie(
        &mut self,
        brain: Box<dyn Brain>,
        position: Vec2,
        angle: f32,
        energy: f32,
    ) -> GoopieKey {
        let body = self
            .physics
            .add_body(Body::new(position, angle, self.config.goopie_mass));
        let vision = Vision::new(self.config.vision, self.config.vision_buffer_width);
        let key = self
            .goopies
            .insert(Goopie::new(brain, vision, body, self.config.goopie_radius, energy));

        let owner = Owner::Goopie(key);
        self.physics
            .attach_circle(body, self.config.goopie_radius, Category::GoopieBody, owner, true);
        self.physics
            .attach_circle(body, self.config.vision_radius, Category::GoopieSensor, owner, false);
        key
    }

    /// Spawn a goopie at a random spot with a brain drawn from the archive.
    fn respawn_goopie(&mut self) -> GoopieKey {
        let width = input_width(&self.config);
        let brain = match self.archive.spawn_brain(&mut self.rng, width, &self.config) {
            Ok(brain) => brain,
            Err(err) => {
                warn!("falling back to a random brain: {err}");
                Box::new(ConvBrain::random(width, &mut self.rng))
            }
        };
        let position = random_position(
            &mut self.rng,
            self.config.space_size * GOOPIE_SPAWN_FRACTION,
        );
        let angle = self.rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI);
        let energy = self.config.starting_energy;
        self.spawn_goopie(brain, position, angle, energy)
    }

    fn spawn_food_at(&mut self, position: Vec2) -> FoodKey {
        let body = self.physics.add_body(Body::new(position, 0.0, 0.0));
        let key = self.foods.insert(Food::new(
            self.config.food_amount,
            self.config.food_radius,
            body,
        ));
        self.physics.attach_circle(
            body,
            self.config.food_radius,
            Category::FoodBody,
            Owner::Food(key),
            true,
        );
        key
    }

    fn spawn_food(&mut self) -> FoodKey {
        let position = random_position(&mut self.rng, self.config.space_size * FOOD_SPAWN_FRACTION);
        self.spawn_food_at(position)
    }
}

/// Width of the perception buffer a brain in this arena reads.
pub fn input_width(config: &SimulationConfig) -> usize {
    match config.vision {
        VisionKind::Wide => config.vision_buffer_width,
        VisionKind::Closest => ClosestVision::WIDTH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::BrainSnapshot;
    use crate::vision::Channel;

    fn quiet(initial_goopies: usize) -> SimulationConfig {
        SimulationConfig {
            seed: Some(42),
            initial_goopies,
            initial_food: 0,
            biomass_target: 0.0,
            min_population: 0,
            log_interval: 0,
            ..SimulationConfig::default()
        }
    }

    /// Move a goopie to a fixed pose and stop it.
    fn place(arena: &mut Arena, key: GoopieKey, position: Vec2, angle: f32) {
        let body_key = arena.goopies[key].body;
        let body = arena.physics.body_mut(body_key).expect("goopie body");
        body.position = position;
        body.angle = angle;
        body.velocity = Vec2::ZERO;
    }

    fn only_goopie(arena: &Arena) -> GoopieKey {
        arena.goopies.keys().next().expect("one goopie")
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulationConfig {
            vision_radius: 0.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            Arena::new(config),
            Err(ConfigError::NotPositive { field: "vision_radius", .. })
        ));
    }

    #[test]
    fn construction_populates_the_world() {
        let config = SimulationConfig {
            seed: Some(1),
            initial_goopies: 12,
            initial_food: 30,
            min_population: 12,
            ..SimulationConfig::default()
        };
        let arena = Arena::new(config).expect("valid config");
        assert_eq!(arena.goopies().len(), 12);
        assert_eq!(arena.foods().len(), 30);
        assert_eq!(arena.walls().len(), 4);
        assert_eq!(arena.physics.body_count(), 42);
        // Body and sensor per goopie, one circle per food, four walls.
        assert_eq!(arena.physics.shape_count(), 24 + 30 + 4);
        assert!((arena.biomass() - (12.0 + 3.0)).abs() < 1e-4);
    }

    #[test]
    fn mismatched_archive_is_rejected() {
        let mut archive = Archive::new(10);
        archive.submit(
            BrainSnapshot {
                width: 4,
                parameters: vec![0.0; ConvBrain::parameter_count(4)],
            },
            1.0,
        );
        assert!(matches!(
            Arena::with_archive(quiet(1), archive),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn same_seed_same_run() {
        let config = SimulationConfig {
            seed: Some(7),
            initial_goopies: 20,
            initial_food: 60,
            min_population: 20,
            space_size: 600.0,
            biomass_target: 30.0,
            log_interval: 0,
            ..SimulationConfig::default()
        };
        let mut a = Arena::new(config.clone()).expect("arena a");
        let mut b = Arena::new(config).expect("arena b");
        for _ in 0..300 {
            assert_eq!(a.step(), b.step());
        }
        assert_eq!(a.stats(), b.stats());
        let positions = |arena: &Arena| -> Vec<Vec2> {
            arena
                .goopies()
                .values()
                .filter_map(|g| arena.body(g.body).map(|body| body.position))
                .collect()
        };
        assert_eq!(positions(&a), positions(&b));
    }

    #[test]
    fn food_ahead_lights_the_middle_cells() {
        let mut arena = Arena::new(quiet(1)).expect("arena");
        let key = only_goopie(&arena);
        place(&mut arena, key, Vec2::ZERO, 0.0);
        arena.spawn_food_at(Vec2::new(100.0, 0.0));

        arena.step().expect("step");

        let food = arena.goopies[key].perception().channel(Channel::Food).to_vec();
        let expected = 1.0 - (100.0 - 30.0) / 300.0;
        for (i, cell) in food.iter().enumerate() {
            if i == 4 || i == 5 {
                assert!((cell - expected).abs() < 1e-4, "cell {i} = {cell}");
            } else {
                assert_eq!(*cell, 0.0, "cell {i}");
            }
        }
        let walls = arena.goopies[key].perception().channel(Channel::Wall);
        assert!(walls.iter().all(|c| *c == 0.0));
    }

    #[test]
    fn walls_show_up_in_the_wall_channel() {
        let config = SimulationConfig {
            space_size: 1000.0,
            ..quiet(1)
        };
        let mut arena = Arena::new(config).expect("arena");
        let key = only_goopie(&arena);
        // Facing the east wall from 200 units away.
        place(&mut arena, key, Vec2::new(800.0, 0.0), 0.0);
        arena.step().expect("step");

        let walls = arena.goopies[key].perception().channel(Channel::Wall);
        assert!(walls[5] > 0.0);
        assert!(walls.iter().all(|c| (0.0..=1.0).contains(c)));
    }

    #[test]
    fn goopies_see_each_other() {
        let mut arena = Arena::new(quiet(2)).expect("arena");
        let keys: Vec<GoopieKey> = arena.goopies.keys().collect();
        place(&mut arena, keys[0], Vec2::ZERO, 0.0);
        place(&mut arena, keys[1], Vec2::new(150.0, 0.0), std::f32::consts::PI);
        arena.step().expect("step");

        for key in keys {
            let seen = arena.goopies[key].perception().channel(Channel::Goopie);
            assert!(seen[5] > 0.0, "goopie {key:?} sees nothing ahead");
        }
    }

    #[test]
    fn feeding_transfers_energy_and_removes_food() {
        let config = SimulationConfig {
            starting_energy: 0.5,
            ..quiet(1)
        };
        let mut arena = Arena::new(config).expect("arena");
        let key = only_goopie(&arena);
        place(&mut arena, key, Vec2::ZERO, 0.0);
        arena.spawn_food_at(Vec2::new(20.0, 0.0));

        let report = arena.step().expect("step");
        assert_eq!(report.eaten, 1);
        assert!(arena.foods().is_empty());
        let goopie = &arena.goopies[key];
        assert!((goopie.fitness - 0.1).abs() < 1e-6);
        assert!((goopie.energy - (0.6 - 0.1 * 0.01)).abs() < 1e-5);
        assert_eq!(arena.physics.body_count(), 1);
    }

    #[test]
    fn contested_food_is_eaten_once() {
        let config = SimulationConfig {
            starting_energy: 0.5,
            ..quiet(2)
        };
        let mut arena = Arena::new(config).expect("arena");
        let keys: Vec<GoopieKey> = arena.goopies.keys().collect();
        place(&mut arena, keys[0], Vec2::new(-25.0, 0.0), 0.0);
        place(&mut arena, keys[1], Vec2::new(25.0, 0.0), 0.0);
        arena.spawn_food_at(Vec2::ZERO);

        let report = arena.step().expect("step");
        assert_eq!(report.eaten, 1);
        let total: f32 = arena.goopies.values().map(|g| g.fitness).sum();
        assert!((total - 0.1).abs() < 1e-6);
    }

    #[test]
    fn starving_goopies_die_once_and_fit_ones_are_archived() {
        let config = SimulationConfig {
            starting_energy: 0.05,
            energy_decay_rate: 20.0,
            ..quiet(2)
        };
        let mut arena = Arena::new(config).expect("arena");
        let keys: Vec<GoopieKey> = arena.goopies.keys().collect();
        place(&mut arena, keys[0], Vec2::ZERO, 0.0);
        place(&mut arena, keys[1], Vec2::new(1000.0, 0.0), 0.0);
        arena.spawn_food_at(Vec2::new(20.0, 0.0));

        let report = arena.step().expect("step");
        assert_eq!(report.deaths, 2);
        assert!(arena.goopies().is_empty());
        assert_eq!(arena.physics.body_count(), 0);
        // Only the one that ate has a fitness above zero.
        assert_eq!(arena.archive().len(), 1);
        assert!((arena.stats().best_fitness - 0.1).abs() < 1e-6);

        let report = arena.step().expect("step");
        assert_eq!(report.deaths, 0);
        assert_eq!(arena.stats().deaths, 2);
    }

    #[test]
    fn population_floor_is_refilled() {
        let config = SimulationConfig {
            energy_decay_rate: 500.0,
            min_population: 5,
            ..quiet(5)
        };
        let mut arena = Arena::new(config).expect("arena");
        let report = arena.step().expect("step");
        assert_eq!(report.deaths, 5);
        assert_eq!(report.respawned, 5);
        assert_eq!(arena.goopies().len(), 5);
    }

    #[test]
    fn reproduction_respects_the_population_cap() {
        let eager = SimulationConfig {
            reproduction_age: 0.0,
            reproduction_energy: 0.5,
            child_energy: 0.1,
            ..quiet(3)
        };
        let mut open = Arena::new(eager.clone()).expect("arena");
        assert_eq!(open.step().expect("step").births, 3);
        assert_eq!(open.goopies().len(), 6);

        let capped = SimulationConfig {
            max_population: Some(4),
            ..eager
        };
        let mut capped = Arena::new(capped).expect("arena");
        assert_eq!(capped.step().expect("step").births, 1);
        assert_eq!(capped.goopies().len(), 4);
        assert_eq!(capped.step().expect("step").births, 0);
    }

    #[test]
    fn same_seed_same_food_slots_after_a_feast() {
        let config = SimulationConfig {
            starting_energy: 0.2,
            biomass_target: 10.0,
            food_respawn_per_tick: 10,
            ..quiet(1)
        };
        let run = || {
            let mut arena = Arena::new(config.clone()).expect("arena");
            let key = only_goopie(&arena);
            place(&mut arena, key, Vec2::ZERO, 0.0);
            for offset in [
                Vec2::new(20.0, 0.0),
                Vec2::new(-20.0, 0.0),
                Vec2::new(0.0, 20.0),
                Vec2::new(0.0, -20.0),
            ] {
                arena.spawn_food_at(offset);
            }
            let report = arena.step().expect("step");
            assert_eq!(report.eaten, 4);
            for _ in 0..5 {
                arena.step().expect("step");
            }
            arena
                .foods()
                .iter()
                .map(|(key, food)| (key, arena.body(food.body).map(|b| b.position)))
                .collect::<Vec<_>>()
        };
        let first = run();
        for _ in 0..5 {
            assert_eq!(run(), first);
        }
    }

    #[test]
    fn deaths_in_the_same_pass_free_room_under_the_cap() {
        let config = SimulationConfig {
            max_population: Some(2),
            ..quiet(2)
        };
        let mut arena = Arena::new(config).expect("arena");
        let keys: Vec<GoopieKey> = arena.goopies.keys().collect();
        arena.goopies[keys[0]].energy = 0.0001;
        arena.goopies[keys[1]].energy = 1.0;
        arena.goopies[keys[1]].age = 5.0;

        let report = arena.step().expect("step");
        assert_eq!(report.deaths, 1);
        assert_eq!(report.births, 1);
        assert_eq!(arena.goopies().len(), 2);
    }

    #[test]
    fn food_is_topped_up_toward_the_biomass_target() {
        let config = SimulationConfig {
            biomass_target: 2.0,
            food_respawn_per_tick: 3,
            ..quiet(1)
        };
        let mut arena = Arena::new(config).expect("arena");
        let report = arena.step().expect("step");
        assert_eq!(report.tick, 1);
        assert_eq!(arena.foods().len(), 3);
        for _ in 0..20 {
            arena.step().expect("step");
        }
        assert!(arena.biomass() >= 2.0 - 0.1 - 1e-4);
    }
}
