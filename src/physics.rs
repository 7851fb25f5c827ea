//! Minimal rigid-body world: integrates circles, bounces them off static segments and
//! reports overlapping shape pairs for registered category pairs.

use bevy::math::Vec2;
use slotmap::{SlotMap, new_key_type};
use std::collections::{HashMap, HashSet};

new_key_type! {
    pub struct BodyKey;
    pub struct ShapeKey;
}

/// Restitution applied when a body hits a static segment.
pub const WALL_ELASTICITY: f32 = 0.8;

/// Collision category of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    GoopieBody,
    FoodBody,
    WallBody,
    GoopieSensor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub angular_velocity: f32,
    pub mass: f32,
    force: Vec2,
}

impl Body {
    pub fn new(position: Vec2, angle: f32, mass: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            angle,
            angular_velocity: 0.0,
            mass,
            force: Vec2::ZERO,
        }
    }

    /// Unit vector along the body's angle.
    pub fn heading(&self) -> Vec2 {
        Vec2::from_angle(self.angle)
    }

    /// Accumulate a force for the next step.
    pub fn apply_force(&mut self, force: Vec2) {
        self.force += force;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    Circle { radius: f32 },
    Segment { a: Vec2, b: Vec2, radius: f32 },
}

#[derive(Debug, Clone)]
pub struct Shape<O> {
    /// `None` for shapes fixed to the static frame.
    pub body: Option<BodyKey>,
    pub geometry: Geometry,
    pub category: Category,
    pub owner: O,
    /// Solid shapes take part in collision response; sensors only report overlaps.
    pub solid: bool,
}

/// One side of a reported overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Participant<O> {
    pub owner: O,
    pub category: Category,
}

/// A pair of overlapping shapes whose categories were registered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact<O> {
    pub first: Participant<O>,
    pub second: Participant<O>,
}

fn pair_key(a: Category, b: Category) -> (Category, Category) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Closest point to `point` on segment `a..b`.
pub fn closest_point_on_segment(point: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let length_sq = ab.length_squared();
    if length_sq <= f32::EPSILON {
        return a;
    }
    let t = ((point - a).dot(ab) / length_sq).clamp(0.0, 1.0);
    a + ab * t
}

pub struct PhysicsWorld<O> {
    bodies: SlotMap<BodyKey, Body>,
    shapes: SlotMap<ShapeKey, Shape<O>>,
    pairs: HashSet<(Category, Category)>,
    cell_size: f32,
}

impl<O: Copy> PhysicsWorld<O> {
    /// `cell_size` sizes the broad-phase grid; the largest circle radius is a good choice.
    pub fn new(cell_size: f32) -> Self {
        Self {
            bodies: SlotMap::with_key(),
            shapes: SlotMap::with_key(),
            pairs: HashSet::new(),
            cell_size: cell_size.max(1.0),
        }
    }

    /// Report overlaps between shapes of these two categories.
    pub fn register_pair(&mut self, a: Category, b: Category) {
        self.pairs.insert(pair_key(a, b));
    }

    pub fn is_registered(&self, a: Category, b: Category) -> bool {
        self.pairs.contains(&pair_key(a, b))
    }

    pub fn add_body(&mut self, body: Body) -> BodyKey {
        self.bodies.insert(body)
    }

    /// Remove a body together with every shape attached to it.
    pub fn remove_body(&mut self, key: BodyKey) -> Option<Body> {
        let body = self.bodies.remove(key)?;
        self.shapes.retain(|_, shape| shape.body != Some(key));
        Some(body)
    }

    pub fn attach_circle(
        &mut self,
        body: BodyKey,
        radius: f32,
        category: Category,
        owner: O,
        solid: bool,
    ) -> ShapeKey {
        self.shapes.insert(Shape {
            body: Some(body),
            geometry: Geometry::Circle { radius },
            category,
            owner,
            solid,
        })
    }

    pub fn add_static_segment(
        &mut self,
        a: Vec2,
        b: Vec2,
        radius: f32,
        category: Category,
        owner: O,
    ) -> ShapeKey {
        self.shapes.insert(Shape {
            body: None,
            geometry: Geometry::Segment { a, b, radius },
            category,
            owner,
            solid: true,
        })
    }

    pub fn body(&self, key: BodyKey) -> Option<&Body> {
        self.bodies.get(key)
    }

    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut Body> {
        self.bodies.get_mut(key)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Advance by `dt` and return every registered overlap, in a deterministic order.
    pub fn step(&mut self, dt: f32) -> Vec<Contact<O>> {
        self.integrate(dt);
        self.resolve_segments();
        self.overlaps()
    }

    fn integrate(&mut self, dt: f32) {
        for body in self.bodies.values_mut() {
            if body.mass > 0.0 {
                body.velocity += body.force / body.mass * dt;
            }
            body.position += body.velocity * dt;
            body.angle += body.angular_velocity * dt;
            body.force = Vec2::ZERO;
        }
    }

    fn resolve_segments(&mut self) {
        let segments: Vec<(Vec2, Vec2, f32)> = self
            .shapes
            .values()
            .filter(|shape| shape.solid && shape.body.is_none())
            .filter_map(|shape| match shape.geometry {
                Geometry::Segment { a, b, radius } => Some((a, b, radius)),
                Geometry::Circle { .. } => None,
            })
            .collect();

        for shape in self.shapes.values() {
            let (Some(key), Geometry::Circle { radius }) = (shape.body, shape.geometry) else {
                continue;
            };
            if !shape.solid {
                continue;
            }
            let Some(body) = self.bodies.get_mut(key) else {
                continue;
            };
            for &(a, b, thickness) in &segments {
                let closest = closest_point_on_segment(body.position, a, b);
                let offset = body.position - closest;
                let distance = offset.length();
                let penetration = radius + thickness - distance;
                if penetration <= 0.0 || distance <= f32::EPSILON {
                    continue;
                }
                let normal = offset / distance;
                body.position += normal * penetration;
                let approach = body.velocity.dot(normal);
                if approach < 0.0 {
                    body.velocity -= normal * approach * (1.0 + WALL_ELASTICITY);
                }
            }
        }
    }

    fn cell_of(&self, point: Vec2) -> (i32, i32) {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    fn circle_position(&self, shape: &Shape<O>) -> Option<(Vec2, f32)> {
        match (shape.body, shape.geometry) {
            (Some(key), Geometry::Circle { radius }) => {
                self.bodies.get(key).map(|body| (body.position, radius))
            }
            _ => None,
        }
    }

    fn overlaps(&self) -> Vec<Contact<O>> {
        let circles: Vec<(ShapeKey, Vec2, f32)> = self
            .shapes
            .iter()
            .filter_map(|(key, shape)| {
                self.circle_position(shape)
                    .map(|(position, radius)| (key, position, radius))
            })
            .collect();

        let mut grid: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
        for (index, (_, position, radius)) in circles.iter().enumerate() {
            let (min_x, min_y) = self.cell_of(*position - Vec2::splat(*radius));
            let (max_x, max_y) = self.cell_of(*position + Vec2::splat(*radius));
            for x in min_x..=max_x {
                for y in min_y..=max_y {
                    grid.entry((x, y)).or_default().push(index);
                }
            }
        }

        let mut contacts = Vec::new();
        let mut candidates = Vec::new();
        for (index, (key, position, radius)) in circles.iter().enumerate() {
            let shape = &self.shapes[*key];
            candidates.clear();
            let (min_x, min_y) = self.cell_of(*position - Vec2::splat(*radius));
            let (max_x, max_y) = self.cell_of(*position + Vec2::splat(*radius));
            for x in min_x..=max_x {
                for y in min_y..=max_y {
                    if let Some(cell) = grid.get(&(x, y)) {
                        candidates.extend(cell.iter().copied().filter(|other| *other > index));
                    }
                }
            }
            candidates.sort_unstable();
            candidates.dedup();

            for &other_index in &candidates {
                let (other_key, other_position, other_radius) = circles[other_index];
                let other = &self.shapes[other_key];
                if shape.body == other.body || !self.is_registered(shape.category, other.category) {
                    continue;
                }
                let reach = radius + other_radius;
                if position.distance_squared(other_position) < reach * reach {
                    contacts.push(Contact {
                        first: Participant { owner: shape.owner, category: shape.category },
                        second: Participant { owner: other.owner, category: other.category },
                    });
                }
            }

            for segment in self.shapes.values() {
                let Geometry::Segment { a, b, radius: thickness } = segment.geometry else {
                    continue;
                };
                if !self.is_registered(shape.category, segment.category) {
                    continue;
                }
                let closest = closest_point_on_segment(*position, a, b);
                if position.distance(closest) < radius + thickness {
                    contacts.push(Contact {
                        first: Participant { owner: shape.owner, category: shape.category },
                        second: Participant { owner: segment.owner, category: segment.category },
                    });
                }
            }
        }
        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Tag {
        A,
        B,
        Wall,
    }

    fn world() -> PhysicsWorld<Tag> {
        let mut world = PhysicsWorld::new(50.0);
        world.register_pair(Category::GoopieSensor, Category::FoodBody);
        world.register_pair(Category::GoopieSensor, Category::WallBody);
        world
    }

    #[test]
    fn registered_overlap_is_reported_once() {
        let mut world = world();
        let a = world.add_body(Body::new(Vec2::ZERO, 0.0, 1.0));
        world.attach_circle(a, 100.0, Category::GoopieSensor, Tag::A, false);
        let b = world.add_body(Body::new(Vec2::new(80.0, 0.0), 0.0, 1.0));
        world.attach_circle(b, 10.0, Category::FoodBody, Tag::B, true);

        let contacts = world.step(0.01);
        assert_eq!(contacts.len(), 1);
        let owners = (contacts[0].first.owner, contacts[0].second.owner);
        assert!(owners == (Tag::A, Tag::B) || owners == (Tag::B, Tag::A));
    }

    #[test]
    fn unregistered_and_same_body_pairs_are_skipped() {
        let mut world = world();
        let a = world.add_body(Body::new(Vec2::ZERO, 0.0, 1.0));
        world.attach_circle(a, 100.0, Category::GoopieSensor, Tag::A, false);
        world.attach_circle(a, 10.0, Category::FoodBody, Tag::A, true);
        let b = world.add_body(Body::new(Vec2::new(5.0, 0.0), 0.0, 1.0));
        world.attach_circle(b, 10.0, Category::GoopieBody, Tag::B, true);

        assert!(world.step(0.01).is_empty());
    }

    #[test]
    fn separated_shapes_do_not_touch() {
        let mut world = world();
        let a = world.add_body(Body::new(Vec2::ZERO, 0.0, 1.0));
        world.attach_circle(a, 100.0, Category::GoopieSensor, Tag::A, false);
        let b = world.add_body(Body::new(Vec2::new(500.0, 0.0), 0.0, 1.0));
        world.attach_circle(b, 10.0, Category::FoodBody, Tag::B, true);

        assert!(world.step(0.01).is_empty());
    }

    #[test]
    fn sensor_sees_a_segment() {
        let mut world = world();
        let a = world.add_body(Body::new(Vec2::ZERO, 0.0, 1.0));
        world.attach_circle(a, 100.0, Category::GoopieSensor, Tag::A, false);
        world.add_static_segment(
            Vec2::new(95.0, -500.0),
            Vec2::new(95.0, 500.0),
            10.0,
            Category::WallBody,
            Tag::Wall,
        );

        let contacts = world.step(0.01);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].second.category, Category::WallBody);
    }

    #[test]
    fn forces_integrate_into_motion() {
        let mut world: PhysicsWorld<Tag> = PhysicsWorld::new(50.0);
        let key = world.add_body(Body::new(Vec2::ZERO, 0.0, 2.0));
        world.body_mut(key).expect("body").apply_force(Vec2::new(200.0, 0.0));
        world.step(0.5);

        let body = world.body(key).expect("body");
        assert!((body.velocity.x - 50.0).abs() < 1e-4);
        assert!((body.position.x - 25.0).abs() < 1e-4);

        // Forces do not persist between steps.
        world.step(0.5);
        assert!((world.body(key).expect("body").velocity.x - 50.0).abs() < 1e-4);
    }

    #[test]
    fn segments_push_bodies_back_and_bounce() {
        let mut world: PhysicsWorld<Tag> = PhysicsWorld::new(50.0);
        world.add_static_segment(
            Vec2::new(100.0, -500.0),
            Vec2::new(100.0, 500.0),
            10.0,
            Category::WallBody,
            Tag::Wall,
        );
        let key = world.add_body(Body::new(Vec2::new(60.0, 0.0), 0.0, 1.0));
        world.attach_circle(key, 30.0, Category::GoopieBody, Tag::A, true);
        world.body_mut(key).expect("body").velocity = Vec2::new(100.0, 0.0);

        world.step(0.1);
        let body = world.body(key).expect("body");
        assert!(body.position.x <= 60.0 + 1e-3);
        assert!((body.velocity.x + 80.0).abs() < 1e-3);
    }

    #[test]
    fn removing_a_body_drops_its_shapes() {
        let mut world = world();
        let a = world.add_body(Body::new(Vec2::ZERO, 0.0, 1.0));
        world.attach_circle(a, 100.0, Category::GoopieSensor, Tag::A, false);
        world.attach_circle(a, 30.0, Category::GoopieBody, Tag::A, true);
        assert_eq!(world.shape_count(), 2);

        assert!(world.remove_body(a).is_some());
        assert_eq!(world.shape_count(), 0);
        assert!(world.remove_body(a).is_none());
    }
}
