use bevy::math::Vec2;

use crate::vision::{Silhouette, wall_silhouette};

/// Static boundary segment. Walls only take part in perception.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub a: Vec2,
    pub b: Vec2,
    pub thickness: f32,
}

impl Wall {
    /// The four walls of a square arena with half extent `size`.
    pub fn boundary(size: f32, thickness: f32) -> [Wall; 4] {
        let corners = [
            Vec2::new(size, size),
            Vec2::new(size, -size),
            Vec2::new(-size, -size),
            Vec2::new(-size, size),
        ];
        std::array::from_fn(|i| Wall {
            a: corners[i],
            b: corners[(i + 1) % 4],
            thickness,
        })
    }

    /// Circle stand-in for the part of this wall visible from `viewer`.
    pub fn silhouette(
        &self,
        viewer: Vec2,
        vision_radius: f32,
        margin: f32,
        extrapolation: f32,
    ) -> Option<Silhouette> {
        wall_silhouette(viewer, self.a, self.b, vision_radius + margin, extrapolation)
    }
}
