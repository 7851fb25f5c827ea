//! Angular perception: turns overlapping objects into per-channel activations.

use bevy::math::Vec2;
use std::f32::consts::{PI, TAU};

use crate::config::VisionKind;

/// Perception channel an object is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Wall,
    Goopie,
    Food,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Wall, Channel::Goopie, Channel::Food];
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        match self {
            Channel::Wall => 0,
            Channel::Goopie => 1,
            Channel::Food => 2,
        }
    }
}

/// Fixed-width, three-channel activation buffer. Cells hold values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptionBuffer {
    width: usize,
    cells: Vec<f32>,
}

impl PerceptionBuffer {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            cells: vec![0.0; width * Channel::COUNT],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn reset(&mut self) {
        self.cells.fill(0.0);
    }

    pub fn channel(&self, channel: Channel) -> &[f32] {
        let start = channel.index() * self.width;
        &self.cells[start..start + self.width]
    }

    pub fn cell(&self, channel: Channel, index: usize) -> f32 {
        self.channel(channel)[index]
    }

    /// Channel-major view: wall cells, then goopie cells, then food cells.
    pub fn as_slice(&self) -> &[f32] {
        &self.cells
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut [f32] {
        let start = channel.index() * self.width;
        &mut self.cells[start..start + self.width]
    }

    /// Raise cells `first..=last` of `channel` to at least `activation`.
    fn raise(&mut self, channel: Channel, first: usize, last: usize, activation: f32) {
        for cell in &mut self.channel_mut(channel)[first..=last] {
            *cell = cell.max(activation);
        }
    }

    fn set(&mut self, channel: Channel, index: usize, value: f32) {
        self.channel_mut(channel)[index] = value;
    }
}

/// The sensing goopie, as seen by the encoder.
#[derive(Debug, Clone, Copy)]
pub struct Observer {
    pub position: Vec2,
    pub heading: f32,
    pub radius: f32,
    pub vision_radius: f32,
}

/// A circular stand-in for a seen object. Walls are reduced to one first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Silhouette {
    pub position: Vec2,
    pub radius: f32,
}

/// Wrap an angle into (-π, π].
pub fn normalize_angle(angle: f32) -> f32 {
    let wrapped = angle - TAU * (angle / TAU).round();
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Bearing of `point` relative to the observer's heading, counter-clockwise positive.
pub fn bearing(observer: &Observer, point: Vec2) -> f32 {
    let offset = point - observer.position;
    normalize_angle(offset.y.atan2(offset.x) - observer.heading)
}

/// Bucket in `[0, width)` for a bearing in (-π, π]. Bearing 0 (dead ahead) lands at `width / 2`.
pub fn bucket_index(bearing: f32, width: usize) -> usize {
    let raw = ((bearing + PI) / TAU * width as f32).floor() as i64;
    raw.rem_euclid(width as i64) as usize
}

/// Linear falloff from 1 at contact to 0 at the edge of vision, using surface distance.
pub fn activation(observer: &Observer, distance: f32) -> f32 {
    let value = 1.0 - (distance - observer.radius) / observer.vision_radius;
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Write one object's angular extent into `buffer`, keeping the strongest activation per cell.
pub fn encode(buffer: &mut PerceptionBuffer, observer: &Observer, target: &Silhouette, channel: Channel) {
    let width = buffer.width();
    let offset = target.position - observer.position;
    let distance = offset.length();
    let strength = activation(observer, distance);

    if distance <= f32::EPSILON {
        // Centred on the observer: the object fills every direction.
        buffer.raise(channel, 0, width - 1, strength);
        return;
    }

    // `a` is the clockwise edge of the silhouette, `b` the counter-clockwise edge.
    let left = offset.perp() / distance;
    let a = target.position - left * target.radius;
    let b = target.position + left * target.radius;
    let a_index = bucket_index(bearing(observer, a), width);
    let b_index = bucket_index(bearing(observer, b), width);

    if a_index <= b_index {
        buffer.raise(channel, a_index, b_index, strength);
    } else {
        // Arc crosses the seam behind the observer.
        buffer.raise(channel, 0, b_index, strength);
        buffer.raise(channel, a_index, width - 1, strength);
    }
}

/// Visible chord of a wall: intersect the (extrapolated) wall line with a circle of
/// `radius` around `viewer`. Returns `None` unless there are two intersections.
pub fn wall_silhouette(
    viewer: Vec2,
    wall_a: Vec2,
    wall_b: Vec2,
    radius: f32,
    extrapolation: f32,
) -> Option<Silhouette> {
    let center = (wall_a + wall_b) / 2.0;
    let start = center + (center - wall_a) * extrapolation;
    let end = center + (center - wall_b) * extrapolation;

    let direction = end - start;
    let from_viewer = start - viewer;
    let a = direction.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = 2.0 * from_viewer.dot(direction);
    let c = from_viewer.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let root = discriminant.sqrt();
    let t1 = (-b - root) / (2.0 * a);
    let t2 = (-b + root) / (2.0 * a);
    if !(0.0..=1.0).contains(&t1) || !(0.0..=1.0).contains(&t2) {
        return None;
    }

    let p1 = start + direction * t1;
    let p2 = start + direction * t2;
    Some(Silhouette {
        position: (p1 + p2) / 2.0,
        radius: p1.distance(p2) / 2.0,
    })
}

/// Buffer-based vision: every overlapping object is drawn as an angular arc.
#[derive(Debug, Clone)]
pub struct WideVision {
    buffer: PerceptionBuffer,
}

impl WideVision {
    pub fn new(width: usize) -> Self {
        Self {
            buffer: PerceptionBuffer::new(width),
        }
    }
}

/// Nearest object per channel, in surface distance and bearing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub distance: f32,
    pub bearing: f32,
}

/// Nearest-object vision. Exposed to the brain as a width-2 buffer per channel:
/// cell 0 is proximity, cell 1 is the bearing mapped into [0, 1].
#[derive(Debug, Clone)]
pub struct ClosestVision {
    nearest: [Option<Sighting>; Channel::COUNT],
    buffer: PerceptionBuffer,
}

impl ClosestVision {
    pub const WIDTH: usize = 2;

    pub fn new() -> Self {
        Self {
            nearest: [None; Channel::COUNT],
            buffer: PerceptionBuffer::new(Self::WIDTH),
        }
    }

    pub fn nearest(&self, channel: Channel) -> Option<Sighting> {
        self.nearest[channel.index()]
    }

    fn observe(&mut self, observer: &Observer, target: &Silhouette, channel: Channel) {
        let centre_distance = observer.position.distance(target.position);
        let distance = match channel {
            // The wall silhouette is a chord of the vision circle, so its radius is not a body.
            Channel::Wall => centre_distance,
            Channel::Goopie | Channel::Food => centre_distance - (observer.radius + target.radius),
        };
        if distance >= observer.vision_radius {
            return;
        }
        if let Some(current) = self.nearest[channel.index()] {
            if current.distance <= distance {
                return;
            }
        }

        let sighting = Sighting {
            distance,
            bearing: bearing(observer, target.position),
        };
        self.nearest[channel.index()] = Some(sighting);
        let proximity = (1.0 - distance / observer.vision_radius).clamp(0.0, 1.0);
        self.buffer.set(channel, 0, proximity);
        self.buffer.set(channel, 1, (sighting.bearing / PI + 1.0) / 2.0);
    }
}

impl Default for ClosestVision {
    fn default() -> Self {
        Self::new()
    }
}

/// Perception strategy chosen per goopie at construction.
#[derive(Debug, Clone)]
pub enum Vision {
    Wide(WideVision),
    Closest(ClosestVision),
}

impl Vision {
    pub fn new(kind: VisionKind, width: usize) -> Self {
        match kind {
            VisionKind::Wide => Vision::Wide(WideVision::new(width)),
            VisionKind::Closest => Vision::Closest(ClosestVision::new()),
        }
    }

    pub fn kind(&self) -> VisionKind {
        match self {
            Vision::Wide(_) => VisionKind::Wide,
            Vision::Closest(_) => VisionKind::Closest,
        }
    }

    /// Width of the buffer handed to the brain.
    pub fn input_width(&self) -> usize {
        self.buffer().width()
    }

    pub fn reset(&mut self) {
        match self {
            Vision::Wide(wide) => wide.buffer.reset(),
            Vision::Closest(closest) => {
                closest.nearest = [None; Channel::COUNT];
                closest.buffer.reset();
            }
        }
    }

    pub fn observe(&mut self, observer: &Observer, target: &Silhouette, channel: Channel) {
        match self {
            Vision::Wide(wide) => encode(&mut wide.buffer, observer, target, channel),
            Vision::Closest(closest) => closest.observe(observer, target, channel),
        }
    }

    pub fn buffer(&self) -> &PerceptionBuffer {
        match self {
            Vision::Wide(wide) => &wide.buffer,
            Vision::Closest(closest) => &closest.buffer,
        }
    }
}
