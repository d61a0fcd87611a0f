// Scene / physics seam.
//
// The grid and the steering controller never touch bodies directly; they ask
// through these traits. `ObstacleSet` is the built-in planar backend: static
// circular bodies on the XZ plane.

use glam::{Vec2, Vec3};

const EPSILON: f32 = 1e-6;

// ============================================================================
// TRAITS
// ============================================================================

/// Collision tag of a body. Only `Obstacle` bodies trigger steering avoidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleTag {
    Obstacle,
    Untagged,
}

/// Result of a ray cast against the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    /// Unit surface normal at `point`, pointing away from the body.
    pub normal: Vec3,
    /// Distance from the ray origin to `point`.
    pub distance: f32,
    pub tag: ObstacleTag,
}

/// Overlap query used when refreshing grid walkability.
pub trait ObstacleField {
    /// True if any body overlaps the axis-aligned XZ square centred on
    /// `center` whose sides are `2 * half_extent` long.
    fn overlaps_square(&self, center: Vec3, half_extent: f32) -> bool;
}

/// Single-ray hit test used by obstacle avoidance.
pub trait ObstacleProbe {
    /// Nearest body hit along `direction` (unit length) within `max_distance`.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit>;
}

/// Spawns a new obstacle body at a world point.
pub trait ObstaclePlacer {
    fn place_obstacle(&mut self, point: Vec3);
}

// ============================================================================
// OBSTACLE SET
// ============================================================================

/// Vertical cylinder of `radius` around `center`, infinite in Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub center: Vec3,
    pub radius: f32,
    pub tag: ObstacleTag,
}

/// Planar collection of circular bodies.
#[derive(Debug, Clone)]
pub struct ObstacleSet {
    obstacles: Vec<Obstacle>,
    /// Radius given to bodies created through `ObstaclePlacer`.
    placed_radius: f32,
}

impl Default for ObstacleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ObstacleSet {
    pub fn new() -> Self {
        Self::with_placed_radius(0.5)
    }

    pub fn with_placed_radius(placed_radius: f32) -> Self {
        Self {
            obstacles: Vec::new(),
            placed_radius,
        }
    }

    pub fn add_circle(&mut self, center: Vec3, radius: f32, tag: ObstacleTag) {
        self.obstacles.push(Obstacle { center, radius, tag });
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}

#[inline]
fn xz(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

impl ObstacleField for ObstacleSet {
    fn overlaps_square(&self, center: Vec3, half_extent: f32) -> bool {
        let min = xz(center) - Vec2::splat(half_extent);
        let max = xz(center) + Vec2::splat(half_extent);
        self.obstacles.iter().any(|o| {
            let c = xz(o.center);
            // Closest point of the square to the circle centre.
            (c.clamp(min, max) - c).length_squared() < o.radius * o.radius
        })
    }
}

impl ObstacleProbe for ObstacleSet {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        let dir = xz(direction).normalize_or_zero();
        if dir == Vec2::ZERO {
            return None;
        }
        let o = xz(origin);

        let mut best: Option<(f32, &Obstacle)> = None;
        for obstacle in &self.obstacles {
            // Ray-circle: |o + t*dir - c|^2 = r^2
            let to_origin = o - xz(obstacle.center);
            let b = to_origin.dot(dir);
            let c = to_origin.length_squared() - obstacle.radius * obstacle.radius;
            if c <= 0.0 {
                // Origin inside the body; colliders are not hit from the inside.
                continue;
            }
            let disc = b * b - c;
            if disc < 0.0 {
                continue;
            }
            let t = -b - disc.sqrt();
            if t < 0.0 || t > max_distance {
                continue;
            }
            if best.is_none_or(|(bt, _)| t < bt) {
                best = Some((t, obstacle));
            }
        }

        best.map(|(t, obstacle)| {
            let hit = o + dir * t;
            let n = (hit - xz(obstacle.center)).normalize_or_zero();
            let normal = if n.length_squared() > EPSILON {
                Vec3::new(n.x, 0.0, n.y)
            } else {
                -Vec3::new(dir.x, 0.0, dir.y)
            };
            RayHit {
                point: Vec3::new(hit.x, origin.y, hit.y),
                normal,
                distance: t,
                tag: obstacle.tag,
            }
        })
    }
}

impl ObstaclePlacer for ObstacleSet {
    fn place_obstacle(&mut self, point: Vec3) {
        self.add_circle(point, self.placed_radius, ObstacleTag::Obstacle);
    }
}
