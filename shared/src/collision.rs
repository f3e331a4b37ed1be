//! The world as the movement step sees it: gravity and a swept collision query

use crate::{ARENA_HALF_EXTENT, GRAVITY};
use glam::Vec3;

/// Swept collision test along a straight displacement.
///
/// Returns the position where the sweep is first blocked, or `None` when the
/// whole displacement is free. Implementations must be deterministic: client
/// prediction and the authority run the same query on the same inputs.
pub trait SweepQuery: Send + Sync {
    fn sweep(&self, from: Vec3, displacement: Vec3) -> Option<Vec3>;
}

/// Nothing ever blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenField;

impl SweepQuery for OpenField {
    fn sweep(&self, _from: Vec3, _displacement: Vec3) -> Option<Vec3> {
        None
    }
}

/// Axis-aligned box of solid walls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl ArenaBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn square(half_extent: f32) -> Self {
        Self::new(Vec3::splat(-half_extent), Vec3::splat(half_extent))
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

impl Default for ArenaBounds {
    fn default() -> Self {
        Self::square(ARENA_HALF_EXTENT)
    }
}

impl SweepQuery for ArenaBounds {
    fn sweep(&self, from: Vec3, displacement: Vec3) -> Option<Vec3> {
        let to = from + displacement;
        let mut first_hit: Option<f32> = None;

        for axis in 0..3 {
            let d = displacement[axis];
            let wall = if d > 0.0 && to[axis] > self.max[axis] {
                self.max[axis]
            } else if d < 0.0 && to[axis] < self.min[axis] {
                self.min[axis]
            } else {
                continue;
            };

            let fraction = ((wall - from[axis]) / d).clamp(0.0, 1.0);
            first_hit = Some(first_hit.map_or(fraction, |hit| hit.min(fraction)));
        }

        first_hit.map(|fraction| from + displacement * fraction)
    }
}

/// Gravity and collision, injected into every simulation step.
pub struct Environment {
    pub gravity: f32,
    sweep: Box<dyn SweepQuery>,
}

impl Environment {
    pub fn new(gravity: f32, sweep: impl SweepQuery + 'static) -> Self {
        Self {
            gravity,
            sweep: Box::new(sweep),
        }
    }

    pub fn open_field() -> Self {
        Self::new(GRAVITY, OpenField)
    }

    /// The walled arena both binaries simulate in.
    pub fn arena() -> Self {
        Self::new(GRAVITY, ArenaBounds::default())
    }

    pub fn sweep(&self, from: Vec3, displacement: Vec3) -> Option<Vec3> {
        self.sweep.sweep(from, displacement)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("gravity", &self.gravity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_open_field_never_blocks() {
        assert_eq!(OpenField.sweep(Vec3::ZERO, Vec3::new(1.0e6, 0.0, 0.0)), None);
    }

    #[test]
    fn test_arena_free_move_inside() {
        let arena = ArenaBounds::square(10.0);
        assert_eq!(arena.sweep(Vec3::ZERO, Vec3::new(5.0, -5.0, 0.0)), None);
    }

    #[test]
    fn test_arena_clips_to_wall() {
        let arena = ArenaBounds::square(10.0);
        let hit = arena
            .sweep(Vec3::new(8.0, 0.0, 0.0), Vec3::new(4.0, 2.0, 0.0))
            .expect("sweep should hit the +x wall");

        assert_approx_eq!(hit.x, 10.0, 1e-5);
        assert_approx_eq!(hit.y, 1.0, 1e-5);
        assert!(arena.contains(hit));
    }

    #[test]
    fn test_arena_picks_nearest_wall() {
        let arena = ArenaBounds::square(10.0);
        // Reaches y = -10 at a quarter of the way, x = 10 only at the very end.
        let hit = arena
            .sweep(Vec3::new(0.0, -9.0, 0.0), Vec3::new(12.0, -4.0, 0.0))
            .unwrap();

        assert_approx_eq!(hit.y, -10.0, 1e-5);
        assert_approx_eq!(hit.x, 3.0, 1e-5);
    }

    #[test]
    fn test_arena_moving_away_from_wall_is_free() {
        let arena = ArenaBounds::square(10.0);
        assert_eq!(
            arena.sweep(Vec3::new(10.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)),
            None
        );
    }

    #[test]
    fn test_environment_delegates_to_query() {
        let env = Environment::new(9.81, ArenaBounds::square(1.0));
        assert!(env.sweep(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)).is_some());
        assert_eq!(env.gravity, 9.81);
    }
}
