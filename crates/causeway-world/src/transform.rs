//! Positions, rotations, and world-bound transforms.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// WorldId
// ---------------------------------------------------------------------------

/// Identifier for a world (dimension). Transforms are bound to a world so a
/// modified move target pointing into a foreign world can be detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldId(pub u32);

// ---------------------------------------------------------------------------
// Vec3
// ---------------------------------------------------------------------------

/// A 3-component double-precision vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const ONE: Vec3 = Vec3 {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// A full entity transform: position, rotation (pitch/yaw/roll), and scale,
/// bound to the world the entity lives in.
///
/// Move notifications carry an old and a new `Transform`; the sink may accept
/// with a modified target, which the flush applies verbatim after checking the
/// world binding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// The world this transform is bound to.
    pub world: WorldId,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    /// A transform at `position` with zero rotation and unit scale.
    pub fn at(world: WorldId, position: Vec3) -> Self {
        Self {
            world,
            position,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }

    /// Copy of this transform with a different position.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Copy of this transform with a different rotation.
    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_at_defaults() {
        let t = Transform::at(WorldId(3), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.world, WorldId(3));
        assert_eq!(t.rotation, Vec3::ZERO);
        assert_eq!(t.scale, Vec3::ONE);
    }

    #[test]
    fn with_position_preserves_world_binding() {
        let t = Transform::at(WorldId(0), Vec3::ZERO).with_position(Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(t.world, WorldId(0));
        assert_eq!(t.position, Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn vec3_add() {
        let v = Vec3::new(1.0, 2.0, 3.0).add(Vec3::new(0.5, 0.5, 0.5));
        assert_eq!(v, Vec3::new(1.5, 2.5, 3.5));
    }
}
