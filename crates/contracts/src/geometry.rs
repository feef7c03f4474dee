//! Poses in the simulator's coordinate frame
//!
//! Left-handed UE4 frame: x forward, y right, z up. Angles are degrees.

use serde::{Deserialize, Serialize};

/// 3D transform: location + rotation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    /// Location (x, y, z) in meters
    pub location: Location,

    /// Rotation (pitch, yaw, roll) in degrees
    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub roll: f64,
}

impl Location {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another location
    pub fn distance(&self, other: &Location) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl Rotation {
    pub const fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Rotate a vector by this rotation (yaw about z, pitch about y, roll about x)
    pub fn rotate_vector(&self, v: &Location) -> Location {
        let (sp, cp) = self.pitch.to_radians().sin_cos();
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        let (sr, cr) = self.roll.to_radians().sin_cos();

        Location {
            x: v.x * (cp * cy) + v.y * (cy * sp * sr - sy * cr) + v.z * (-cy * sp * cr - sy * sr),
            y: v.x * (cp * sy) + v.y * (sy * sp * sr + cy * cr) + v.z * (-sy * sp * cr + cy * sr),
            z: v.x * sp + v.y * (-cp * sr) + v.z * (cp * cr),
        }
    }
}

impl Transform {
    pub const fn new(location: Location, rotation: Rotation) -> Self {
        Self { location, rotation }
    }

    /// Map a point from this transform's local frame into the parent frame
    pub fn transform_point(&self, point: &Location) -> Location {
        let rotated = self.rotation.rotate_vector(point);
        Location {
            x: rotated.x + self.location.x,
            y: rotated.y + self.location.y,
            z: rotated.z + self.location.z,
        }
    }

    /// World pose of a child attached at `relative` to an actor posed at `self`.
    ///
    /// Angles are summed, which is exact for the yaw-only parents vehicles
    /// have on flat roads and a close approximation otherwise.
    pub fn compose(&self, relative: &Transform) -> Transform {
        Transform {
            location: self.transform_point(&relative.location),
            rotation: Rotation {
                pitch: self.rotation.pitch + relative.rotation.pitch,
                yaw: self.rotation.yaw + relative.rotation.yaw,
                roll: self.rotation.roll + relative.rotation.roll,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_close(a: &Location, b: &Location) {
        assert!(
            a.distance(b) < EPS,
            "expected {:?} to be close to {:?}",
            a,
            b
        );
    }

    #[test]
    fn test_identity_rotation_translates_only() {
        let parent = Transform::new(Location::new(10.0, 5.0, 0.5), Rotation::default());
        let p = parent.transform_point(&Location::new(-4.0, 0.0, 4.0));
        assert_close(&p, &Location::new(6.0, 5.0, 4.5));
    }

    #[test]
    fn test_yaw_90_turns_behind_into_negative_y() {
        let parent = Transform::new(Location::default(), Rotation::new(0.0, 90.0, 0.0));
        let p = parent.transform_point(&Location::new(-4.0, 0.0, 4.0));
        assert_close(&p, &Location::new(0.0, -4.0, 4.0));
    }

    #[test]
    fn test_compose_sums_angles() {
        let parent = Transform::new(Location::new(1.0, 2.0, 0.0), Rotation::new(0.0, 45.0, 0.0));
        let relative = Transform::new(Location::default(), Rotation::new(-25.0, 0.0, 0.0));
        let world = parent.compose(&relative);
        assert_close(&world.location, &Location::new(1.0, 2.0, 0.0));
        assert_eq!(world.rotation, Rotation::new(-25.0, 45.0, 0.0));
    }

    #[test]
    fn test_transform_deserialize_with_missing_fields() {
        let t: Transform = serde_json::from_str(r#"{ "location": { "x": -4.0, "z": 4.0 } }"#).unwrap();
        assert_eq!(t.location, Location::new(-4.0, 0.0, 4.0));
        assert_eq!(t.rotation, Rotation::default());
    }
}
