// src/geometry.rs
use nalgebra::Vector2;

use crate::landmarks::Landmark;

/// Angle between two vectors in radians, 0.0 when either is degenerate.
pub fn angle_between_vectors(v1: &Vector2<f64>, v2: &Vector2<f64>) -> f64 {
    let mag1 = v1.norm();
    let mag2 = v2.norm();

    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    let cos_angle = (v1.dot(v2) / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos_angle.acos()
}

/// Interior angle at `b` formed by `a-b-c`, in degrees within [0, 180].
/// Uses image-plane coordinates only.
pub fn joint_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f64 {
    let ba = a.xy() - b.xy();
    let bc = c.xy() - b.xy();
    angle_between_vectors(&ba, &bc).to_degrees()
}

pub fn mean(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

pub fn mid_x(a: &Landmark, b: &Landmark) -> f64 {
    mean(a.x, b.x)
}

pub fn mid_y(a: &Landmark, b: &Landmark) -> f64 {
    mean(a.y, b.y)
}
