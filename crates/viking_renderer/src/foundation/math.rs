//! Mathematical utilities and types
//!
//! Thin aliases over `nalgebra` plus the handful of matrix constructors the
//! renderer needs for its model/view/projection uniforms.

pub use nalgebra::{Matrix4, Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Common mathematical constants
pub mod constants {
    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;
}

/// Convert degrees to radians
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees * constants::DEG_TO_RAD
}

/// Matrix constructors following Vulkan conventions
pub trait Mat4Ext {
    /// Create a rotation matrix around the Z axis
    fn rotation_z(angle: f32) -> Mat4;

    /// Right-handed perspective projection with a `[0, 1]` depth range.
    ///
    /// The Y axis is flipped so that +Y in view space ends up at the top of
    /// the framebuffer, Vulkan's clip space pointing Y down.
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let focal = 1.0 / (fov_y / 2.0).tan();

        let mut proj = Mat4::zeros();
        proj[(0, 0)] = focal / aspect;
        proj[(1, 1)] = focal;
        proj[(2, 2)] = far / (near - far);
        proj[(2, 3)] = -(far * near) / (far - near);
        proj[(3, 2)] = -1.0;

        proj[(1, 1)] *= -1.0;
        proj
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_rotation_z_quarter_turn() {
        let rotated = Mat4::rotation_z(deg_to_rad(90.0)).transform_vector(&Vec3::x());
        assert_relative_eq!(rotated, Vec3::y(), epsilon = EPSILON);
    }

    #[test]
    fn test_perspective_depth_range_and_flip() {
        let proj = Mat4::perspective(deg_to_rad(45.0), 800.0 / 600.0, 0.1, 10.0);

        // Y is inverted for Vulkan clip space
        assert!(proj[(1, 1)] < 0.0);

        let near = proj * nalgebra::Vector4::new(0.0, 0.0, -0.1, 1.0);
        let far = proj * nalgebra::Vector4::new(0.0, 0.0, -10.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = EPSILON);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_look_at_moves_target_onto_negative_z() {
        let view = Mat4::look_at(Vec3::new(2.0, 2.0, 2.0), Vec3::zeros(), Vec3::z());
        let target = view.transform_point(&Point3::origin());

        assert_relative_eq!(target.x, 0.0, epsilon = EPSILON);
        assert_relative_eq!(target.y, 0.0, epsilon = EPSILON);
        assert_relative_eq!(target.z, -(12.0_f32).sqrt(), epsilon = EPSILON);
    }
}
