//! Per-frame uniform data
//!
//! One [`UniformBufferObject`] lives in each frame slot's persistently mapped
//! uniform buffer and is rewritten every frame before submission.

use std::time::Duration;

use crate::core::CameraPreset;
use crate::foundation::math::{deg_to_rad, Mat4, Mat4Ext};

/// Model rotation speed about +Z
pub const ROTATION_DEGREES_PER_SECOND: f32 = 45.0;

/// Model, view and projection matrices in column-major order
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformBufferObject {
    /// Model transform
    pub model: [[f32; 4]; 4],
    /// View transform
    pub view: [[f32; 4]; 4],
    /// Projection transform
    pub proj: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for UniformBufferObject {}
unsafe impl bytemuck::Zeroable for UniformBufferObject {}

impl UniformBufferObject {
    /// Size of the uniform block in bytes
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Build from matrices
    pub fn new(model: Mat4, view: Mat4, proj: Mat4) -> Self {
        Self {
            model: model.into(),
            view: view.into(),
            proj: proj.into(),
        }
    }

    /// Uniforms for `elapsed` wall-clock time rendered into a target of `extent`
    ///
    /// The model spins about +Z at [`ROTATION_DEGREES_PER_SECOND`]; the camera
    /// is fixed by `camera`.
    pub fn animated(elapsed: Duration, extent: (u32, u32), camera: &CameraPreset) -> Self {
        let angle = deg_to_rad(ROTATION_DEGREES_PER_SECOND) * elapsed.as_secs_f32();
        let model = Mat4::rotation_z(angle);
        let view = Mat4::look_at(camera.eye, camera.target, camera.up);

        let (width, height) = extent;
        let aspect = width as f32 / height.max(1) as f32;
        let proj = Mat4::perspective(deg_to_rad(camera.fov_y_degrees), aspect, camera.near, camera.far);

        Self::new(model, view, proj)
    }

    /// Raw bytes as written into the mapped buffer
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Model matrix as a math type
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from(self.model)
    }

    /// Projection matrix as a math type
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::from(self.proj)
    }
}

impl Default for UniformBufferObject {
    fn default() -> Self {
        Self::new(Mat4::identity(), Mat4::identity(), Mat4::identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn rotated_x_axis(ubo: &UniformBufferObject) -> Vec3 {
        ubo.model_matrix().transform_vector(&Vec3::x())
    }

    #[test]
    fn test_layout_is_three_aligned_matrices() {
        assert_eq!(UniformBufferObject::SIZE, 192);
        assert_eq!(std::mem::align_of::<UniformBufferObject>(), 16);
        assert_eq!(std::mem::offset_of!(UniformBufferObject, model), 0);
        assert_eq!(std::mem::offset_of!(UniformBufferObject, view), 64);
        assert_eq!(std::mem::offset_of!(UniformBufferObject, proj), 128);
    }

    #[test]
    fn test_rotation_after_two_seconds_is_quarter_turn() {
        let ubo = UniformBufferObject::animated(Duration::from_secs(2), (800, 600), &CameraPreset::viking_room());
        assert_relative_eq!(rotated_x_axis(&ubo), Vec3::y(), epsilon = EPSILON);
    }

    #[test]
    fn test_projection_is_flipped_and_uses_aspect() {
        let ubo = UniformBufferObject::animated(Duration::ZERO, (800, 600), &CameraPreset::viking_room());
        let proj = ubo.projection_matrix();

        assert!(proj[(1, 1)] < 0.0);
        assert_relative_eq!(proj[(0, 0)] * (800.0 / 600.0), -proj[(1, 1)], epsilon = EPSILON);
    }

    #[test]
    fn test_bytes_follow_matrices() {
        let ubo = UniformBufferObject::default();
        let bytes = ubo.as_bytes();
        assert_eq!(bytes.len(), UniformBufferObject::SIZE);

        let first: f32 = bytemuck::pod_read_unaligned(&bytes[0..4]);
        assert_relative_eq!(first, 1.0);
    }

    #[test]
    fn test_zero_height_extent_does_not_divide_by_zero() {
        let ubo = UniformBufferObject::animated(Duration::from_millis(500), (800, 0), &CameraPreset::viking_house());
        assert!(ubo.projection_matrix().iter().all(|v| v.is_finite()));
    }
}
