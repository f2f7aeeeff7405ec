//! First-person camera
//!
//! Position plus a single yaw angle about the vertical axis. The forward
//! direction, view matrix and projection are derived on demand every frame,
//! never cached.

use cgmath::{perspective, Matrix4, Point3, SquareMatrix, Vector3};

use crate::config::CameraConfig;

/// Remaps GL clip depth [-1, 1] to wgpu's [0, 1]. Arguments are column-major.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Debug, Clone)]
pub struct PlayerCamera {
    pub position: Point3<f32>,
    pub yaw: f32,
    config: CameraConfig,
}

impl PlayerCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            position: config.start_position,
            yaw: config.start_yaw,
            config,
        }
    }

    /// Unit vector the camera looks along; yaw 0 looks down -Z.
    pub fn forward(&self) -> Vector3<f32> {
        Vector3::new(self.yaw.sin(), 0.0, -self.yaw.cos())
    }

    /// Turns by `direction` turn steps; negative turns left.
    pub fn turn(&mut self, direction: f32) {
        self.yaw += direction * self.config.turn_step;
    }

    /// Moves by `direction` move steps along the forward vector; negative
    /// moves backwards.
    pub fn advance(&mut self, direction: f32) {
        self.position += self.forward() * (direction * self.config.move_step);
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.position + self.forward(), self.config.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX
            * perspective(self.config.fov_y, aspect, self.config.z_near, self.config.z_far)
    }

    /// Scene objects are drawn untransformed.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::identity()
    }
}

/// Width over height; a zero-height viewport (minimized window) yields 1.0.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

pub fn convert_matrix4_to_array(matrix4: Matrix4<f32>) -> [[f32; 4]; 4] {
    matrix4.into()
}
