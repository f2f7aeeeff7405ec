//! Viewer configuration
//!
//! Plain structs with defaults and `with_*` builder methods. Everything here
//! is fixed for the session once the viewer starts.

use cgmath::{Deg, Point3, Vector3};
use winit::keyboard::KeyCode;

/// Logical inputs the frame loop polls each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKey {
    Quit,
    TurnLeft,
    TurnRight,
    MoveForward,
    MoveBackward,
}

impl LogicalKey {
    pub const ALL: [LogicalKey; 5] = [
        LogicalKey::Quit,
        LogicalKey::TurnLeft,
        LogicalKey::TurnRight,
        LogicalKey::MoveForward,
        LogicalKey::MoveBackward,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub start_position: Point3<f32>,
    /// Radians about +Y; zero looks down -Z.
    pub start_yaw: f32,
    pub fov_y: Deg<f32>,
    pub z_near: f32,
    pub z_far: f32,
    /// Radians added to or removed from the yaw per frame.
    pub turn_step: f32,
    /// Distance moved along the view direction per frame.
    pub move_step: f32,
    pub up: Vector3<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            start_position: Point3::new(0.0, 0.0, 10.0),
            start_yaw: 0.0,
            fov_y: Deg(45.0),
            z_near: 0.1,
            z_far: 100.0,
            turn_step: 0.02,
            move_step: 0.05,
            up: Vector3::unit_y(),
        }
    }
}

impl CameraConfig {
    pub fn with_start_position(mut self, position: Point3<f32>) -> Self {
        self.start_position = position;
        self
    }

    pub fn with_start_yaw(mut self, yaw: f32) -> Self {
        self.start_yaw = yaw;
        self
    }

    pub fn with_steps(mut self, turn_step: f32, move_step: f32) -> Self {
        self.turn_step = turn_step;
        self.move_step = move_step;
        self
    }

    pub fn with_clip_planes(mut self, z_near: f32, z_far: f32) -> Self {
        self.z_near = z_near;
        self.z_far = z_far;
        self
    }
}

/// The single directional light of a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightConfig {
    pub direction: [f32; 3],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction: [-0.3, -1.0, -0.5],
            ambient: [0.2, 0.2, 0.2, 1.0],
            diffuse: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl LightConfig {
    pub fn with_direction(mut self, direction: [f32; 3]) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_ambient(mut self, ambient: [f32; 4]) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_diffuse(mut self, diffuse: [f32; 4]) -> Self {
        self.diffuse = diffuse;
        self
    }

    /// Direction as a homogeneous vector (w = 0).
    pub fn direction_vec4(&self) -> [f32; 4] {
        let [x, y, z] = self.direction;
        [x, y, z, 0.0]
    }
}

/// Physical keys mapped to each logical key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBindings {
    pub quit: Vec<KeyCode>,
    pub turn_left: Vec<KeyCode>,
    pub turn_right: Vec<KeyCode>,
    pub move_forward: Vec<KeyCode>,
    pub move_backward: Vec<KeyCode>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: vec![KeyCode::Escape],
            turn_left: vec![KeyCode::ArrowLeft, KeyCode::KeyA],
            turn_right: vec![KeyCode::ArrowRight, KeyCode::KeyD],
            move_forward: vec![KeyCode::ArrowUp, KeyCode::KeyW],
            move_backward: vec![KeyCode::ArrowDown, KeyCode::KeyS],
        }
    }
}

impl KeyBindings {
    pub fn keys(&self, key: LogicalKey) -> &[KeyCode] {
        match key {
            LogicalKey::Quit => &self.quit,
            LogicalKey::TurnLeft => &self.turn_left,
            LogicalKey::TurnRight => &self.turn_right,
            LogicalKey::MoveForward => &self.move_forward,
            LogicalKey::MoveBackward => &self.move_backward,
        }
    }

    /// Logical key bound to `code`, if any.
    pub fn lookup(&self, code: KeyCode) -> Option<LogicalKey> {
        LogicalKey::ALL
            .into_iter()
            .find(|key| self.keys(*key).contains(&code))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub window_title: String,
    pub window_size: (u32, u32),
    pub clear_color: wgpu::Color,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub keys: KeyBindings,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_title: "bannock".to_string(),
            window_size: (1280, 720),
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.12,
                a: 1.0,
            },
            camera: CameraConfig::default(),
            light: LightConfig::default(),
            keys: KeyBindings::default(),
        }
    }
}

impl ViewerConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    pub fn with_clear_color(mut self, clear_color: wgpu::Color) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_light(mut self, light: LightConfig) -> Self {
        self.light = light;
        self
    }

    pub fn with_keys(mut self, keys: KeyBindings) -> Self {
        self.keys = keys;
        self
    }
}
