pub mod input;
pub mod player_camera;

// Re-export main types
pub use input::{InputSource, KeyboardState};
pub use player_camera::{aspect_ratio, PlayerCamera};
