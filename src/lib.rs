// src/lib.rs
//! Bannock scene viewer
//!
//! Loads an OBJ/MTL scene, uploads its meshes and textures once, and draws it
//! every frame from a keyboard-driven first-person camera. Built on wgpu and
//! winit.

pub mod app;
pub mod config;
pub mod gfx;

// Re-export main types for convenience
pub use app::ViewerApp;
pub use config::ViewerConfig;
