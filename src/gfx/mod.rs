//! # Graphics Module
//!
//! Everything between an OBJ file on disk and a presented frame.
//!
//! ## Architecture Overview
//!
//! - **Shaders** ([`shader`]) - WGSL program and its reflected binding locations
//! - **Resources** ([`resources`]) - Texture path resolution, the texture cache and materials
//! - **Scene** ([`scene`]) - OBJ/MTL import and GPU-resident meshes
//! - **Camera** ([`camera`]) - First-person camera and keyboard input
//! - **Rendering** ([`rendering`]) - Pipelines and the per-frame loop body
//! - **Backend** ([`backend`]) - The GPU seam, implemented on wgpu
//!
//! ## Usage
//!
//! ```no_run
//! use bannock::gfx::{scene::load_obj, shader::{ShaderBindingMap, ShaderProgram}};
//!
//! # fn main() -> anyhow::Result<()> {
//! let imported = load_obj(std::path::Path::new("assets/scene.obj"))?;
//! let program = ShaderProgram::builtin()?;
//! let bindings = ShaderBindingMap::resolve(&program)?;
//! // The backend and scene are created once the window exists, see `ViewerApp`.
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod camera;
pub mod error;
pub mod rendering;
pub mod resources;
pub mod scene;
pub mod shader;

// Re-export commonly used types
pub use backend::{RenderBackend, WgpuBackend};
pub use camera::PlayerCamera;
pub use rendering::FrameRenderer;
