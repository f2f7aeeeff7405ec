//! # Scene Management Module
//!
//! Turns an imported OBJ scene into GPU-resident meshes and materials.
//!
//! ## Key Components
//!
//! - [`import`] - OBJ/MTL parsing into plain mesh and material records
//! - [`Mesh`] - Vertex/index buffers plus the draw mode of one mesh
//! - [`Scene`] - The meshes and materials of one loaded scene

pub mod import;
pub mod mesh;
pub mod scene;

// Re-export main types
pub use import::{load_obj, ImportedMaterial, ImportedMesh, ImportedScene, TextureKind};
pub use mesh::{build_mesh, Mesh};
pub use scene::{Scene, SceneStatistics};
