//! GPU resource management
//!
//! Texture path resolution, the texture cache, and materials.

pub mod image_decoder;
pub mod material;
pub mod path_resolver;
pub mod texture_repository;
pub mod texture_resource;

// Re-export main types
pub use image_decoder::{DecodedImage, FileImageDecoder, ImageDecoder};
pub use material::{build_material, build_materials, Material, TextureSlot};
pub use path_resolver::{PathResolver, Resolution};
pub use texture_repository::TextureRepository;
pub use texture_resource::TextureResource;
