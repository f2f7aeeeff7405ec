//! Material system
//!
//! Render-ready materials built from imported material records. Colors are
//! copied as-is; only the diffuse texture is resolved and uploaded, through
//! the shared [`TextureRepository`]. Materials hold the same handle the
//! repository caches; neither is the sole owner of the texture.

use std::{path::Path, sync::Arc};

use super::{
    path_resolver::{PathResolver, Resolution},
    texture_repository::TextureRepository,
};
use crate::gfx::{
    backend::RenderBackend,
    scene::import::{ImportedMaterial, TextureKind},
};

/// Opaque white, the default for every color coefficient.
pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Whether a material samples a diffuse texture.
///
/// The handle is shared with the [`TextureRepository`], so a material keeps
/// its texture alive even after the repository is dropped.
#[derive(Debug)]
pub enum TextureSlot<T> {
    Empty,
    Texture(Arc<T>),
}

impl<T> TextureSlot<T> {
    pub fn texture(&self) -> Option<&Arc<T>> {
        match self {
            TextureSlot::Empty => None,
            TextureSlot::Texture(texture) => Some(texture),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TextureSlot::Empty)
    }

    /// Value of the shader's sampler-enabled flag for this slot.
    pub fn sampler_enabled(&self) -> f32 {
        match self {
            TextureSlot::Empty => 0.0,
            TextureSlot::Texture(_) => 1.0,
        }
    }
}

impl<T> Clone for TextureSlot<T> {
    fn clone(&self) -> Self {
        match self {
            TextureSlot::Empty => TextureSlot::Empty,
            TextureSlot::Texture(texture) => TextureSlot::Texture(Arc::clone(texture)),
        }
    }
}

/// Material definition with Phong color coefficients
#[derive(Debug, Clone)]
pub struct Material<T> {
    pub name: String,
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub diffuse_texture: TextureSlot<T>,
}

impl<T> Default for Material<T> {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            ambient: WHITE,
            diffuse: WHITE,
            specular: WHITE,
            diffuse_texture: TextureSlot::Empty,
        }
    }
}

impl<T> Material<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Builder pattern: Set ambient color
    pub fn with_ambient(mut self, ambient: [f32; 4]) -> Self {
        self.ambient = ambient;
        self
    }

    /// Builder pattern: Set diffuse color
    pub fn with_diffuse(mut self, diffuse: [f32; 4]) -> Self {
        self.diffuse = diffuse;
        self
    }

    /// Builder pattern: Set specular color
    pub fn with_specular(mut self, specular: [f32; 4]) -> Self {
        self.specular = specular;
        self
    }

    /// Builder pattern: Set the diffuse texture
    pub fn with_texture(mut self, texture: Arc<T>) -> Self {
        self.diffuse_texture = TextureSlot::Texture(texture);
        self
    }
}

/// Builds a render-ready material from an imported record.
///
/// Texture problems never fail the build: an unresolvable or undecodable
/// diffuse texture leaves the material untextured and logs a warning.
pub fn build_material<B: RenderBackend>(
    backend: &mut B,
    imported: &ImportedMaterial,
    resolver: &PathResolver,
    textures: &mut TextureRepository<B::Texture>,
) -> Material<B::Texture> {
    let mut material = Material::new(&imported.name)
        .with_ambient(imported.ambient.unwrap_or(WHITE))
        .with_diffuse(imported.diffuse.unwrap_or(WHITE))
        .with_specular(imported.specular.unwrap_or(WHITE));

    for (kind, reference) in &imported.textures {
        if *kind != TextureKind::Diffuse {
            log::debug!(
                "material '{}': {kind:?} texture '{reference}' has no shader slot, skipping",
                imported.name
            );
        }
    }

    let reference = imported.texture(TextureKind::Diffuse).unwrap_or_default();
    match resolver.resolve(reference) {
        Ok(Resolution::NoTexture) => {}
        Ok(Resolution::Resolved(path)) => {
            if let Some(texture) = textures.get_or_create(backend, &path) {
                material = material.with_texture(texture);
            }
        }
        Err(err) => {
            log::warn!("material '{}': {err}; using no texture", imported.name);
        }
    }

    material
}

/// Builds every material of a scene, in order.
pub fn build_materials<B: RenderBackend>(
    backend: &mut B,
    imported: &[ImportedMaterial],
    scene_dir: &Path,
    textures: &mut TextureRepository<B::Texture>,
) -> Vec<Material<B::Texture>> {
    let resolver = PathResolver::new(scene_dir);
    imported
        .iter()
        .map(|material| build_material(backend, material, &resolver, textures))
        .collect()
}
