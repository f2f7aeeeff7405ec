use crate::gfx::{
    backend::RenderBackend,
    error::SceneError,
    resources::{
        material::{build_materials, Material},
        texture_repository::TextureRepository,
    },
    shader::ShaderBindingMap,
};

use super::{
    import::ImportedScene,
    mesh::{build_mesh, Mesh},
};

/// GPU resources of one loaded scene
///
/// Meshes and materials are owned here and released together when the scene
/// is dropped. Textures stay alive in the [`TextureRepository`] as long as
/// it does.
pub struct Scene<B: RenderBackend> {
    meshes: Vec<Mesh<B::Buffer>>,
    materials: Vec<Material<B::Texture>>,
    default_material: Material<B::Texture>,
}

impl<B: RenderBackend> Scene<B> {
    /// Builds meshes and materials for `imported`
    ///
    /// Fails when the scene has no drawable meshes or when a mesh breaks the
    /// triangle/binding rules. Anything uploaded before a failure is released
    /// on return.
    pub fn build(
        backend: &mut B,
        bindings: &ShaderBindingMap,
        imported: &ImportedScene,
        textures: &mut TextureRepository<B::Texture>,
    ) -> Result<Self, SceneError> {
        if imported.meshes.is_empty() {
            return Err(SceneError::NoMeshes);
        }

        let mut meshes = Vec::with_capacity(imported.meshes.len());
        for mesh in &imported.meshes {
            if mesh.positions.is_empty() {
                log::warn!("mesh '{}' has no vertices, skipping", mesh.name);
                continue;
            }
            meshes.push(build_mesh(backend, bindings, mesh)?);
        }
        if meshes.is_empty() {
            return Err(SceneError::NoMeshes);
        }

        let materials = build_materials(
            backend,
            &imported.materials,
            &imported.source_dir,
            textures,
        );

        let scene = Self {
            meshes,
            materials,
            default_material: Material::default(),
        };
        let stats = scene.statistics();
        log::info!(
            "scene ready: {} meshes, {} materials ({} textured), {} triangles, {} vertices",
            stats.mesh_count,
            stats.material_count,
            stats.textured_materials,
            stats.total_triangles,
            stats.total_vertices
        );

        Ok(scene)
    }

    pub fn meshes(&self) -> &[Mesh<B::Buffer>] {
        &self.meshes
    }

    pub fn materials(&self) -> &[Material<B::Texture>] {
        &self.materials
    }

    /// Material for `mesh`, falling back to the default material when the
    /// mesh has no material index or the index is out of range.
    pub fn material_for(&self, mesh: &Mesh<B::Buffer>) -> &Material<B::Texture> {
        mesh.material_index()
            .and_then(|index| self.materials.get(index))
            .unwrap_or(&self.default_material)
    }

    /// Gets statistics about the scene
    pub fn statistics(&self) -> SceneStatistics {
        SceneStatistics {
            mesh_count: self.meshes.len(),
            material_count: self.materials.len(),
            textured_materials: self
                .materials
                .iter()
                .filter(|m| !m.diffuse_texture.is_empty())
                .count(),
            total_triangles: self
                .meshes
                .iter()
                .map(|m| m.mode().element_count() / 3)
                .sum(),
            total_vertices: self.meshes.iter().map(|m| m.vertex_count()).sum(),
        }
    }
}

/// Scene statistics for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneStatistics {
    pub mesh_count: usize,
    pub material_count: usize,
    pub textured_materials: usize,
    pub total_triangles: u32,
    pub total_vertices: u32,
}
