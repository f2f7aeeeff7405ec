//! OBJ/MTL import
//!
//! Parses a model file with `tobj` into plain, GPU-agnostic records the mesh
//! and material builders consume. Nothing here touches the GPU.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::gfx::error::SceneError;

/// Texture slots a material record can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextureKind {
    Ambient,
    Diffuse,
    Specular,
    Normal,
    Shininess,
    Dissolve,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMaterial {
    pub name: String,
    pub ambient: Option<[f32; 4]>,
    pub diffuse: Option<[f32; 4]>,
    pub specular: Option<[f32; 4]>,
    pub textures: BTreeMap<TextureKind, String>,
}

impl ImportedMaterial {
    pub fn texture(&self, kind: TextureKind) -> Option<&str> {
        self.textures.get(&kind).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tex_coords: Option<Vec<[f32; 2]>>,
    /// Faces as index lists; empty for non-indexed meshes.
    pub faces: Vec<Vec<u32>>,
    pub material_index: Option<usize>,
}

impl ImportedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// An imported scene: ordered meshes and ordered materials.
#[derive(Debug, Clone, Default)]
pub struct ImportedScene {
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    /// Directory texture references are resolved against.
    pub source_dir: PathBuf,
}

/// Loads an OBJ file and its material library.
///
/// Faces are triangulated on import. A missing or broken MTL library only
/// costs the materials; a broken OBJ is fatal.
pub fn load_obj(path: &Path) -> Result<ImportedScene, SceneError> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|source| SceneError::Import {
        path: path.to_path_buf(),
        source,
    })?;

    let materials = materials.unwrap_or_else(|err| {
        log::warn!(
            "no usable material library for {} ({err}), using default materials",
            path.display()
        );
        Vec::new()
    });

    let meshes: Vec<ImportedMesh> = models.into_iter().map(convert_model).collect();
    for mesh in &meshes {
        log::info!(
            "Mesh: {} ({} vertices, {} faces)",
            mesh.name,
            mesh.vertex_count(),
            mesh.faces.len()
        );
    }

    Ok(ImportedScene {
        meshes,
        materials: materials.iter().enumerate().map(convert_material).collect(),
        source_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
    })
}

fn convert_model(model: tobj::Model) -> ImportedMesh {
    let name = model.name;
    let mesh = model.mesh;
    let positions: Vec<[f32; 3]> = mesh
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    let vertex_count = positions.len();

    let normals = match mesh.normals.len() {
        0 => None,
        len if len == vertex_count * 3 => Some(
            mesh.normals
                .chunks_exact(3)
                .map(|n| [n[0], n[1], n[2]])
                .collect(),
        ),
        len => {
            log::warn!(
                "mesh '{name}': {} normals for {vertex_count} vertices, ignoring normals",
                len / 3
            );
            None
        }
    };

    let tex_coords = match mesh.texcoords.len() {
        0 => None,
        len if len == vertex_count * 2 => Some(
            mesh.texcoords
                .chunks_exact(2)
                // OBJ puts the UV origin bottom-left, wgpu samples from top-left.
                .map(|uv| [uv[0], 1.0 - uv[1]])
                .collect(),
        ),
        len => {
            log::warn!(
                "mesh '{name}': {} texture coordinates for {vertex_count} vertices, ignoring them",
                len / 2
            );
            None
        }
    };

    ImportedMesh {
        faces: split_faces(&mesh.indices, &mesh.face_arities),
        name,
        positions,
        normals,
        tex_coords,
        material_index: mesh.material_id,
    }
}

/// `face_arities` is empty when every face is a triangle.
fn split_faces(indices: &[u32], face_arities: &[u32]) -> Vec<Vec<u32>> {
    if face_arities.is_empty() {
        return indices.chunks(3).map(<[u32]>::to_vec).collect();
    }

    let mut faces = Vec::with_capacity(face_arities.len());
    let mut rest = indices;
    for &arity in face_arities {
        let (face, tail) = rest.split_at((arity as usize).min(rest.len()));
        faces.push(face.to_vec());
        rest = tail;
    }
    faces
}

fn convert_material((index, material): (usize, &tobj::Material)) -> ImportedMaterial {
    let alpha = material.dissolve.unwrap_or(1.0);
    let color = |rgb: Option<[f32; 3]>| rgb.map(|[r, g, b]| [r, g, b, alpha]);

    let slots = [
        (TextureKind::Ambient, &material.ambient_texture),
        (TextureKind::Diffuse, &material.diffuse_texture),
        (TextureKind::Specular, &material.specular_texture),
        (TextureKind::Normal, &material.normal_texture),
        (TextureKind::Shininess, &material.shininess_texture),
        (TextureKind::Dissolve, &material.dissolve_texture),
    ];
    let textures = slots
        .into_iter()
        .filter_map(|(kind, reference)| {
            reference
                .as_ref()
                .filter(|r| !r.trim().is_empty())
                .map(|r| (kind, r.clone()))
        })
        .collect();

    ImportedMaterial {
        name: if material.name.is_empty() {
            format!("material_{index}")
        } else {
            material.name.clone()
        },
        ambient: color(material.ambient),
        diffuse: color(material.diffuse),
        specular: color(material.specular),
        textures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_OBJ: &str = "\
mtllib quad.mtl
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl painted
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    const QUAD_MTL: &str = "\
newmtl painted
Ka 0.1 0.1 0.1
Kd 0.5 0.25 1.0
Ks 1 1 1
d 0.5
map_Kd tex\\diffuse.png
map_Bump normal.png
";

    fn write_scene(dir: &Path, obj: &str, mtl: Option<&str>) -> PathBuf {
        let path = dir.join("quad.obj");
        std::fs::write(&path, obj).unwrap();
        if let Some(mtl) = mtl {
            std::fs::write(dir.join("quad.mtl"), mtl).unwrap();
        }
        path
    }

    #[test]
    fn quad_is_triangulated_with_material() {
        let dir = tempfile::tempdir().unwrap();
        let scene = load_obj(&write_scene(dir.path(), QUAD_OBJ, Some(QUAD_MTL))).unwrap();

        assert_eq!(scene.source_dir, dir.path());
        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.name, "quad");
        assert_eq!(mesh.faces.len(), 2);
        assert!(mesh.faces.iter().all(|f| f.len() == 3));
        assert_eq!(mesh.material_index, Some(0));
        assert!(mesh.normals.is_some());

        let material = &scene.materials[0];
        assert_eq!(material.name, "painted");
        assert_eq!(material.diffuse, Some([0.5, 0.25, 1.0, 0.5]));
        assert_eq!(material.texture(TextureKind::Diffuse), Some("tex\\diffuse.png"));
        assert!(material.texture(TextureKind::Specular).is_none());
    }

    #[test]
    fn uv_v_is_flipped() {
        let dir = tempfile::tempdir().unwrap();
        let scene = load_obj(&write_scene(dir.path(), QUAD_OBJ, Some(QUAD_MTL))).unwrap();

        let uvs = scene.meshes[0].tex_coords.as_ref().unwrap();
        let positions = &scene.meshes[0].positions;
        for (position, uv) in positions.iter().zip(uvs) {
            // UVs in the fixture equal the xy of the position.
            assert_eq!(uv[0], position[0]);
            assert_eq!(uv[1], 1.0 - position[1]);
        }
    }

    #[test]
    fn missing_material_library_keeps_meshes() {
        let dir = tempfile::tempdir().unwrap();
        let scene = load_obj(&write_scene(dir.path(), QUAD_OBJ, None)).unwrap();

        assert_eq!(scene.meshes.len(), 1);
        assert!(scene.materials.is_empty());
    }

    #[test]
    fn mesh_without_normals_or_uvs() {
        let dir = tempfile::tempdir().unwrap();
        let obj = "o tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let scene = load_obj(&write_scene(dir.path(), obj, None)).unwrap();

        let mesh = &scene.meshes[0];
        assert!(mesh.normals.is_none());
        assert!(mesh.tex_coords.is_none());
        assert_eq!(mesh.faces, vec![vec![0, 1, 2]]);
        assert_eq!(mesh.material_index, None);
    }

    #[test]
    fn unreadable_scene_is_an_import_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_obj(&dir.path().join("missing.obj")).unwrap_err();
        assert!(matches!(err, SceneError::Import { .. }));
    }

    #[test]
    fn faces_are_split_by_arity() {
        assert_eq!(
            split_faces(&[0, 1, 2, 0, 2, 3, 4], &[3, 4]),
            vec![vec![0, 1, 2], vec![0, 2, 3, 4]]
        );
        assert_eq!(
            split_faces(&[0, 1, 2, 2, 1, 3], &[]),
            vec![vec![0, 1, 2], vec![2, 1, 3]]
        );
    }
}
