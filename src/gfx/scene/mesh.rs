//! GPU meshes
//!
//! A [`Mesh`] owns one vertex buffer per bound attribute plus an optional
//! index buffer. It is built once from an [`ImportedMesh`] and never changes;
//! dropping it releases its buffers.

use crate::gfx::{
    backend::{BoundAttribute, DrawMode, MeshDraw, RenderBackend},
    error::SceneError,
    shader::{Attribute, ShaderBindingMap},
};

use super::import::ImportedMesh;

pub struct Mesh<Buf> {
    pub name: String,
    attributes: Vec<BoundAttribute<Buf>>,
    index_buffer: Option<Buf>,
    vertex_count: u32,
    topology: wgpu::PrimitiveTopology,
    mode: DrawMode,
    material_index: Option<usize>,
}

impl<Buf> Mesh<Buf> {
    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn topology(&self) -> wgpu::PrimitiveTopology {
        self.topology
    }

    /// Index into the scene's material table; not ownership.
    pub fn material_index(&self) -> Option<usize> {
        self.material_index
    }

    pub fn attributes(&self) -> &[BoundAttribute<Buf>] {
        &self.attributes
    }

    pub fn index_buffer(&self) -> Option<&Buf> {
        self.index_buffer.as_ref()
    }

    pub fn draw_call(&self) -> MeshDraw<'_, Buf> {
        MeshDraw {
            label: &self.name,
            attributes: &self.attributes,
            index_buffer: self.index_buffer.as_ref(),
            vertex_count: self.vertex_count,
            topology: self.topology,
            mode: self.mode,
        }
    }
}

/// Uploads `imported` and binds its attributes to the shader's locations.
///
/// Faces must already be triangles and every index must name a vertex; both
/// are checked before anything is uploaded. Normals and texture coordinates
/// are only bound when the mesh has them, and the shader must then declare
/// them. A mesh without normals leaves the normal input unbound.
pub fn build_mesh<B: RenderBackend>(
    backend: &mut B,
    bindings: &ShaderBindingMap,
    imported: &ImportedMesh,
) -> Result<Mesh<B::Buffer>, SceneError> {
    let vertex_count = imported.vertex_count() as u32;
    let indices = flatten_faces(imported, vertex_count)?;

    let location = |attribute| {
        bindings
            .attribute_location(attribute)
            .map_err(|source| SceneError::Binding {
                mesh: imported.name.clone(),
                source,
            })
    };
    let position_location = location(Attribute::Position)?;
    let normal_location = imported
        .normals
        .as_ref()
        .map(|_| location(Attribute::Normal))
        .transpose()?;
    let tex_coord_location = imported
        .tex_coords
        .as_ref()
        .map(|_| location(Attribute::TexCoord))
        .transpose()?;

    let mut attributes = Vec::with_capacity(3);
    attributes.push(BoundAttribute {
        attribute: Attribute::Position,
        location: position_location,
        buffer: backend.create_vertex_buffer(
            &format!("{} positions", imported.name),
            bytemuck::cast_slice(&imported.positions),
        ),
    });
    if let (Some(normals), Some(location)) = (&imported.normals, normal_location) {
        attributes.push(BoundAttribute {
            attribute: Attribute::Normal,
            location,
            buffer: backend.create_vertex_buffer(
                &format!("{} normals", imported.name),
                bytemuck::cast_slice(normals),
            ),
        });
    }
    if let (Some(tex_coords), Some(location)) = (&imported.tex_coords, tex_coord_location) {
        attributes.push(BoundAttribute {
            attribute: Attribute::TexCoord,
            location,
            buffer: backend.create_vertex_buffer(
                &format!("{} tex coords", imported.name),
                bytemuck::cast_slice(tex_coords),
            ),
        });
    }

    let (index_buffer, mode) = match indices {
        Some(indices) => (
            Some(backend.create_index_buffer(&format!("{} indices", imported.name), &indices)),
            DrawMode::Indexed {
                index_count: indices.len() as u32,
            },
        ),
        None => (None, DrawMode::NonIndexed { vertex_count }),
    };

    Ok(Mesh {
        name: imported.name.clone(),
        attributes,
        index_buffer,
        vertex_count,
        topology: wgpu::PrimitiveTopology::TriangleList,
        mode,
        material_index: imported.material_index,
    })
}

/// Concatenates triangle faces into one index list, or `None` when the mesh
/// declares no faces.
fn flatten_faces(imported: &ImportedMesh, vertex_count: u32) -> Result<Option<Vec<u32>>, SceneError> {
    if imported.faces.is_empty() {
        return Ok(None);
    }

    let mut indices = Vec::with_capacity(imported.faces.len() * 3);
    for (face_index, face) in imported.faces.iter().enumerate() {
        if face.len() != 3 {
            return Err(SceneError::NonTriangularFace {
                mesh: imported.name.clone(),
                face: face_index,
                arity: face.len(),
            });
        }
        if let Some(&index) = face.iter().find(|&&index| index >= vertex_count) {
            return Err(SceneError::IndexOutOfRange {
                mesh: imported.name.clone(),
                index,
                vertex_count,
            });
        }
        indices.extend_from_slice(face);
    }
    Ok(Some(indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{
        backend::recording::{Command, RecordingBackend},
        error::BindingError,
        shader::ShaderProgram,
    };

    const POSITION_ONLY: &str = r#"
struct Frame {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
    model: mat4x4<f32>,
    light_direction: vec4<f32>,
    light_ambient: vec4<f32>,
    light_diffuse: vec4<f32>,
    material_ambient: vec4<f32>,
    material_diffuse: vec4<f32>,
    material_specular: vec4<f32>,
};
@group(0) @binding(0) var<uniform> frame: Frame;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return frame.projection * frame.view * frame.model * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return frame.material_diffuse;
}
"#;

    fn builtin_bindings() -> ShaderBindingMap {
        ShaderBindingMap::resolve(&ShaderProgram::builtin().unwrap()).unwrap()
    }

    fn quad() -> ImportedMesh {
        ImportedMesh {
            name: "quad".to_string(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
            faces: vec![vec![0, 1, 2], vec![2, 1, 3]],
            ..Default::default()
        }
    }

    #[test]
    fn triangle_faces_become_one_index_buffer() {
        let mut backend = RecordingBackend::new();
        let mesh = build_mesh(&mut backend, &builtin_bindings(), &quad()).unwrap();

        assert_eq!(mesh.mode(), DrawMode::Indexed { index_count: 6 });
        assert_eq!(mesh.index_buffer().unwrap().as_u32(), vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(mesh.topology(), wgpu::PrimitiveTopology::TriangleList);
        assert!(backend
            .commands
            .contains(&Command::CreateIndexBuffer {
                id: mesh.index_buffer().unwrap().id,
                indices: vec![0, 1, 2, 2, 1, 3],
            }));
    }

    #[test]
    fn quad_face_is_rejected_before_upload() {
        let mut backend = RecordingBackend::new();
        let mut imported = quad();
        imported.faces = vec![vec![0, 1, 3, 2]];

        let err = build_mesh(&mut backend, &builtin_bindings(), &imported).err().unwrap();
        assert!(matches!(err, SceneError::NonTriangularFace { arity: 4, face: 0, .. }));
        assert!(backend.commands.is_empty());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut backend = RecordingBackend::new();
        let mut imported = quad();
        imported.faces = vec![vec![0, 1, 4]];

        let err = build_mesh(&mut backend, &builtin_bindings(), &imported).err().unwrap();
        assert!(matches!(
            err,
            SceneError::IndexOutOfRange { index: 4, vertex_count: 4, .. }
        ));
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn mesh_without_faces_draws_non_indexed() {
        let mut backend = RecordingBackend::new();
        let mut imported = quad();
        imported.positions.truncate(3);
        imported.faces.clear();

        let mesh = build_mesh(&mut backend, &builtin_bindings(), &imported).unwrap();
        assert_eq!(mesh.mode(), DrawMode::NonIndexed { vertex_count: 3 });
        assert!(mesh.index_buffer().is_none());
    }

    #[test]
    fn missing_normals_leave_the_attribute_unbound() {
        let mut backend = RecordingBackend::new();
        let mut imported = quad();
        imported.tex_coords = Some(vec![[0.0, 0.0]; 4]);

        let mesh = build_mesh(&mut backend, &builtin_bindings(), &imported).unwrap();
        let bound: Vec<_> = mesh
            .attributes()
            .iter()
            .map(|a| (a.attribute, a.location))
            .collect();
        assert_eq!(bound, vec![(Attribute::Position, 0), (Attribute::TexCoord, 2)]);
    }

    #[test]
    fn positions_and_normals_are_uploaded() {
        let mut backend = RecordingBackend::new();
        let mut imported = quad();
        imported.normals = Some(vec![[0.0, 0.0, 1.0]; 4]);

        let mesh = build_mesh(&mut backend, &builtin_bindings(), &imported).unwrap();
        let normals = &mesh.attributes()[1];
        assert_eq!(normals.attribute, Attribute::Normal);
        assert_eq!(normals.location, 1);
        assert_eq!(normals.buffer.as_f32()[..3], [0.0, 0.0, 1.0]);
        assert_eq!(mesh.attributes()[0].buffer.as_f32().len(), 12);
    }

    #[test]
    fn normals_need_a_shader_input_only_when_present() {
        let program = ShaderProgram::from_wgsl("position only", POSITION_ONLY).unwrap();
        let bindings = ShaderBindingMap::resolve(&program).unwrap();
        let mut backend = RecordingBackend::new();

        assert!(build_mesh(&mut backend, &bindings, &quad()).is_ok());

        let mut with_normals = quad();
        with_normals.normals = Some(vec![[0.0, 0.0, 1.0]; 4]);
        let err = build_mesh(&mut backend, &bindings, &with_normals).err().unwrap();
        assert!(matches!(
            err,
            SceneError::Binding {
                source: BindingError::MissingAttribute("normal"),
                ..
            }
        ));
    }
}
