//! Per-frame draw loop
//!
//! Each iteration polls input, moves the camera, uploads the frame uniforms
//! and draws every mesh of the scene with its material. A quit signal moves
//! the renderer to [`RendererState::Stopped`] for good.

use cgmath::Matrix4;

use crate::{
    config::{CameraConfig, LightConfig, LogicalKey},
    gfx::{
        backend::{RenderBackend, UniformValue},
        camera::{aspect_ratio, player_camera::convert_matrix4_to_array, InputSource, PlayerCamera},
        error::RenderError,
        resources::material::Material,
        scene::Scene,
        shader::{ShaderBindingMap, Uniform},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Running,
    Stopped,
}

/// Result of one call to [`FrameRenderer::frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was drawn and presented.
    Presented,
    /// Quit was requested; nothing was drawn.
    Stopped,
}

pub struct FrameRenderer {
    bindings: ShaderBindingMap,
    camera: PlayerCamera,
    light: LightConfig,
    state: RendererState,
    frames_presented: u64,
}

impl FrameRenderer {
    pub fn new(bindings: ShaderBindingMap, camera: CameraConfig, light: LightConfig) -> Self {
        Self {
            bindings,
            camera: PlayerCamera::new(camera),
            light,
            state: RendererState::Running,
            frames_presented: 0,
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn camera(&self) -> &PlayerCamera {
        &self.camera
    }

    pub fn bindings(&self) -> &ShaderBindingMap {
        &self.bindings
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Runs one iteration of the render loop.
    pub fn frame<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        scene: &Scene<B>,
        input: &impl InputSource,
    ) -> Result<FrameOutcome, RenderError> {
        if self.state == RendererState::Stopped {
            return Ok(FrameOutcome::Stopped);
        }
        if input.is_pressed(LogicalKey::Quit) {
            log::info!("quit requested after {} frames", self.frames_presented);
            self.state = RendererState::Stopped;
            return Ok(FrameOutcome::Stopped);
        }

        self.camera
            .turn(input.axis(LogicalKey::TurnLeft, LogicalKey::TurnRight));
        self.camera
            .advance(input.axis(LogicalKey::MoveBackward, LogicalKey::MoveForward));

        let (width, height) = input.viewport_size();
        let projection = self.camera.projection_matrix(aspect_ratio(width, height));
        let view = self.camera.view_matrix();

        backend.begin_frame()?;
        self.upload_matrix(backend, Uniform::Projection, projection);
        self.upload_matrix(backend, Uniform::View, view);
        self.upload_matrix(backend, Uniform::Model, self.camera.model_matrix());
        self.upload(
            backend,
            Uniform::LightDirection,
            UniformValue::Vec4(self.light.direction_vec4()),
        );
        self.upload(backend, Uniform::LightAmbient, UniformValue::Vec4(self.light.ambient));
        self.upload(backend, Uniform::LightDiffuse, UniformValue::Vec4(self.light.diffuse));

        for mesh in scene.meshes() {
            self.bind_material(backend, scene.material_for(mesh));
            backend.draw(mesh.draw_call());
        }

        backend.present()?;
        self.frames_presented += 1;
        Ok(FrameOutcome::Presented)
    }

    fn bind_material<B: RenderBackend>(&self, backend: &mut B, material: &Material<B::Texture>) {
        self.upload(backend, Uniform::MaterialAmbient, UniformValue::Vec4(material.ambient));
        self.upload(backend, Uniform::MaterialDiffuse, UniformValue::Vec4(material.diffuse));
        self.upload(backend, Uniform::MaterialSpecular, UniformValue::Vec4(material.specular));

        if let Some(sampler) = self.bindings.diffuse_sampler() {
            let texture = material.diffuse_texture.texture();
            backend.bind_texture(sampler.unit, texture.map(|t| &**t));
            backend.set_uniform(
                sampler.enabled,
                UniformValue::Float(material.diffuse_texture.sampler_enabled()),
            );
        }
    }

    fn upload_matrix<B: RenderBackend>(&self, backend: &mut B, uniform: Uniform, matrix: Matrix4<f32>) {
        self.upload(backend, uniform, UniformValue::Mat4(convert_matrix4_to_array(matrix)));
    }

    fn upload<B: RenderBackend>(&self, backend: &mut B, uniform: Uniform, value: UniformValue) {
        // Required uniforms were checked when the binding map was resolved.
        if let Some(slot) = self.bindings.uniform(uniform) {
            backend.set_uniform(slot, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, path::Path};

    use cgmath::{EuclideanSpace, InnerSpace};
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::gfx::{
        backend::{
            recording::{Command, RecordedTexture, RecordingBackend},
            DrawMode,
        },
        resources::TextureRepository,
        scene::{
            import::{load_obj, ImportedMesh, ImportedScene},
            Scene,
        },
        shader::ShaderProgram,
    };

    #[derive(Default)]
    struct HeldKeys(HashSet<LogicalKey>);

    impl HeldKeys {
        fn with(keys: &[LogicalKey]) -> Self {
            Self(keys.iter().copied().collect())
        }
    }

    impl InputSource for HeldKeys {
        fn is_pressed(&self, key: LogicalKey) -> bool {
            self.0.contains(&key)
        }

        fn viewport_size(&self) -> (u32, u32) {
            (800, 600)
        }
    }

    fn bindings() -> ShaderBindingMap {
        ShaderBindingMap::resolve(&ShaderProgram::builtin().unwrap()).unwrap()
    }

    fn renderer() -> FrameRenderer {
        FrameRenderer::new(bindings(), CameraConfig::default(), LightConfig::default())
    }

    fn triangle_scene(backend: &mut RecordingBackend) -> Scene<RecordingBackend> {
        let imported = ImportedScene {
            meshes: vec![ImportedMesh {
                name: "tri".to_string(),
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                faces: vec![vec![0, 1, 2]],
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut textures = TextureRepository::<RecordedTexture>::new();
        Scene::build(backend, &bindings(), &imported, &mut textures).unwrap()
    }

    #[test]
    fn conflicting_movement_leaves_camera_in_place() {
        let mut backend = RecordingBackend::new();
        let scene = triangle_scene(&mut backend);
        let mut renderer = renderer();
        let start = renderer.camera().position;

        let input = HeldKeys::with(&[LogicalKey::MoveForward, LogicalKey::MoveBackward]);
        renderer.frame(&mut backend, &scene, &input).unwrap();

        assert_eq!(renderer.camera().position, start);
    }

    #[test]
    fn forward_moves_exactly_one_step() {
        let mut backend = RecordingBackend::new();
        let scene = triangle_scene(&mut backend);
        let mut renderer = renderer();
        let start = renderer.camera().position;
        let forward = renderer.camera().forward();

        let input = HeldKeys::with(&[LogicalKey::MoveForward]);
        renderer.frame(&mut backend, &scene, &input).unwrap();

        let moved = renderer.camera().position - start;
        let expected = forward * CameraConfig::default().move_step;
        assert!((moved - expected).magnitude() < 1e-6);
    }

    #[test]
    fn conflicting_turns_keep_yaw() {
        let mut backend = RecordingBackend::new();
        let scene = triangle_scene(&mut backend);
        let mut renderer = renderer();

        let input = HeldKeys::with(&[LogicalKey::TurnLeft, LogicalKey::TurnRight]);
        renderer.frame(&mut backend, &scene, &input).unwrap();
        assert_eq!(renderer.camera().yaw, 0.0);

        let input = HeldKeys::with(&[LogicalKey::TurnLeft]);
        renderer.frame(&mut backend, &scene, &input).unwrap();
        assert_eq!(renderer.camera().yaw, -CameraConfig::default().turn_step);
    }

    #[test]
    fn quit_stops_without_drawing() {
        let mut backend = RecordingBackend::new();
        let scene = triangle_scene(&mut backend);
        backend.clear_commands();
        let mut renderer = renderer();

        let quit = HeldKeys::with(&[LogicalKey::Quit, LogicalKey::MoveForward]);
        let outcome = renderer.frame(&mut backend, &scene, &quit).unwrap();

        assert_eq!(outcome, FrameOutcome::Stopped);
        assert_eq!(renderer.state(), RendererState::Stopped);
        assert!(backend.commands.is_empty());
        assert_eq!(renderer.camera().position.to_vec().z, 10.0);

        // Stopped is terminal.
        let outcome = renderer
            .frame(&mut backend, &scene, &HeldKeys::default())
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Stopped);
        assert!(backend.commands.is_empty());
    }

    #[test]
    fn frame_uploads_camera_and_light_then_draws() {
        let mut backend = RecordingBackend::new();
        let scene = triangle_scene(&mut backend);
        backend.clear_commands();
        let mut renderer = renderer();

        let outcome = renderer
            .frame(&mut backend, &scene, &HeldKeys::default())
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Presented);
        assert_eq!(backend.commands.first(), Some(&Command::BeginFrame));
        assert_eq!(backend.commands.last(), Some(&Command::Present));

        let map = renderer.bindings();
        let draw = backend.draws()[0];
        let slot = |uniform| map.uniform(uniform).unwrap();
        assert_eq!(
            draw.uniform(slot(Uniform::LightDirection)),
            Some(UniformValue::Vec4(LightConfig::default().direction_vec4()))
        );
        assert_eq!(
            draw.uniform(slot(Uniform::View)),
            Some(UniformValue::Mat4(convert_matrix4_to_array(
                renderer.camera().view_matrix()
            )))
        );
        assert_eq!(
            draw.uniform(slot(Uniform::Model)),
            Some(UniformValue::Mat4(convert_matrix4_to_array(Matrix4::from_scale(1.0))))
        );
        assert_eq!(draw.mode, DrawMode::Indexed { index_count: 3 });
        assert_eq!(renderer.frames_presented(), 1);
    }

    #[test]
    fn untextured_material_disables_the_sampler() {
        let mut backend = RecordingBackend::new();
        let scene = triangle_scene(&mut backend);
        let mut renderer = renderer();

        renderer
            .frame(&mut backend, &scene, &HeldKeys::default())
            .unwrap();

        let enabled = renderer.bindings().diffuse_sampler().unwrap().enabled;
        let draw = backend.draws()[0];
        assert_eq!(draw.uniform(enabled), Some(UniformValue::Float(0.0)));
        assert_eq!(draw.texture, None);
    }

    const SHARED_OBJ: &str = "\
mtllib shared.mtl
o first
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
usemtl checker
f 1/1 2/2 3/3
o second
v 0 0 -1
v 1 0 -1
v 0 1 -1
usemtl checker
f 4/1 5/2 6/3
";

    const SHARED_MTL: &str = "\
newmtl checker
Ka 0.2 0.2 0.2
Kd 1 1 1
map_Kd textures\\checker.png
";

    fn write_shared_scene(dir: &Path) -> std::path::PathBuf {
        std::fs::create_dir(dir.join("textures")).unwrap();
        RgbaImage::from_fn(8, 8, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
        .save(dir.join("textures").join("checker.png"))
        .unwrap();
        std::fs::write(dir.join("shared.mtl"), SHARED_MTL).unwrap();
        let path = dir.join("shared.obj");
        std::fs::write(&path, SHARED_OBJ).unwrap();
        path
    }

    #[test]
    fn shared_material_uploads_one_texture_for_two_draws() {
        let dir = tempfile::tempdir().unwrap();
        let imported = load_obj(&write_shared_scene(dir.path())).unwrap();

        let mut backend = RecordingBackend::new();
        let mut textures = TextureRepository::<RecordedTexture>::new();
        let mut renderer = renderer();
        let scene = Scene::build(&mut backend, renderer.bindings(), &imported, &mut textures).unwrap();

        renderer
            .frame(&mut backend, &scene, &HeldKeys::default())
            .unwrap();

        assert_eq!(backend.texture_uploads(), 1);
        let draws = backend.draws();
        assert_eq!(draws.len(), 2);
        assert!(draws[0].texture.is_some());
        assert_eq!(draws[0].texture, draws[1].texture);

        let enabled = renderer.bindings().diffuse_sampler().unwrap().enabled;
        for draw in &draws {
            assert_eq!(draw.uniform(enabled), Some(UniformValue::Float(1.0)));
        }

        // A second frame reuses everything.
        renderer
            .frame(&mut backend, &scene, &HeldKeys::default())
            .unwrap();
        assert_eq!(backend.texture_uploads(), 1);
        assert_eq!(backend.draws().len(), 4);
        assert_eq!(backend.presents(), 2);
    }
}
