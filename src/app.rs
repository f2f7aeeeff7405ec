use anyhow::Context;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    config::ViewerConfig,
    gfx::{
        backend::{wgpu_backend::GpuTexture, WgpuBackend},
        camera::KeyboardState,
        error::SceneError,
        rendering::{FrameOutcome, FrameRenderer},
        resources::TextureRepository,
        scene::{ImportedScene, Scene},
        shader::{ShaderBindingMap, ShaderProgram},
    },
};

/// Windowed viewer for one imported scene
///
/// Everything that can fail without a GPU (import, shader compilation,
/// binding resolution) is done before construction. The window, backend and
/// GPU scene are created on the first `resumed` event.
pub struct ViewerApp {
    config: ViewerConfig,
    program: ShaderProgram,
    bindings: ShaderBindingMap,
    imported: ImportedScene,
    keyboard: KeyboardState,
    state: Option<ViewerState>,
    error: Option<anyhow::Error>,
}

// Field order is drop order: GPU handles go before the backend.
struct ViewerState {
    renderer: FrameRenderer,
    scene: Scene<WgpuBackend>,
    textures: TextureRepository<GpuTexture>,
    backend: WgpuBackend,
    window: Arc<Window>,
}

impl ViewerApp {
    /// Fails when the imported scene has no meshes, so no window is ever
    /// opened for an empty scene.
    pub fn new(
        config: ViewerConfig,
        program: ShaderProgram,
        bindings: ShaderBindingMap,
        imported: ImportedScene,
    ) -> Result<Self, SceneError> {
        if imported.meshes.is_empty() {
            return Err(SceneError::NoMeshes);
        }

        let (width, height) = config.window_size;
        let keyboard = KeyboardState::new(config.keys.clone(), (width, height));
        Ok(Self {
            config,
            program,
            bindings,
            imported,
            keyboard,
            state: None,
            error: None,
        })
    }

    /// Run the viewer until the quit key, a closed window, or a fatal error
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = EventLoop::new().context("failed to create event loop")?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop
            .run_app(&mut self)
            .context("event loop terminated abnormally")?;

        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<ViewerState> {
        let (width, height) = self.config.window_size;
        let window = event_loop
            .create_window(
                WindowAttributes::default()
                    .with_title(self.config.window_title.clone())
                    .with_inner_size(winit::dpi::LogicalSize::new(width, height)),
            )
            .context("failed to create window")?;
        let window = Arc::new(window);

        let mut backend = pollster::block_on(WgpuBackend::new(
            window.clone(),
            &self.program,
            &self.bindings,
            self.config.clear_color,
        ))
        .context("failed to initialise renderer")?;

        let mut textures = TextureRepository::new();
        let scene = Scene::build(&mut backend, &self.bindings, &self.imported, &mut textures)
            .context("failed to build scene")?;
        log::info!("{} textures cached", textures.len());

        let renderer = FrameRenderer::new(
            self.bindings.clone(),
            self.config.camera.clone(),
            self.config.light,
        );

        Ok(ViewerState {
            renderer,
            scene,
            textures,
            backend,
            window,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.start(event_loop) {
            Ok(state) => {
                let PhysicalSize { width, height } = state.window.inner_size();
                self.keyboard.set_viewport(width, height);
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.keyboard.process_key_event(&event);
            }
            WindowEvent::Focused(false) => {
                self.keyboard.release_all();
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                state.backend.resize(width, height);
                self.keyboard.set_viewport(width, height);
            }
            WindowEvent::RedrawRequested => {
                match state
                    .renderer
                    .frame(&mut state.backend, &state.scene, &self.keyboard)
                {
                    Ok(FrameOutcome::Presented) => {}
                    Ok(FrameOutcome::Stopped) => {
                        log::info!(
                            "stopped after {} frames",
                            state.renderer.frames_presented()
                        );
                        event_loop.exit();
                    }
                    Err(err) => {
                        let err = anyhow::Error::new(err).context("failed to render frame");
                        self.fail(event_loop, err);
                    }
                }
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.as_ref() {
            state.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            log::debug!("releasing {} cached textures", state.textures.len());
        }
    }
}
