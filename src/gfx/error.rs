//! Error types for the scene pipeline
//!
//! Fatal configuration problems (shader, bindings, empty scenes) and degraded
//! resource problems (textures) are kept in separate enums so callers can tell
//! which ones must stop the pipeline and which ones only downgrade a resource.

use std::path::PathBuf;

use thiserror::Error;

/// Shader program failed to compile or link.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader '{label}' failed to compile:\n{message}")]
    Compile { label: String, message: String },

    #[error("shader '{label}' failed to link:\n{message}")]
    Link { label: String, message: String },

    #[error("shader '{label}' has no {stage} entry point '{entry_point}'")]
    MissingEntryPoint {
        label: String,
        stage: &'static str,
        entry_point: &'static str,
    },
}

/// A required shader input could not be resolved to a valid location.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("vertex attribute '{0}' is not declared by the shader")]
    MissingAttribute(&'static str),

    #[error("uniform '{0}' is not declared by the shader")]
    MissingUniform(&'static str),

    #[error("uniform '{name}' has {actual} bytes but {expected} are uploaded")]
    UniformSize {
        name: &'static str,
        expected: u32,
        actual: u32,
    },

    #[error("diffuse texture and sampler must live in the same bind group")]
    SplitSampler,
}

/// A texture could not be resolved or decoded. Always recoverable.
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("texture reference '{reference}' did not resolve (tried {tried:?})")]
    Unresolved {
        reference: String,
        tried: Vec<PathBuf>,
    },

    #[error("failed to decode texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Scene import or resource build failure. Always fatal.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to import scene {path}: {source}")]
    Import {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("scene doesn't have meshes")]
    NoMeshes,

    #[error("mesh '{mesh}': face {face} has {arity} indices, only triangles are supported")]
    NonTriangularFace {
        mesh: String,
        face: usize,
        arity: usize,
    },

    #[error("mesh '{mesh}': index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        mesh: String,
        index: u32,
        vertex_count: u32,
    },

    #[error("mesh '{mesh}': {source}")]
    Binding {
        mesh: String,
        #[source]
        source: BindingError,
    },
}

/// Failure while presenting a frame or setting up the GPU.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no compatible GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("surface error: {0}")]
    Frame(#[from] wgpu::SurfaceError),

    #[error("unsupported shader layout: {0}")]
    Layout(String),
}
