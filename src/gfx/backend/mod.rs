//! GPU backend abstraction
//!
//! The scene builders and the frame renderer talk to the GPU only through
//! [`RenderBackend`]. [`WgpuBackend`] is the real implementation; tests use a
//! recording backend that logs every call.
//!
//! The associated `Buffer` and `Texture` types are owning handles: dropping
//! one releases the GPU object, so a scene load that fails half-way cannot
//! leak anything it already uploaded.

pub mod wgpu_backend;

#[cfg(test)]
pub(crate) mod recording;

pub use wgpu_backend::WgpuBackend;

use crate::gfx::{
    error::RenderError,
    resources::image_decoder::DecodedImage,
    shader::{Attribute, UniformSlot},
};

/// Value written into a uniform slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            UniformValue::Float(value) => bytemuck::bytes_of(value),
            UniformValue::Vec4(value) => bytemuck::cast_slice(value),
            UniformValue::Mat4(value) => bytemuck::cast_slice(value),
        }
    }
}

/// How a mesh is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Indexed { index_count: u32 },
    NonIndexed { vertex_count: u32 },
}

impl DrawMode {
    /// Number of elements (indices or vertices) the draw call consumes.
    pub fn element_count(&self) -> u32 {
        match *self {
            DrawMode::Indexed { index_count } => index_count,
            DrawMode::NonIndexed { vertex_count } => vertex_count,
        }
    }
}

/// A vertex buffer bound to a shader attribute location.
#[derive(Debug)]
pub struct BoundAttribute<Buf> {
    pub attribute: Attribute,
    pub location: u32,
    pub buffer: Buf,
}

/// Everything the backend needs to issue one draw call.
pub struct MeshDraw<'a, Buf> {
    pub label: &'a str,
    pub attributes: &'a [BoundAttribute<Buf>],
    pub index_buffer: Option<&'a Buf>,
    pub vertex_count: u32,
    pub topology: wgpu::PrimitiveTopology,
    pub mode: DrawMode,
}

/// The operations the scene pipeline needs from a GPU.
///
/// Calls made between [`begin_frame`](RenderBackend::begin_frame) and
/// [`present`](RenderBackend::present) follow immediate-mode semantics:
/// uniforms and texture bindings set before a [`draw`](RenderBackend::draw)
/// are the ones that draw sees.
pub trait RenderBackend {
    type Buffer;
    type Texture;

    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> Self::Buffer;

    fn create_index_buffer(&mut self, label: &str, indices: &[u32]) -> Self::Buffer;

    /// Uploads an RGBA8 image, generating its mip chain.
    fn upload_texture(&mut self, label: &str, image: &DecodedImage) -> Self::Texture;

    /// Largest width or height `upload_texture` accepts.
    fn max_texture_dimension(&self) -> u32;

    /// Binds the shader program for a new frame.
    fn begin_frame(&mut self) -> Result<(), RenderError>;

    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue);

    /// Binds `texture` to `unit`, or unbinds the unit when `None`.
    fn bind_texture(&mut self, unit: u32, texture: Option<&Self::Texture>);

    fn draw(&mut self, mesh: MeshDraw<'_, Self::Buffer>);

    /// Submits the frame and swaps buffers.
    fn present(&mut self) -> Result<(), RenderError>;
}
