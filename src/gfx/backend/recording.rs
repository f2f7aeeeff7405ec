//! Recording backend used by unit tests
//!
//! Every call is appended to a command log. Buffers count themselves in a
//! shared live counter so tests can check that dropped scenes release
//! everything they created.

use std::{cell::Cell, collections::HashMap, rc::Rc};

use super::{DrawMode, MeshDraw, RenderBackend, UniformValue};
use crate::gfx::{
    error::RenderError,
    resources::image_decoder::DecodedImage,
    shader::{Attribute, UniformSlot, DIFFUSE_TEXTURE_UNIT},
};

#[derive(Debug)]
pub(crate) struct RecordedBuffer {
    pub id: u32,
    pub label: String,
    pub contents: Vec<u8>,
    live: Rc<Cell<usize>>,
}

impl RecordedBuffer {
    pub fn as_f32(&self) -> Vec<f32> {
        self.words().map(f32::from_ne_bytes).collect()
    }

    pub fn as_u32(&self) -> Vec<u32> {
        self.words().map(u32::from_ne_bytes).collect()
    }

    fn words(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.contents
            .chunks_exact(4)
            .map(|word| [word[0], word[1], word[2], word[3]])
    }
}

impl Drop for RecordedBuffer {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RecordedTexture {
    pub id: u32,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedDraw {
    pub label: String,
    pub attributes: Vec<(Attribute, u32)>,
    pub indexed: bool,
    pub mode: DrawMode,
    pub vertex_count: u32,
    pub texture: Option<u32>,
    pub uniforms: HashMap<UniformSlot, UniformValue>,
}

impl RecordedDraw {
    pub fn uniform(&self, slot: UniformSlot) -> Option<UniformValue> {
        self.uniforms.get(&slot).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    CreateVertexBuffer { id: u32, label: String },
    CreateIndexBuffer { id: u32, indices: Vec<u32> },
    UploadTexture { id: u32, label: String },
    BeginFrame,
    SetUniform { slot: UniformSlot, value: UniformValue },
    BindTexture { unit: u32, texture: Option<u32> },
    Draw(RecordedDraw),
    Present,
}

#[derive(Debug)]
pub(crate) struct RecordingBackend {
    pub commands: Vec<Command>,
    live_buffers: Rc<Cell<usize>>,
    next_id: u32,
    uniforms: HashMap<UniformSlot, UniformValue>,
    bound_textures: HashMap<u32, u32>,
    max_texture_dimension: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            live_buffers: Rc::new(Cell::new(0)),
            next_id: 0,
            uniforms: HashMap::new(),
            bound_textures: HashMap::new(),
            max_texture_dimension: 4096,
        }
    }

    pub fn with_max_texture_dimension(mut self, max: u32) -> Self {
        self.max_texture_dimension = max;
        self
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.get()
    }

    pub fn texture_uploads(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::UploadTexture { .. }))
            .count()
    }

    pub fn draws(&self) -> Vec<&RecordedDraw> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    pub fn presents(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Present))
            .count()
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn buffer(&mut self, label: &str, contents: &[u8]) -> RecordedBuffer {
        self.live_buffers.set(self.live_buffers.get() + 1);
        RecordedBuffer {
            id: self.next_id(),
            label: label.to_string(),
            contents: contents.to_vec(),
            live: Rc::clone(&self.live_buffers),
        }
    }
}

impl RenderBackend for RecordingBackend {
    type Buffer = RecordedBuffer;
    type Texture = RecordedTexture;

    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> RecordedBuffer {
        let buffer = self.buffer(label, contents);
        self.commands.push(Command::CreateVertexBuffer {
            id: buffer.id,
            label: label.to_string(),
        });
        buffer
    }

    fn create_index_buffer(&mut self, label: &str, indices: &[u32]) -> RecordedBuffer {
        let buffer = self.buffer(label, bytemuck::cast_slice(indices));
        self.commands.push(Command::CreateIndexBuffer {
            id: buffer.id,
            indices: indices.to_vec(),
        });
        buffer
    }

    fn upload_texture(&mut self, label: &str, image: &DecodedImage) -> RecordedTexture {
        let id = self.next_id();
        self.commands.push(Command::UploadTexture {
            id,
            label: label.to_string(),
        });
        RecordedTexture {
            id,
            label: label.to_string(),
            width: image.width(),
            height: image.height(),
            mip_levels: image.mip_level_count(),
        }
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.uniforms.clear();
        self.bound_textures.clear();
        self.commands.push(Command::BeginFrame);
        Ok(())
    }

    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue) {
        self.uniforms.insert(slot, value);
        self.commands.push(Command::SetUniform { slot, value });
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<&RecordedTexture>) {
        match texture {
            Some(texture) => self.bound_textures.insert(unit, texture.id),
            None => self.bound_textures.remove(&unit),
        };
        self.commands.push(Command::BindTexture {
            unit,
            texture: texture.map(|t| t.id),
        });
    }

    fn draw(&mut self, mesh: MeshDraw<'_, RecordedBuffer>) {
        let draw = RecordedDraw {
            label: mesh.label.to_string(),
            attributes: mesh
                .attributes
                .iter()
                .map(|bound| (bound.attribute, bound.location))
                .collect(),
            indexed: mesh.index_buffer.is_some(),
            mode: mesh.mode,
            vertex_count: mesh.vertex_count,
            texture: self.bound_textures.get(&DIFFUSE_TEXTURE_UNIT).copied(),
            uniforms: self.uniforms.clone(),
        };
        self.commands.push(Command::Draw(draw));
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.commands.push(Command::Present);
        Ok(())
    }
}
