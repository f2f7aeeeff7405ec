//! wgpu implementation of [`RenderBackend`]
//!
//! wgpu has no immediate-mode uniforms, so the backend emulates them:
//!
//! - Every reflected uniform block keeps a CPU staging copy that
//!   `set_uniform` writes into.
//! - `draw` snapshots all staging blocks into per-block arenas and records
//!   the draw; each snapshot is later addressed with a dynamic offset.
//! - `present` uploads the arenas, replays the recorded draws in a single
//!   render pass and presents the surface texture.
//!
//! Attributes a mesh doesn't provide read from a zero-filled buffer, so an
//! unbound normal arrives in the shader as a zero vector.

use std::{collections::HashMap, num::NonZeroU64, sync::Arc};

use wgpu::util::DeviceExt;
use winit::window::Window;

use super::{DrawMode, MeshDraw, RenderBackend, UniformValue};
use crate::gfx::{
    error::RenderError,
    rendering::pipeline_manager::{PipelineConfig, PipelineManager},
    resources::{image_decoder::DecodedImage, texture_resource::TextureResource},
    shader::{DiffuseSampler, ShaderBindingMap, ShaderProgram, UniformSlot},
};

/// Vertex or index buffer, destroyed on drop.
#[derive(Debug)]
pub struct GpuBuffer {
    buffer: wgpu::Buffer,
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

/// Uploaded texture plus the bind group that samples it.
pub struct GpuTexture {
    // Owns the texture; dropping it destroys what the bind group samples.
    _resource: TextureResource,
    bind_group: Option<wgpu::BindGroup>,
}

/// One `var<uniform>` block: staging bytes plus the per-draw arena.
struct UniformBlockState {
    binding: u32,
    size: u64,
    stride: u64,
    staging: Vec<u8>,
    snapshots: Vec<u8>,
    buffer: wgpu::Buffer,
    capacity: u64,
}

impl UniformBlockState {
    fn snapshot(&mut self) -> u32 {
        let offset = self.snapshots.len() as u32;
        self.snapshots.extend_from_slice(&self.staging);
        self.snapshots.resize(offset as usize + self.stride as usize, 0);
        offset
    }
}

/// All uniform blocks of one bind group.
struct UniformGroupState {
    group: u32,
    layout: wgpu::BindGroupLayout,
    blocks: Vec<UniformBlockState>,
    bind_group: wgpu::BindGroup,
}

struct TextureGroupState {
    sampler: DiffuseSampler,
    layout: wgpu::BindGroupLayout,
    placeholder: GpuTexture,
}

struct PendingDraw {
    label: String,
    topology: wgpu::PrimitiveTopology,
    vertex_buffers: Vec<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    mode: DrawMode,
    uniform_offsets: Vec<Vec<u32>>,
    texture: Option<wgpu::BindGroup>,
}

pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_texture: TextureResource,
    clear_color: wgpu::Color,
    pipeline_manager: PipelineManager,
    uniform_groups: Vec<UniformGroupState>,
    empty_groups: Vec<(u32, wgpu::BindGroup)>,
    texture_group: Option<TextureGroupState>,
    bound_textures: HashMap<u32, wgpu::BindGroup>,
    fallback_vertices: wgpu::Buffer,
    draws: Vec<PendingDraw>,
}

impl WgpuBackend {
    /// Creates the device, surface and pipeline layout for `program`.
    ///
    /// Fails when no adapter or device is available, or when the shader
    /// declares resources this backend doesn't know how to bind.
    pub async fn new(
        window: Arc<Window>,
        program: &ShaderProgram,
        bindings: &ShaderBindingMap,
        clear_color: wgpu::Color,
    ) -> Result<Self, RenderError> {
        check_resource_layout(program, bindings)?;

        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: 4096,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or_else(|| RenderError::Layout("surface reports no texture formats".to_string()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = TextureResource::create_depth_texture(&device, &config, "depth_texture");
        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as u64;

        let uniform_groups = create_uniform_groups(&device, bindings, uniform_alignment);
        let texture_group = bindings.diffuse_sampler().map(|sampler| {
            let layout = create_texture_layout(&device, &sampler);
            let placeholder = create_gpu_texture(
                &device,
                &queue,
                &layout,
                &sampler,
                &DecodedImage::new(image::RgbaImage::from_pixel(1, 1, image::Rgba([255; 4]))),
                "placeholder texture",
            );
            TextureGroupState {
                sampler,
                layout,
                placeholder,
            }
        });

        let group_count = uniform_groups
            .iter()
            .map(|g| g.group + 1)
            .chain(texture_group.iter().map(|t| t.sampler.group + 1))
            .max()
            .unwrap_or(0);
        let empty_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Empty Bind Group Layout"),
            entries: &[],
        });
        let mut empty_groups = Vec::new();
        let mut layouts: Vec<&wgpu::BindGroupLayout> = Vec::with_capacity(group_count as usize);
        for group in 0..group_count {
            if let Some(state) = uniform_groups.iter().find(|g| g.group == group) {
                layouts.push(&state.layout);
            } else if let Some(state) = texture_group.as_ref().filter(|t| t.sampler.group == group) {
                layouts.push(&state.layout);
            } else {
                layouts.push(&empty_layout);
                empty_groups.push((
                    group,
                    device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Empty Bind Group"),
                        layout: &empty_layout,
                        entries: &[],
                    }),
                ));
            }
        }

        let device: Arc<wgpu::Device> = device.into();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(program.label()),
            source: wgpu::ShaderSource::Wgsl(program.source().into()),
        });
        let pipeline_manager = PipelineManager::new(
            device.clone(),
            PipelineConfig::default()
                .with_label(program.label())
                .with_color_format(format)
                .with_depth_format(TextureResource::DEPTH_FORMAT)
                .with_cull_mode(None),
            shader,
            &layouts,
            bindings.attributes(),
        );

        let fallback_vertices = create_fallback_vertices(&device, 0);

        log::info!(
            "renderer ready: {}x{} {:?}, {} uniform groups, texturing {}",
            config.width,
            config.height,
            format,
            uniform_groups.len(),
            if texture_group.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_texture,
            clear_color,
            pipeline_manager,
            uniform_groups,
            empty_groups,
            texture_group,
            bound_textures: HashMap::new(),
            fallback_vertices,
            draws: Vec::new(),
        })
    }

    /// Resizes the surface and depth buffer; zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            TextureResource::create_depth_texture(&self.device, &self.config, "depth_texture");
    }

    /// Grows every uniform arena so it holds at least `draws` snapshots.
    fn reserve_uniform_arenas(&mut self, draws: u64) {
        for group in &mut self.uniform_groups {
            let mut grown = false;
            for block in &mut group.blocks {
                if block.capacity < draws {
                    block.capacity = draws.next_power_of_two();
                    block.buffer = create_uniform_buffer(
                        &self.device,
                        group.group,
                        block.binding,
                        block.stride * block.capacity,
                    );
                    grown = true;
                }
            }
            if grown {
                group.bind_group = create_uniform_bind_group(&self.device, group);
            }
        }
    }

    fn vertex_buffers_for(&mut self, mesh: &MeshDraw<'_, GpuBuffer>) -> Vec<wgpu::Buffer> {
        let stride = self
            .pipeline_manager
            .vertex_attributes()
            .iter()
            .map(|(attribute, _)| attribute.format().size())
            .max()
            .unwrap_or(0);
        let needed = mesh.vertex_count as u64 * stride;
        if self.fallback_vertices.size() < needed {
            self.fallback_vertices = create_fallback_vertices(&self.device, needed);
        }

        self.pipeline_manager
            .vertex_attributes()
            .iter()
            .map(|(attribute, _)| {
                mesh.attributes
                    .iter()
                    .find(|bound| bound.attribute == *attribute)
                    .map(|bound| bound.buffer.buffer.clone())
                    .unwrap_or_else(|| self.fallback_vertices.clone())
            })
            .collect()
    }

    fn encode(&self, view: &wgpu::TextureView) -> wgpu::CommandBuffer {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (group, bind_group) in &self.empty_groups {
                render_pass.set_bind_group(*group, bind_group, &[]);
            }

            let mut current_topology = None;
            for draw in &self.draws {
                if current_topology != Some(draw.topology) {
                    let Some(pipeline) = self.pipeline_manager.get_pipeline(draw.topology) else {
                        log::error!("no pipeline for {:?}, skipping '{}'", draw.topology, draw.label);
                        continue;
                    };
                    render_pass.set_pipeline(pipeline);
                    current_topology = Some(draw.topology);
                }

                for (group, offsets) in self.uniform_groups.iter().zip(&draw.uniform_offsets) {
                    render_pass.set_bind_group(group.group, &group.bind_group, offsets);
                }
                if let (Some(textures), Some(bind_group)) = (&self.texture_group, &draw.texture) {
                    render_pass.set_bind_group(textures.sampler.group, bind_group, &[]);
                }
                for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }

                match (draw.mode, &draw.index_buffer) {
                    (DrawMode::Indexed { index_count }, Some(indices)) => {
                        render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                        render_pass.draw_indexed(0..index_count, 0, 0..1);
                    }
                    (mode, _) => render_pass.draw(0..mode.element_count(), 0..1),
                }
            }
        }

        encoder.finish()
    }
}

impl RenderBackend for WgpuBackend {
    type Buffer = GpuBuffer;
    type Texture = GpuTexture;

    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> GpuBuffer {
        GpuBuffer {
            buffer: self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents,
                    usage: wgpu::BufferUsages::VERTEX,
                }),
        }
    }

    fn create_index_buffer(&mut self, label: &str, indices: &[u32]) -> GpuBuffer {
        GpuBuffer {
            buffer: self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
        }
    }

    fn upload_texture(&mut self, label: &str, image: &DecodedImage) -> GpuTexture {
        match &self.texture_group {
            Some(group) => create_gpu_texture(
                &self.device,
                &self.queue,
                &group.layout,
                &group.sampler,
                image,
                label,
            ),
            None => GpuTexture {
                _resource: TextureResource::from_decoded(&self.device, &self.queue, image, label),
                bind_group: None,
            },
        }
    }

    fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.draws.clear();
        for block in self.uniform_groups.iter_mut().flat_map(|g| g.blocks.iter_mut()) {
            block.snapshots.clear();
        }
        Ok(())
    }

    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue) {
        let Some(block) = self
            .uniform_groups
            .iter_mut()
            .filter(|g| g.group == slot.group)
            .flat_map(|g| g.blocks.iter_mut())
            .find(|b| b.binding == slot.binding)
        else {
            log::warn!("uniform slot {:?} is not part of any uniform block", slot);
            return;
        };

        let bytes = value.as_bytes();
        let len = bytes.len().min(slot.size as usize);
        let start = slot.offset as usize;
        if let Some(target) = block.staging.get_mut(start..start + len) {
            target.copy_from_slice(&bytes[..len]);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<&GpuTexture>) {
        match texture.and_then(|t| t.bind_group.clone()) {
            Some(bind_group) => {
                self.bound_textures.insert(unit, bind_group);
            }
            None => {
                self.bound_textures.remove(&unit);
            }
        }
    }

    fn draw(&mut self, mesh: MeshDraw<'_, GpuBuffer>) {
        let vertex_buffers = self.vertex_buffers_for(&mesh);
        let uniform_offsets = self
            .uniform_groups
            .iter_mut()
            .map(|group| group.blocks.iter_mut().map(UniformBlockState::snapshot).collect())
            .collect();
        let texture = self.texture_group.as_ref().map(|group| {
            self.bound_textures
                .get(&group.sampler.unit)
                .or(group.placeholder.bind_group.as_ref())
                .cloned()
        });

        self.draws.push(PendingDraw {
            label: mesh.label.to_string(),
            topology: mesh.topology,
            vertex_buffers,
            index_buffer: mesh.index_buffer.map(|b| b.buffer.clone()),
            mode: mesh.mode,
            uniform_offsets,
            texture: texture.flatten(),
        });
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err @ wgpu::SurfaceError::OutOfMemory) => return Err(err.into()),
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("reconfiguring surface, skipping frame: {err}");
                self.surface.configure(&self.device, &self.config);
                self.draws.clear();
                return Ok(());
            }
            Err(err) => {
                log::warn!("skipping frame: {err}");
                self.draws.clear();
                return Ok(());
            }
        };

        for topology in self.draws.iter().map(|d| d.topology).collect::<Vec<_>>() {
            self.pipeline_manager.prepare(topology);
        }
        self.reserve_uniform_arenas(self.draws.len() as u64);
        for block in self.uniform_groups.iter().flat_map(|g| g.blocks.iter()) {
            if !block.snapshots.is_empty() {
                self.queue.write_buffer(&block.buffer, 0, &block.snapshots);
            }
        }

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let commands = self.encode(&view);
        self.queue.submit(std::iter::once(commands));
        surface_texture.present();

        self.draws.clear();
        Ok(())
    }
}

/// Rejects shaders that bind resources other than the reflected uniform
/// blocks and the diffuse texture/sampler pair.
fn check_resource_layout(program: &ShaderProgram, bindings: &ShaderBindingMap) -> Result<(), RenderError> {
    let sampler = bindings.diffuse_sampler();
    if let Some(sampler) = sampler {
        if bindings.uniform_blocks().iter().any(|b| b.group == sampler.group) {
            return Err(RenderError::Layout(format!(
                "bind group {} mixes uniform blocks with the diffuse texture",
                sampler.group
            )));
        }
    }

    for (_, global) in program.module().global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        let is_block = bindings
            .uniform_blocks()
            .iter()
            .any(|b| b.group == binding.group && b.binding == binding.binding);
        let is_sampler = sampler.is_some_and(|s| {
            s.group == binding.group
                && (s.texture_binding == binding.binding || s.sampler_binding == binding.binding)
        });
        if !is_block && !is_sampler {
            return Err(RenderError::Layout(format!(
                "'{}' at @group({}) @binding({}) is not a supported input",
                global.name.as_deref().unwrap_or("<unnamed>"),
                binding.group,
                binding.binding
            )));
        }
    }
    Ok(())
}

fn create_uniform_groups(
    device: &wgpu::Device,
    bindings: &ShaderBindingMap,
    alignment: u64,
) -> Vec<UniformGroupState> {
    let mut by_group: Vec<(u32, Vec<UniformBlockState>)> = Vec::new();
    for block in bindings.uniform_blocks() {
        let size = block.size as u64;
        let stride = size.div_ceil(alignment) * alignment;
        let state = UniformBlockState {
            binding: block.binding,
            size,
            stride,
            staging: vec![0; size as usize],
            snapshots: Vec::new(),
            buffer: create_uniform_buffer(device, block.group, block.binding, stride),
            capacity: 1,
        };

        match by_group.iter_mut().find(|(group, _)| *group == block.group) {
            Some((_, blocks)) => blocks.push(state),
            None => by_group.push((block.group, vec![state])),
        }
    }

    by_group.sort_by_key(|(group, _)| *group);
    by_group
        .into_iter()
        .map(|(group, mut blocks)| {
            blocks.sort_by_key(|b| b.binding);
            let entries: Vec<wgpu::BindGroupLayoutEntry> = blocks
                .iter()
                .map(|block| wgpu::BindGroupLayoutEntry {
                    binding: block.binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(block.size),
                    },
                    count: None,
                })
                .collect();
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("Uniform Group {group} Layout")),
                entries: &entries,
            });
            let bind_group = uniform_bind_group(device, group, &layout, &blocks);
            UniformGroupState {
                group,
                layout,
                blocks,
                bind_group,
            }
        })
        .collect()
}

fn create_uniform_buffer(device: &wgpu::Device, group: u32, binding: u32, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("Uniform Arena {group}/{binding}")),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_uniform_bind_group(device: &wgpu::Device, group: &UniformGroupState) -> wgpu::BindGroup {
    uniform_bind_group(device, group.group, &group.layout, &group.blocks)
}

fn uniform_bind_group(
    device: &wgpu::Device,
    group: u32,
    layout: &wgpu::BindGroupLayout,
    blocks: &[UniformBlockState],
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry> = blocks
        .iter()
        .map(|block| wgpu::BindGroupEntry {
            binding: block.binding,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &block.buffer,
                offset: 0,
                size: NonZeroU64::new(block.size),
            }),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("Uniform Group {group}")),
        layout,
        entries: &entries,
    })
}

fn create_texture_layout(device: &wgpu::Device, sampler: &DiffuseSampler) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Diffuse Texture Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: sampler.texture_binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: sampler.sampler_binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

fn create_gpu_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &DiffuseSampler,
    image: &DecodedImage,
    label: &str,
) -> GpuTexture {
    let resource = TextureResource::from_decoded(device, queue, image, label);
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: sampler.texture_binding,
                resource: wgpu::BindingResource::TextureView(&resource.view),
            },
            wgpu::BindGroupEntry {
                binding: sampler.sampler_binding,
                resource: wgpu::BindingResource::Sampler(&resource.sampler),
            },
        ],
    });
    GpuTexture {
        _resource: resource,
        bind_group: Some(bind_group),
    }
}

/// Zeroed vertex data standing in for attributes a mesh doesn't provide.
fn create_fallback_vertices(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Unbound Attribute Fallback"),
        size: size.max(wgpu::COPY_BUFFER_ALIGNMENT),
        usage: wgpu::BufferUsages::VERTEX,
        mapped_at_creation: false,
    })
}
