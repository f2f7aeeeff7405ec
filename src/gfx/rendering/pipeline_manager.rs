//! Render pipeline management system for wgpu
//!
//! One shader program, one pipeline layout, and a lazily created pipeline per
//! primitive topology. Every vertex attribute the shader declares gets its
//! own vertex buffer slot, in location order.

use std::{collections::HashMap, sync::Arc};
use wgpu::*;

use crate::gfx::shader::{
    program::{FRAGMENT_ENTRY, VERTEX_ENTRY},
    Attribute,
};

/// Render state shared by every pipeline the manager creates
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: String,
    pub cull_mode: Option<Face>,
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
    pub multisample: MultisampleState,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label: "Scene Pipeline".to_string(),
            cull_mode: None,
            color_format: TextureFormat::Bgra8UnormSrgb,
            depth_format: None,
            multisample: MultisampleState::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_cull_mode(mut self, face: Option<Face>) -> Self {
        self.cull_mode = face;
        self
    }

    pub fn with_color_format(mut self, format: TextureFormat) -> Self {
        self.color_format = format;
        self
    }

    pub fn with_depth_format(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }
}

/// Manages render pipelines with caching and lazy creation
pub struct PipelineManager {
    device: Arc<Device>,
    config: PipelineConfig,
    shader: ShaderModule,
    layout: PipelineLayout,
    vertex_attributes: Vec<(Attribute, u32)>,
    pipelines: HashMap<PrimitiveTopology, RenderPipeline>,
}

impl PipelineManager {
    /// Creates a pipeline manager for one shader program
    ///
    /// # Arguments
    /// * `device` - Shared wgpu device for creating resources
    /// * `shader` - Compiled shader module with vertex and fragment entry points
    /// * `bind_group_layouts` - Layouts indexed by bind group number
    /// * `vertex_attributes` - Attributes and locations, one buffer slot each
    pub fn new(
        device: Arc<Device>,
        config: PipelineConfig,
        shader: ShaderModule,
        bind_group_layouts: &[&BindGroupLayout],
        vertex_attributes: Vec<(Attribute, u32)>,
    ) -> Self {
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(&format!("{} Layout", config.label)),
            bind_group_layouts,
            push_constant_ranges: &[],
        });

        Self {
            device,
            config,
            shader,
            layout,
            vertex_attributes,
            pipelines: HashMap::new(),
        }
    }

    /// Attributes in vertex buffer slot order.
    pub fn vertex_attributes(&self) -> &[(Attribute, u32)] {
        &self.vertex_attributes
    }

    /// Creates the pipeline for `topology` unless it already exists.
    pub fn prepare(&mut self, topology: PrimitiveTopology) {
        if !self.pipelines.contains_key(&topology) {
            let pipeline = self.create_pipeline(topology);
            log::debug!("created pipeline '{}' for {:?}", self.config.label, topology);
            self.pipelines.insert(topology, pipeline);
        }
    }

    /// Gets a pipeline previously created with [`prepare`](Self::prepare).
    pub fn get_pipeline(&self, topology: PrimitiveTopology) -> Option<&RenderPipeline> {
        self.pipelines.get(&topology)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn create_pipeline(&self, topology: PrimitiveTopology) -> RenderPipeline {
        let attributes: Vec<[VertexAttribute; 1]> = self
            .vertex_attributes
            .iter()
            .map(|(attribute, location)| {
                [VertexAttribute {
                    format: attribute.format(),
                    offset: 0,
                    shader_location: *location,
                }]
            })
            .collect();
        let vertex_buffers: Vec<VertexBufferLayout> = self
            .vertex_attributes
            .iter()
            .zip(&attributes)
            .map(|((attribute, _), attributes)| VertexBufferLayout {
                array_stride: attribute.format().size(),
                step_mode: VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let depth_stencil = self.config.depth_format.map(|format| DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        });

        let targets = [Some(ColorTargetState {
            format: self.config.color_format,
            blend: Some(BlendState::ALPHA_BLENDING),
            write_mask: ColorWrites::ALL,
        })];

        self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&self.config.label),
            layout: Some(&self.layout),
            vertex: VertexState {
                module: &self.shader,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &vertex_buffers,
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &self.shader,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &targets,
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState {
                topology,
                strip_index_format: topology.is_strip().then_some(IndexFormat::Uint32),
                front_face: FrontFace::Ccw,
                cull_mode: self.config.cull_mode,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: self.config.multisample,
            multiview: None,
            cache: None,
        })
    }
}
