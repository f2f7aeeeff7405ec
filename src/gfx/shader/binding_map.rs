//! Shader binding map
//!
//! Reflects a validated [`ShaderProgram`] once and records where each named
//! vertex attribute and uniform lives. The frame renderer and mesh builder
//! only ever look inputs up through this table.
//!
//! Uniforms are found by name, either as members of a `var<uniform>` struct
//! or as a plain `var<uniform>` global. Attributes are the `@location`
//! inputs of the vertex entry point, found by argument or struct member name.

use std::collections::HashMap;

use naga::{AddressSpace, Binding, TypeInner};

use super::program::{ShaderProgram, VERTEX_ENTRY};
use crate::gfx::error::BindingError;

/// Texture unit the diffuse texture is always bound to.
pub const DIFFUSE_TEXTURE_UNIT: u32 = 0;

/// Symbolic vertex attributes the pipeline knows how to feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Position,
    Normal,
    TexCoord,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Attribute::Position, Attribute::Normal, Attribute::TexCoord];

    pub fn name(self) -> &'static str {
        match self {
            Attribute::Position => "position",
            Attribute::Normal => "normal",
            Attribute::TexCoord => "tex_coord",
        }
    }

    pub fn format(self) -> wgpu::VertexFormat {
        match self {
            Attribute::Position | Attribute::Normal => wgpu::VertexFormat::Float32x3,
            Attribute::TexCoord => wgpu::VertexFormat::Float32x2,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }
}

/// Symbolic uniforms uploaded by the frame renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uniform {
    Model,
    View,
    Projection,
    MaterialAmbient,
    MaterialDiffuse,
    MaterialSpecular,
    DiffuseSamplerEnabled,
    LightDirection,
    LightAmbient,
    LightDiffuse,
}

impl Uniform {
    /// Uniforms every frame uploads; a shader lacking one is unusable.
    pub const REQUIRED: [Uniform; 9] = [
        Uniform::Model,
        Uniform::View,
        Uniform::Projection,
        Uniform::MaterialAmbient,
        Uniform::MaterialDiffuse,
        Uniform::MaterialSpecular,
        Uniform::LightDirection,
        Uniform::LightAmbient,
        Uniform::LightDiffuse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Uniform::Model => "model",
            Uniform::View => "view",
            Uniform::Projection => "projection",
            Uniform::MaterialAmbient => "material_ambient",
            Uniform::MaterialDiffuse => "material_diffuse",
            Uniform::MaterialSpecular => "material_specular",
            Uniform::DiffuseSamplerEnabled => "diffuse_sampler_enabled",
            Uniform::LightDirection => "light_direction",
            Uniform::LightAmbient => "light_ambient",
            Uniform::LightDiffuse => "light_diffuse",
        }
    }

    /// Bytes the renderer writes for this uniform.
    pub fn upload_size(self) -> u32 {
        match self {
            Uniform::Model | Uniform::View | Uniform::Projection => 64,
            Uniform::DiffuseSamplerEnabled => 4,
            _ => 16,
        }
    }
}

/// Location of one uniform inside a uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformSlot {
    pub group: u32,
    pub binding: u32,
    pub offset: u32,
    pub size: u32,
}

/// A `var<uniform>` block declared by the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    pub size: u32,
}

/// Diffuse texture + sampler pair and the flag telling the shader to use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffuseSampler {
    pub enabled: UniformSlot,
    pub group: u32,
    pub texture_binding: u32,
    pub sampler_binding: u32,
    pub unit: u32,
}

/// Resolved attribute and uniform locations of one shader program.
#[derive(Debug, Clone)]
pub struct ShaderBindingMap {
    attributes: HashMap<Attribute, u32>,
    uniforms: HashMap<Uniform, UniformSlot>,
    blocks: Vec<UniformBlock>,
    diffuse_sampler: Option<DiffuseSampler>,
}

impl ShaderBindingMap {
    /// Reflects `program` and checks every per-frame input is present.
    pub fn resolve(program: &ShaderProgram) -> Result<Self, BindingError> {
        let module = program.module();
        let attributes = reflect_attributes(module);
        let (members, blocks, handles) = reflect_globals(module);

        let mut uniforms = HashMap::new();
        for uniform in Uniform::REQUIRED {
            let slot = *members
                .get(uniform.name())
                .ok_or(BindingError::MissingUniform(uniform.name()))?;
            check_size(uniform, slot)?;
            uniforms.insert(uniform, slot);
        }

        let diffuse_sampler = match (
            members.get(Uniform::DiffuseSamplerEnabled.name()),
            handles.get("diffuse_texture"),
            handles.get("diffuse_sampler"),
        ) {
            (Some(&enabled), Some(&(group, texture_binding)), Some(&(sampler_group, sampler_binding))) => {
                if group != sampler_group {
                    return Err(BindingError::SplitSampler);
                }
                check_size(Uniform::DiffuseSamplerEnabled, enabled)?;
                uniforms.insert(Uniform::DiffuseSamplerEnabled, enabled);
                Some(DiffuseSampler {
                    enabled,
                    group,
                    texture_binding,
                    sampler_binding,
                    unit: DIFFUSE_TEXTURE_UNIT,
                })
            }
            (None, None, None) => None,
            _ => {
                log::warn!(
                    "shader '{}' declares only part of the diffuse sampler inputs; textures disabled",
                    program.label()
                );
                None
            }
        };

        let map = Self {
            attributes,
            uniforms,
            blocks,
            diffuse_sampler,
        };
        map.attribute_location(Attribute::Position)?;

        log::debug!(
            "resolved shader '{}': {} attributes, {} uniforms, {} blocks, sampler: {}",
            program.label(),
            map.attributes.len(),
            map.uniforms.len(),
            map.blocks.len(),
            map.diffuse_sampler.is_some()
        );

        Ok(map)
    }

    /// Location of `attribute`, or an error when a mesh needs it and the
    /// shader does not declare it.
    pub fn attribute_location(&self, attribute: Attribute) -> Result<u32, BindingError> {
        self.attributes
            .get(&attribute)
            .copied()
            .ok_or(BindingError::MissingAttribute(attribute.name()))
    }

    /// Attributes the shader declares, ordered by location.
    pub fn attributes(&self) -> Vec<(Attribute, u32)> {
        let mut attributes: Vec<_> = self.attributes.iter().map(|(a, l)| (*a, *l)).collect();
        attributes.sort_by_key(|(_, location)| *location);
        attributes
    }

    /// Slot of a required uniform, or of the sampler flag when present.
    pub fn uniform(&self, uniform: Uniform) -> Option<UniformSlot> {
        self.uniforms.get(&uniform).copied()
    }

    pub fn uniform_blocks(&self) -> &[UniformBlock] {
        &self.blocks
    }

    pub fn diffuse_sampler(&self) -> Option<DiffuseSampler> {
        self.diffuse_sampler
    }
}

fn check_size(uniform: Uniform, slot: UniformSlot) -> Result<(), BindingError> {
    if slot.size < uniform.upload_size() {
        return Err(BindingError::UniformSize {
            name: uniform.name(),
            expected: uniform.upload_size(),
            actual: slot.size,
        });
    }
    Ok(())
}

fn reflect_attributes(module: &naga::Module) -> HashMap<Attribute, u32> {
    let mut attributes = HashMap::new();
    let Some(entry) = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Vertex && ep.name == VERTEX_ENTRY)
    else {
        return attributes;
    };

    let mut record = |name: Option<&String>, binding: Option<&Binding>| {
        if let (Some(name), Some(Binding::Location { location, .. })) = (name, binding) {
            if let Some(attribute) = Attribute::from_name(name) {
                attributes.insert(attribute, *location);
            }
        }
    };

    for argument in &entry.function.arguments {
        match &module.types[argument.ty].inner {
            TypeInner::Struct { members, .. } if argument.binding.is_none() => {
                for member in members {
                    record(member.name.as_ref(), member.binding.as_ref());
                }
            }
            _ => record(argument.name.as_ref(), argument.binding.as_ref()),
        }
    }

    attributes
}

type Globals = (
    HashMap<String, UniformSlot>,
    Vec<UniformBlock>,
    HashMap<String, (u32, u32)>,
);

fn reflect_globals(module: &naga::Module) -> Globals {
    let mut members = HashMap::new();
    let mut blocks = Vec::new();
    let mut handles = HashMap::new();
    let ctx = module.to_ctx();

    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };

        match global.space {
            AddressSpace::Uniform => {
                let inner = &module.types[global.ty].inner;
                let size = inner.size(ctx);
                blocks.push(UniformBlock {
                    group: binding.group,
                    binding: binding.binding,
                    size,
                });

                if let TypeInner::Struct { members: fields, .. } = inner {
                    for field in fields {
                        if let Some(name) = &field.name {
                            members.insert(
                                name.clone(),
                                UniformSlot {
                                    group: binding.group,
                                    binding: binding.binding,
                                    offset: field.offset,
                                    size: module.types[field.ty].inner.size(ctx),
                                },
                            );
                        }
                    }
                } else if let Some(name) = &global.name {
                    members.insert(
                        name.clone(),
                        UniformSlot {
                            group: binding.group,
                            binding: binding.binding,
                            offset: 0,
                            size,
                        },
                    );
                }
            }
            AddressSpace::Handle => {
                if let Some(name) = &global.name {
                    handles.insert(name.clone(), (binding.group, binding.binding));
                }
            }
            _ => {}
        }
    }

    blocks.sort_by_key(|block| (block.group, block.binding));
    (members, blocks, handles)
}
