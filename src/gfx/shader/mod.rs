//! Shader programs and their reflected binding locations

pub mod binding_map;
pub mod program;

pub use binding_map::{
    Attribute, DiffuseSampler, ShaderBindingMap, Uniform, UniformBlock, UniformSlot,
    DIFFUSE_TEXTURE_UNIT,
};
pub use program::ShaderProgram;
