//! Shader program loading and validation
//!
//! A [`ShaderProgram`] is WGSL source that naga has parsed and validated.
//! Parse errors are reported as compile failures, validation errors as link
//! failures. Either one stops the viewer before a window is opened.

use std::path::Path;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::gfx::error::ShaderError;

/// Vertex stage entry point every program must provide.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Fragment stage entry point every program must provide.
pub const FRAGMENT_ENTRY: &str = "fs_main";

const BUILTIN_SOURCE: &str = include_str!("gouraud.wgsl");

/// A validated WGSL shader program.
#[derive(Debug)]
pub struct ShaderProgram {
    label: String,
    source: String,
    module: naga::Module,
}

impl ShaderProgram {
    /// Parses and validates WGSL source.
    pub fn from_wgsl(label: &str, source: &str) -> Result<Self, ShaderError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compile {
            label: label.to_string(),
            message: e.emit_to_string(source),
        })?;

        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|e| ShaderError::Link {
                label: label.to_string(),
                message: e.emit_to_string(source),
            })?;

        for (stage, stage_name, entry_point) in [
            (naga::ShaderStage::Vertex, "vertex", VERTEX_ENTRY),
            (naga::ShaderStage::Fragment, "fragment", FRAGMENT_ENTRY),
        ] {
            let found = module
                .entry_points
                .iter()
                .any(|ep| ep.stage == stage && ep.name == entry_point);
            if !found {
                return Err(ShaderError::MissingEntryPoint {
                    label: label.to_string(),
                    stage: stage_name,
                    entry_point,
                });
            }
        }

        Ok(Self {
            label: label.to_string(),
            source: source.to_string(),
            module,
        })
    }

    /// Reads WGSL from disk and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_wgsl(&path.display().to_string(), &source)
    }

    /// The Gouraud shader shipped with the crate.
    pub fn builtin() -> Result<Self, ShaderError> {
        Self::from_wgsl("gouraud.wgsl", BUILTIN_SOURCE)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn module(&self) -> &naga::Module {
        &self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_shader_validates() {
        let program = ShaderProgram::builtin().expect("gouraud.wgsl failed to validate");
        assert_eq!(program.label(), "gouraud.wgsl");
    }

    #[test]
    fn syntax_error_is_a_compile_failure() {
        let err = ShaderProgram::from_wgsl("broken", "fn vs_main( {").unwrap_err();
        assert!(matches!(err, ShaderError::Compile { .. }));
    }

    #[test]
    fn missing_fragment_stage_is_rejected() {
        let source = r#"
            @vertex
            fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(position, 1.0);
            }
        "#;
        let err = ShaderProgram::from_wgsl("vertex_only", source).unwrap_err();
        assert_eq!(
            err.to_string(),
            "shader 'vertex_only' has no fragment entry point 'fs_main'"
        );
        assert!(matches!(
            err,
            ShaderError::MissingEntryPoint {
                stage: "fragment",
                entry_point: "fs_main",
                ..
            }
        ));
    }
}
