// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! Render pipelines for the shader program and the per-frame loop body.

pub mod frame_renderer;
pub mod pipeline_manager;

// Re-export main types
pub use frame_renderer::{FrameOutcome, FrameRenderer, RendererState};
pub use pipeline_manager::{PipelineConfig, PipelineManager};
