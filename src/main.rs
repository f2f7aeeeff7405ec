use std::path::PathBuf;

use anyhow::{bail, Context};
use bannock::{
    gfx::{
        scene::load_obj,
        shader::{ShaderBindingMap, ShaderProgram},
    },
    ViewerApp, ViewerConfig,
};

const USAGE: &str = "usage: bannock <scene.obj> [shader.wgsl]";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let mut args = std::env::args_os().skip(1);
    let Some(scene_path) = args.next().map(PathBuf::from) else {
        bail!(USAGE);
    };
    let shader_path = args.next().map(PathBuf::from);
    if args.next().is_some() {
        bail!(USAGE);
    }

    let imported = load_obj(&scene_path)
        .with_context(|| format!("failed to load scene {}", scene_path.display()))?;

    let program = match &shader_path {
        Some(path) => ShaderProgram::load(path)
            .with_context(|| format!("failed to load shader {}", path.display()))?,
        None => ShaderProgram::builtin().context("built-in shader is invalid")?,
    };
    let bindings = ShaderBindingMap::resolve(&program)
        .with_context(|| format!("shader '{}' is missing required inputs", program.label()))?;

    let config = ViewerConfig::default().with_title(format!("bannock - {}", scene_path.display()));
    ViewerApp::new(config, program, bindings, imported)
        .with_context(|| format!("nothing to render in {}", scene_path.display()))?
        .run()
}
