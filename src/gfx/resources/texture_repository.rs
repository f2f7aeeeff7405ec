//! Texture cache keyed by resolved path
//!
//! Each distinct path is decoded and uploaded at most once for the lifetime
//! of the repository; later requests hand out the same shared handle.
//! The repository is an explicit service object: callers own it and pass it
//! to every material build, so it can outlive a single scene.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use super::{
    image_decoder::{FileImageDecoder, ImageDecoder},
    path_resolver::lexically_normalize,
};
use crate::gfx::backend::RenderBackend;

pub struct TextureRepository<T> {
    decoder: Box<dyn ImageDecoder>,
    entries: HashMap<PathBuf, Arc<T>>,
    // Paths that failed to decode; retrying would only repeat the warning.
    failed: HashSet<PathBuf>,
}

impl<T> Default for TextureRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TextureRepository<T> {
    pub fn new() -> Self {
        Self::with_decoder(FileImageDecoder)
    }

    pub fn with_decoder(decoder: impl ImageDecoder + 'static) -> Self {
        Self {
            decoder: Box::new(decoder),
            entries: HashMap::new(),
            failed: HashSet::new(),
        }
    }

    /// Returns the texture for `path`, decoding and uploading it on first use.
    ///
    /// An empty path means "no texture" and returns `None` without touching
    /// the decoder. Decode failures are logged and also return `None`.
    pub fn get_or_create<B>(&mut self, backend: &mut B, path: &Path) -> Option<Arc<T>>
    where
        B: RenderBackend<Texture = T>,
    {
        if path.as_os_str().is_empty() {
            return None;
        }

        let key = lexically_normalize(path);
        if let Some(texture) = self.entries.get(&key) {
            log::debug!("texture cache hit: {}", key.display());
            return Some(Arc::clone(texture));
        }
        if self.failed.contains(&key) {
            return None;
        }

        let image = match self.decoder.decode(&key) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("{err}; continuing without texture");
                self.failed.insert(key);
                return None;
            }
        };

        let label = key.display().to_string();
        let max_dimension = backend.max_texture_dimension();
        if image.width() > max_dimension || image.height() > max_dimension {
            log::warn!(
                "texture {} is {}x{}, downscaling to fit {}",
                label,
                image.width(),
                image.height(),
                max_dimension
            );
        }
        let image = image.fit_within(max_dimension);
        let texture = Arc::new(backend.upload_texture(&label, &image));
        log::info!(
            "loaded texture {} ({}x{}, {} mip levels)",
            label,
            image.width(),
            image.height(),
            image.mip_level_count()
        );

        self.entries.insert(key, Arc::clone(&texture));
        Some(texture)
    }

    /// Cached texture for `path`, without loading it.
    pub fn get(&self, path: &Path) -> Option<Arc<T>> {
        self.entries.get(&lexically_normalize(path)).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(&lexically_normalize(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
