//! Texture path resolution
//!
//! Material files carry texture references written on whatever machine
//! exported them: back-slashes, absolute paths from a build box, paths
//! relative to the model. [`PathResolver`] turns such a reference into a
//! file that can actually be opened, trying:
//!
//! 1. relative references joined onto the scene's directory,
//! 2. absolute references as given,
//! 3. absolute references that don't exist, re-homed next to the scene by
//!    file name.

use std::path::{Component, Path, PathBuf};

use crate::gfx::error::TextureError;

/// Outcome of resolving a texture reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The reference was empty; the material has no texture.
    NoTexture,
    /// An openable file.
    Resolved(PathBuf),
}

/// Resolves texture references against a scene's directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    search_root: PathBuf,
}

impl PathResolver {
    pub fn new(search_root: impl Into<PathBuf>) -> Self {
        Self {
            search_root: search_root.into(),
        }
    }

    /// Candidate paths for `reference`, in the order they are tried.
    pub fn candidates(&self, reference: &str) -> Vec<PathBuf> {
        let normalized = normalize_separators(reference);
        if normalized.is_empty() {
            return Vec::new();
        }

        let as_given = Path::new(&normalized);
        if !is_absolute_reference(&normalized) {
            return vec![lexically_normalize(&self.search_root.join(as_given))];
        }

        let mut candidates = vec![lexically_normalize(as_given)];
        if let Some(file_name) = as_given.file_name() {
            candidates.push(lexically_normalize(&self.search_root.join(file_name)));
        }
        candidates
    }

    /// Resolves `reference` to the first candidate that can be opened.
    pub fn resolve(&self, reference: &str) -> Result<Resolution, TextureError> {
        let candidates = self.candidates(reference);
        if candidates.is_empty() {
            return Ok(Resolution::NoTexture);
        }

        match candidates.iter().find(|path| is_openable(path)) {
            Some(path) => Ok(Resolution::Resolved(path.clone())),
            None => Err(TextureError::Unresolved {
                reference: reference.to_string(),
                tried: candidates,
            }),
        }
    }
}

fn normalize_separators(reference: &str) -> String {
    reference.trim().replace('\\', "/")
}

/// Host-absolute paths, plus drive-letter paths (`C:/...`) which are
/// absolute on the machine that wrote them even when this host is Unix.
fn is_absolute_reference(reference: &str) -> bool {
    if Path::new(reference).is_absolute() || reference.starts_with('/') {
        return true;
    }
    let bytes = reference.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

fn is_openable(path: &Path) -> bool {
    path.is_file() && std::fs::File::open(path).is_ok()
}

/// Removes `.` components and folds `..` without touching the filesystem.
pub fn lexically_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let ends_in_name = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if ends_in_name {
                    normalized.pop();
                } else {
                    normalized.push(component.as_os_str());
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
