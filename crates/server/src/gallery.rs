use std::path::{Component, Path, PathBuf};

use faceswap_core::shared::constants::IMAGE_EXTENSIONS;

/// Directory of stored target images addressed by name.
#[derive(Clone, Debug)]
pub struct ReferenceGallery {
    dir: PathBuf,
}

impl ReferenceGallery {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the gallery image called `name`, if it exists.
    ///
    /// `name` must be a single normal path component. An exact file name is
    /// tried first; otherwise `name` is treated as a stem (dots allowed) and
    /// matched against known image extensions.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if !is_single_component(name) {
            log::debug!("Rejected gallery name {name:?}");
            return None;
        }
        let exact = self.dir.join(name);
        if exact.is_file() {
            return Some(exact);
        }
        IMAGE_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{name}.{ext}")))
            .find(|candidate| candidate.is_file())
    }
}

fn is_single_component(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
