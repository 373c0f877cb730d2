//! Layered file storage capability.
//!
//! One [`Storage`] value represents one layer root. Paths handed to it are
//! relative to that root, so the module and local layers mirror each other
//! path-for-path.

mod fs;

pub use fs::FsStorage;

use std::path::Path;

use crate::error::Result;

/// One child of a folder node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    /// File stem (folder name for folders)
    pub name: String,
    /// Extension without the dot, `None` for folders and bare files
    pub ext: Option<String>,
    pub is_folder: bool,
}

impl Child {
    pub fn has_ext(&self, ext: &str) -> bool {
        !self.is_folder && self.ext.as_deref() == Some(ext)
    }
}

pub trait Storage: Send + Sync {
    /// Absolute location of the layer, for log context
    fn root(&self) -> &Path;

    fn exists(&self, path: &Path) -> bool;

    fn is_folder(&self, path: &Path) -> bool;

    /// Children of `folder`; a missing folder has none.
    fn children(&self, folder: &Path) -> Result<Vec<Child>>;

    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create `folder` and every missing parent.
    fn create_folder(&self, folder: &Path) -> Result<()>;

    /// Replace the file at `path` while holding an exclusive lock on it.
    ///
    /// The lock is released on every exit path.
    fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Remove a file or a folder tree. Missing targets are not an error.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Named attribute stored on a folder node
    fn attribute(&self, folder: &Path, key: &str) -> Option<String>;

    /// Set (`Some`) or clear (`None`) a folder-node attribute.
    fn set_attribute(&self, folder: &Path, key: &str, value: Option<&str>) -> Result<()>;

    /// Order intrinsic to this layer for the `ext` children of `folder`.
    ///
    /// `None` when the folder does not exist here.
    fn natural_order(&self, folder: &Path, ext: &str) -> Option<Vec<String>>;

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// `<name>.<ext>` below `folder`
pub fn entry_path(folder: &Path, name: &str, ext: &str) -> std::path::PathBuf {
    folder.join(format!("{name}.{ext}"))
}
