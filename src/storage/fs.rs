use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Child, Storage};
use crate::constants::attrs::{ATTRIBUTES_FILE, POSITION};
use crate::error::{PersistenceError, Result};

const TEMP_SUFFIX: &str = "tmp~";

/// Attributes of one folder node and of its children
#[derive(Debug, Default, Serialize, Deserialize)]
struct FolderAttributes {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    folder: BTreeMap<String, String>,

    /// Keyed by child file name (`a.wstcref`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<String, BTreeMap<String, String>>,
}

/// Directory-backed layer.
///
/// Folder attributes live in a JSON side file inside each folder. Writes go to
/// a temp file that is renamed over the target.
pub struct FsStorage {
    root: PathBuf,
    read_only: bool,
    /// Files currently locked for writing
    locks: Mutex<HashSet<PathBuf>>,
}

/// Exclusive write lock on one file, released on drop
struct FileLock<'a> {
    storage: &'a FsStorage,
    path: PathBuf,
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        self.storage.locks.lock().remove(&self.path);
    }
}

impl FsStorage {
    /// Writable layer rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
            locks: Mutex::new(HashSet::new()),
        }
    }

    /// Layer that refuses every mutation
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            read_only: true,
            ..Self::new(root)
        }
    }

    /// Create the layer root itself.
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|source| PersistenceError::StorageUnavailable {
            path: self.root.clone(),
            source,
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        if self.read_only {
            return Err(PersistenceError::io(
                "modify read-only layer at",
                self.resolve(path),
                io::Error::new(io::ErrorKind::PermissionDenied, "layer is read-only"),
            ));
        }
        Ok(())
    }

    fn lock(&self, path: &Path) -> Result<FileLock<'_>> {
        let full = self.resolve(path);
        let mut locks = self.locks.lock();
        if !locks.insert(full.clone()) {
            return Err(PersistenceError::io(
                "lock",
                full,
                io::Error::new(io::ErrorKind::WouldBlock, "file is already locked"),
            ));
        }
        Ok(FileLock {
            storage: self,
            path: full,
        })
    }

    fn load_attributes(&self, folder: &Path) -> FolderAttributes {
        let path = self.resolve(folder).join(ATTRIBUTES_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return FolderAttributes::default(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring malformed folder attributes");
            FolderAttributes::default()
        })
    }

    fn store_attributes(&self, folder: &Path, attributes: &FolderAttributes) -> Result<()> {
        let path = folder.join(ATTRIBUTES_FILE);
        let json = serde_json::to_vec_pretty(attributes)
            .map_err(|e| PersistenceError::io("encode attributes for", self.resolve(&path), e.into()))?;
        self.write(&path, &json)
    }

    /// Set a per-child attribute, used for the `position` hint of module files.
    pub fn set_child_attribute(&self, folder: &Path, child: &str, key: &str, value: &str) -> Result<()> {
        self.check_writable(folder)?;
        let mut attributes = self.load_attributes(folder);
        attributes
            .children
            .entry(child.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.store_attributes(folder, &attributes)
    }

    fn atomic_write(&self, full: &Path, data: &[u8]) -> io::Result<()> {
        let mut temp = full.as_os_str().to_owned();
        temp.push(".");
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        let result = (|| {
            let mut file = File::create(&temp)?;
            file.write_all(data)?;
            file.sync_all()?;
            fs::rename(&temp, full)
        })();
        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }
        result
    }
}

impl Storage for FsStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn is_folder(&self, path: &Path) -> bool {
        self.resolve(path).is_dir()
    }

    fn children(&self, folder: &Path) -> Result<Vec<Child>> {
        let full = self.resolve(folder);
        let entries = match fs::read_dir(&full) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io("list", full, e)),
        };

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PersistenceError::io("list", &full, e))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with('.') || file_name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            let is_folder = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let (name, ext) = match file_name.rsplit_once('.') {
                Some((stem, ext)) if !is_folder && !stem.is_empty() => {
                    (stem.to_string(), Some(ext.to_string()))
                }
                _ => (file_name, None),
            };
            children.push(Child { name, ext, is_folder });
        }
        children.sort_by(|a, b| a.name.cmp(&b.name).then(a.ext.cmp(&b.ext)));
        Ok(children)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        fs::read(&full).map_err(|e| PersistenceError::io("read", full, e))
    }

    fn create_folder(&self, folder: &Path) -> Result<()> {
        self.check_writable(folder)?;
        let full = self.resolve(folder);
        fs::create_dir_all(&full).map_err(|e| PersistenceError::io("create folder", full, e))
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.check_writable(path)?;
        if let Some(parent) = path.parent() {
            self.create_folder(parent)?;
        }
        let _lock = self.lock(path)?;
        let full = self.resolve(path);
        self.atomic_write(&full, data)
            .map_err(|e| PersistenceError::io("write", full, e))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.check_writable(path)?;
        let full = self.resolve(path);
        let result = if full.is_dir() {
            fs::remove_dir_all(&full)
        } else {
            fs::remove_file(&full)
        };
        match result {
            Ok(()) => {
                debug!(path = %full.display(), "Deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::io("delete", full, e)),
        }
    }

    fn attribute(&self, folder: &Path, key: &str) -> Option<String> {
        self.load_attributes(folder).folder.get(key).cloned()
    }

    fn set_attribute(&self, folder: &Path, key: &str, value: Option<&str>) -> Result<()> {
        self.check_writable(folder)?;
        let mut attributes = self.load_attributes(folder);
        let changed = match value {
            Some(value) => attributes.folder.insert(key.to_string(), value.to_string()).as_deref() != Some(value),
            None => attributes.folder.remove(key).is_some(),
        };
        if !changed {
            return Ok(());
        }
        self.create_folder(folder)?;
        self.store_attributes(folder, &attributes)
    }

    fn natural_order(&self, folder: &Path, ext: &str) -> Option<Vec<String>> {
        if !self.is_folder(folder) {
            return None;
        }
        let children = self.children(folder).ok()?;
        let attributes = self.load_attributes(folder);

        let mut ordered: Vec<(Option<i64>, String)> = children
            .into_iter()
            .filter(|c| c.has_ext(ext))
            .map(|c| {
                let position = attributes
                    .children
                    .get(&format!("{}.{ext}", c.name))
                    .and_then(|attrs| attrs.get(POSITION))
                    .and_then(|p| p.trim().parse::<i64>().ok());
                (position, c.name)
            })
            .collect();

        // Positioned children first by position, then the rest by name
        ordered.sort_by(|(pa, na), (pb, nb)| match (pa, pb) {
            (Some(a), Some(b)) => a.cmp(b).then_with(|| na.cmp(nb)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => na.cmp(nb),
        });
        Some(ordered.into_iter().map(|(_, name)| name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_read_delete() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let path = Path::new("Modes/editor.wsmode");

        storage.write(path, b"<mode/>").unwrap();
        assert!(storage.exists(path));
        assert_eq!(storage.read_to_string(path).unwrap(), "<mode/>");

        storage.delete(path).unwrap();
        assert!(!storage.exists(path));
        // deleting twice is fine
        storage.delete(path).unwrap();
    }

    #[test]
    fn test_lock_released_after_write() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let path = Path::new("a.wstcref");

        storage.write(path, b"one").unwrap();
        storage.write(path, b"two").unwrap();
        assert!(storage.locks.lock().is_empty());
        assert_eq!(storage.read(path).unwrap(), b"two");
    }

    #[test]
    fn test_locked_file_rejects_second_writer() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let path = Path::new("a.wstcref");

        let guard = storage.lock(path).unwrap();
        assert!(storage.write(path, b"x").is_err());
        drop(guard);
        storage.write(path, b"x").unwrap();
    }

    #[test]
    fn test_read_only_layer() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::read_only(dir.path());
        assert!(storage.write(Path::new("a.wsmode"), b"x").is_err());
        assert!(storage.create_folder(Path::new("Modes")).is_err());
    }

    #[test]
    fn test_children_skip_hidden_and_split_ext() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let folder = Path::new("Modes");
        storage.write(&folder.join("editor.wsmode"), b"").unwrap();
        storage.create_folder(&folder.join("editor")).unwrap();
        storage.set_attribute(folder, "k", Some("v")).unwrap();

        let children = storage.children(folder).unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().any(|c| c.is_folder && c.name == "editor"));
        assert!(children.iter().any(|c| c.has_ext("wsmode")));
        assert!(storage.children(Path::new("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_attributes() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let folder = Path::new("Modes/explorer");

        assert_eq!(storage.attribute(folder, "order"), None);
        storage.set_attribute(folder, "order", Some("c/a/b")).unwrap();
        assert_eq!(storage.attribute(folder, "order").as_deref(), Some("c/a/b"));
        storage.set_attribute(folder, "order", None).unwrap();
        assert_eq!(storage.attribute(folder, "order"), None);
    }

    #[test]
    fn test_natural_order_uses_positions() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let folder = Path::new("Modes/explorer");
        for name in ["a", "b", "c", "d"] {
            storage.write(&folder.join(format!("{name}.wstcref")), b"").unwrap();
        }
        storage.set_child_attribute(folder, "c.wstcref", POSITION, "100").unwrap();
        storage.set_child_attribute(folder, "a.wstcref", POSITION, "200").unwrap();

        assert_eq!(
            storage.natural_order(folder, "wstcref").unwrap(),
            vec!["c", "a", "b", "d"]
        );
        assert_eq!(storage.natural_order(Path::new("Modes/none"), "wstcref"), None);
    }
}
