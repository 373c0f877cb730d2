//! Persistence manager façade.
//!
//! One value per window system, built once at startup and shared by
//! reference. Every load and save runs under the parser lock, so only one
//! transaction touches the layout at a time. Identity lookups go straight to
//! the registry and never wait on that lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::component::{Component, ComponentFactory};
use crate::constants::{ext, folders};
use crate::error::{PersistenceError, Result};
use crate::identity::{IdentityRegistry, component_path};
use crate::model::{GroupConfig, ModeConfig, TcGroupConfig, TcRefConfig, WindowManagerConfig};
use crate::modules::ExtensionRegistry;
use crate::parser::{Context, ModeAttributes, ModeParser, WindowManagerParser, decode_document, encode_document};
use crate::storage::{FsStorage, Storage};

pub struct PersistenceManager {
    module: Arc<FsStorage>,
    local: Arc<FsStorage>,
    extensions: Arc<dyn ExtensionRegistry>,
    identities: IdentityRegistry,
    parser: Mutex<WindowManagerParser>,
}

impl PersistenceManager {
    /// Manager over a read-only module layer and a writable local layer.
    pub fn new(
        module_root: impl Into<PathBuf>,
        local_root: impl Into<PathBuf>,
        window_manager: impl Into<String>,
        extensions: Arc<dyn ExtensionRegistry>,
        factory: Arc<dyn ComponentFactory>,
    ) -> Self {
        let module = Arc::new(FsStorage::read_only(module_root));
        let local = Arc::new(FsStorage::new(local_root));
        let identities = IdentityRegistry::new(local.clone(), module.clone(), factory);
        Self {
            module,
            local,
            extensions,
            identities,
            parser: Mutex::new(WindowManagerParser::new(window_manager)),
        }
    }

    fn ctx(&self) -> Context<'_> {
        Context {
            module: self.module.as_ref(),
            local: self.local.as_ref(),
            extensions: self.extensions.as_ref(),
            identities: &self.identities,
        }
    }

    pub fn module_root(&self) -> &Path {
        self.module.root()
    }

    pub fn local_root(&self) -> &Path {
        self.local.root()
    }

    pub fn identities(&self) -> &IdentityRegistry {
        &self.identities
    }

    /// Load the full layout from both layers.
    ///
    /// Only an unusable local root is an error; every entity-level failure
    /// drops that entity and is logged.
    pub fn load_window_system(&self) -> Result<WindowManagerConfig> {
        let mut parser = self.parser.lock();
        self.local.ensure_root()?;
        info!(
            module = %self.module.root().display(),
            local = %self.local.root().display(),
            "Loading window system"
        );

        self.identities.reset_used();
        let config = parser.load(&self.ctx())?;
        self.delete_orphaned_components();
        Ok(config)
    }

    /// Remove stored components that neither the layout nor a live instance
    /// refers to.
    fn delete_orphaned_components(&self) {
        let folder = Path::new(folders::COMPONENTS);
        let children = match self.local.children(folder) {
            Ok(children) => children,
            Err(e) => {
                warn!(error = %e, "Cannot list stored components");
                return;
            }
        };

        let live = self.identities.live_keys();
        let mut removed = 0usize;
        for child in children.into_iter().filter(|c| c.has_ext(ext::SETTINGS)) {
            if self.identities.is_used(&child.name) || live.contains(&child.name) {
                continue;
            }
            match self.local.delete(&component_path(&child.name)) {
                Ok(()) => removed += 1,
                Err(e) => warn!(tc_id = %child.name, error = %e, "Cannot delete orphaned component"),
            }
        }
        if removed > 0 {
            debug!(count = removed, "Deleted orphaned components");
        }
    }

    /// Save `config` and return what was actually written.
    ///
    /// Components that cannot or must not be persisted are purged from the
    /// result. Component I/O failures are logged and skipped.
    pub fn save_window_system(&self, config: &WindowManagerConfig) -> Result<WindowManagerConfig> {
        let mut parser = self.parser.lock();
        self.local.ensure_root()?;

        let mut persisted = config.clone();
        for id in config.referenced_ids() {
            match self.identities.lookup(&id, false) {
                Some(component) => self.store_component(&mut persisted, &id, component.as_ref()),
                None => self.copy_module_component(&id),
            }
        }

        parser.save(&self.ctx(), &persisted)?;
        Ok(persisted)
    }

    fn store_component(&self, persisted: &mut WindowManagerConfig, id: &str, component: &dyn Component) {
        let persistence = component.persistence_type();
        if !persistence.should_persist(component.is_opened()) {
            debug!(tc_id = %id, persistence = ?persistence, "Component not persisted, removing references");
            persisted.purge(id);
            return;
        }

        let data = match self.identities.factory().serialize(component) {
            Ok(data) => data,
            Err(source) => {
                let err = PersistenceError::SerializationFailure {
                    key: id.to_string(),
                    source,
                };
                warn!(error = %err, detail = %component.display_name(), "Removing component from saved layout");
                persisted.purge(id);
                return;
            }
        };
        if let Err(e) = self.local.write(&component_path(id), &data) {
            warn!(tc_id = %id, error = %e, "Cannot write component data");
        }
    }

    /// Give the local layer its own copy of module-provided component data.
    fn copy_module_component(&self, id: &str) {
        let path = component_path(id);
        if self.local.exists(&path) || !self.module.exists(&path) {
            return;
        }
        let copied = self
            .module
            .read(&path)
            .and_then(|data| self.local.write(&path, &data));
        match copied {
            Ok(()) => debug!(tc_id = %id, "Copied module component data to local layer"),
            Err(e) => warn!(tc_id = %id, error = %e, "Cannot copy component data"),
        }
    }

    /// Decode a standalone mode document without touching either layer.
    pub fn create_mode_from_text(&self, xml: &str) -> Result<ModeConfig> {
        decode_document::<ModeAttributes>(xml, "", false).map(|(config, _)| config)
    }

    pub fn mode_to_text(&self, mode: &ModeConfig) -> Result<String> {
        encode_document::<ModeAttributes>(mode, None, &mode.name)
    }

    /// Every mode of `config` as it would be saved.
    pub fn mode_config_xmls(&self, config: &WindowManagerConfig) -> Result<Vec<String>> {
        self.parser.lock().mode_config_xmls(config)
    }

    /// Load one mode file and its sibling reference folder from anywhere on disk.
    pub fn load_mode_config_from(&self, path: &Path) -> Result<ModeConfig> {
        ModeParser::load_from_file(path)
    }

    pub fn global_identity(&self, component: &Arc<dyn Component>, preferred: &str) -> String {
        self.identities.resolve_identity(component, preferred)
    }

    pub fn component_for_key(&self, key: &str, allow_deserialize: bool) -> Option<Arc<dyn Component>> {
        self.identities.lookup(key, allow_deserialize)
    }

    /// Drop the cached binding of a component that was closed for good.
    pub fn release_component(&self, key: &str) {
        self.identities.release(key);
    }

    pub fn add_mode(&self, name: &str) -> Option<ModeConfig> {
        self.parser.lock().add_mode(&self.ctx(), name)
    }

    pub fn remove_mode(&self, name: &str) {
        self.parser.lock().remove_mode(name);
    }

    pub fn add_group(&self, name: &str) -> Option<GroupConfig> {
        self.parser.lock().add_group(&self.ctx(), name)
    }

    pub fn remove_group(&self, name: &str) {
        self.parser.lock().remove_group(&self.ctx(), name);
    }

    pub fn add_tc_ref(&self, mode: &str, tc_id: &str) -> Option<TcRefConfig> {
        self.parser.lock().add_tc_ref(&self.ctx(), mode, tc_id)
    }

    pub fn remove_tc_ref(&self, tc_id: &str) -> bool {
        self.parser.lock().remove_tc_ref(&self.ctx(), tc_id)
    }

    pub fn add_tc_group(&self, group: &str, tc_id: &str) -> Option<TcGroupConfig> {
        self.parser.lock().add_tc_group(&self.ctx(), group, tc_id)
    }

    pub fn remove_tc_group(&self, group: &str, tc_id: &str) -> bool {
        self.parser.lock().remove_tc_group(&self.ctx(), group, tc_id)
    }

    /// Name of the mode currently holding `tc_id`
    pub fn mode_of(&self, tc_id: &str) -> Option<String> {
        self.parser
            .lock()
            .find_mode_parser(tc_id)
            .map(|p| p.name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{BlobComponent, BlobFactory, PersistenceType};
    use crate::model::ModeKind;
    use crate::modules::PermissiveRegistry;
    use tempfile::{TempDir, tempdir};

    fn manager() -> (TempDir, PersistenceManager) {
        let dir = tempdir().unwrap();
        let manager = PersistenceManager::new(
            dir.path().join("module"),
            dir.path().join("local"),
            "WindowManager",
            Arc::new(PermissiveRegistry),
            Arc::new(BlobFactory),
        );
        (dir, manager)
    }

    #[test]
    fn test_mode_text_roundtrip_touches_no_layer() {
        let (_dir, manager) = manager();
        let mut mode = ModeConfig::new("preview", ModeKind::View);
        mode.tc_refs.push(TcRefConfig::new("ignored"));

        let xml = manager.mode_to_text(&mode).unwrap();
        let decoded = manager.create_mode_from_text(&xml).unwrap();
        assert_eq!(decoded.name, "preview");
        // members live in their own files
        assert!(decoded.tc_refs.is_empty());
        assert!(!manager.local_root().exists());
    }

    #[test]
    fn test_load_creates_local_root() {
        let (_dir, manager) = manager();
        let config = manager.load_window_system().unwrap();
        assert_eq!(config, WindowManagerConfig::default());
        assert!(manager.local_root().is_dir());
    }

    #[test]
    fn test_orphaned_components_deleted_on_load() {
        let (_dir, manager) = manager();
        let local = FsStorage::new(manager.local_root());
        local.write(&component_path("orphan"), b"x").unwrap();
        local.write(&component_path("alive"), b"x").unwrap();

        let kept = manager.component_for_key("alive", true).unwrap();

        manager.load_window_system().unwrap();
        assert!(!local.exists(&component_path("orphan")));
        assert!(local.exists(&component_path("alive")));

        drop(kept);
        manager.load_window_system().unwrap();
        assert!(!local.exists(&component_path("alive")));
    }

    #[test]
    fn test_release_component() {
        let (_dir, manager) = manager();
        let c: Arc<dyn Component> = Arc::new(BlobComponent {
            persistence: PersistenceType::Always,
            opened: true,
            data: b"x".to_vec(),
        });
        let key = manager.global_identity(&c, "props");
        assert!(manager.component_for_key(&key, false).is_some());
        manager.release_component(&key);
        assert!(manager.component_for_key(&key, false).is_none());
    }
}
