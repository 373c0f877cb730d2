//! Identity registry for live components.
//!
//! Hands out stable, case-insensitively unique string keys, caches the
//! key/instance binding through weak references, and remembers each key's
//! persistence classification after the instance is gone.
//!
//! Two lock families guard the state: `live` (bindings, reservations, used
//! ids) and `transient` (keys of never-persisted components). When both are
//! needed, `live` is always taken first.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::component::{Component, ComponentFactory, PersistenceType};
use crate::constants::identity::COLLISION_SEPARATOR;
use crate::constants::{ext, folders};
use crate::error::ComponentError;
use crate::naming::{fold_case, is_storage_safe, sanitize_key};
use crate::storage::{Storage, entry_path};

/// Pointer identity of a live instance
type InstanceId = usize;

fn instance_id(component: &Arc<dyn Component>) -> InstanceId {
    Arc::as_ptr(component) as *const () as usize
}

#[derive(Default)]
struct LiveState {
    by_key: HashMap<String, Weak<dyn Component>>,
    by_instance: HashMap<InstanceId, String>,
    /// Folded persistent keys handed out this session; never released
    reserved: HashSet<String>,
    /// Sticky classification, kept after the instance is collected
    classification: HashMap<String, PersistenceType>,
    /// Ids referenced by the loaded layout
    used: HashSet<String>,
}

impl LiveState {
    /// Live instance bound to `key`, dropping the entry if it was collected.
    fn upgrade(&mut self, key: &str) -> Option<Arc<dyn Component>> {
        let weak = self.by_key.get(key)?;
        match weak.upgrade() {
            Some(component) => Some(component),
            None => {
                trace!(tc_id = %key, "Reaping collected component");
                self.by_key.remove(key);
                self.by_instance.retain(|_, k| k != key);
                None
            }
        }
    }

    fn bind(&mut self, key: &str, component: &Arc<dyn Component>) {
        let persistence = component.persistence_type();
        self.by_key.insert(key.to_string(), Arc::downgrade(component));
        self.by_instance.insert(instance_id(component), key.to_string());
        self.classification.insert(key.to_string(), persistence);
        if persistence != PersistenceType::Never {
            self.reserved.insert(fold_case(key));
        }
    }

    fn is_taken(&self, folded: &str) -> bool {
        self.reserved.contains(folded)
            || self.by_key.keys().any(|k| fold_case(k) == folded)
            || self.used.iter().any(|k| fold_case(k) == folded)
    }
}

/// Session-wide identity registry.
pub struct IdentityRegistry {
    local: Arc<dyn Storage>,
    module: Arc<dyn Storage>,
    factory: Arc<dyn ComponentFactory>,
    live: Mutex<LiveState>,
    /// Folded keys of never-persisted components
    transient: Mutex<HashSet<String>>,
    /// (key, reason class) pairs already logged at warn level
    reported: Mutex<HashSet<(String, &'static str)>>,
}

impl IdentityRegistry {
    pub fn new(
        local: Arc<dyn Storage>,
        module: Arc<dyn Storage>,
        factory: Arc<dyn ComponentFactory>,
    ) -> Self {
        Self {
            local,
            module,
            factory,
            live: Mutex::new(LiveState::default()),
            transient: Mutex::new(HashSet::new()),
            reported: Mutex::new(HashSet::new()),
        }
    }

    pub fn factory(&self) -> &Arc<dyn ComponentFactory> {
        &self.factory
    }

    /// Key of `component`, allocating one derived from `preferred` on first use.
    pub fn resolve_identity(&self, component: &Arc<dyn Component>, preferred: &str) -> String {
        let id = instance_id(component);
        {
            let mut live = self.live.lock();
            if let Some(key) = live.by_instance.get(&id).cloned() {
                match live.upgrade(&key) {
                    Some(bound) if Arc::ptr_eq(&bound, component) => return key,
                    // address reused by a new instance
                    _ => {
                        live.by_instance.remove(&id);
                    }
                }
            }
        }

        let persistence = component.persistence_type();
        let on_disk = if persistence == PersistenceType::Never {
            HashSet::new()
        } else {
            self.stored_keys()
        };

        let base = sanitize_key(preferred);
        let mut live = self.live.lock();
        let mut transient = self.transient.lock();

        // another thread may have bound this instance during the disk scan
        if let Some(key) = live.by_instance.get(&id).cloned() {
            match live.upgrade(&key) {
                Some(bound) if Arc::ptr_eq(&bound, component) => return key,
                _ => {
                    live.by_instance.remove(&id);
                }
            }
        }

        let mut candidate = base.clone();
        let mut counter = 0u32;
        loop {
            let folded = fold_case(&candidate);
            let taken = live.is_taken(&folded)
                || transient.contains(&folded)
                || on_disk.contains(&folded);
            if !taken {
                break;
            }
            counter += 1;
            candidate = format!("{base}{COLLISION_SEPARATOR}{counter}");
        }

        if persistence == PersistenceType::Never {
            transient.insert(fold_case(&candidate));
        }
        live.bind(&candidate, component);
        debug!(
            tc_id = %candidate,
            preferred = %preferred,
            persistence = ?persistence,
            "Allocated component identity"
        );
        candidate
    }

    /// Live component for `key`, optionally materializing it from storage.
    ///
    /// Failures are never fatal: the caller gets `None` and the reason is
    /// logged once per key and reason class.
    pub fn lookup(&self, key: &str, allow_deserialize: bool) -> Option<Arc<dyn Component>> {
        if let Some(component) = self.live.lock().upgrade(key) {
            return Some(component);
        }
        if !allow_deserialize {
            return None;
        }
        if !is_storage_safe(key) {
            self.report(key, "invalid-key", "Component key cannot name a stored file");
            return None;
        }

        let component = match self.materialize(key) {
            Ok(Some(component)) => component,
            Ok(None) => {
                self.report(key, "missing", "No stored data for component");
                return None;
            }
            Err(e) => {
                self.report(key, e.reason_class(), &e.to_string());
                return None;
            }
        };

        let mut live = self.live.lock();
        // another thread may have materialized it meanwhile
        if let Some(existing) = live.upgrade(key) {
            return Some(existing);
        }
        live.bind(key, &component);
        Some(component)
    }

    /// Local layer first; corrupt or inactive local data falls back to the
    /// module layer.
    fn materialize(&self, key: &str) -> Result<Option<Arc<dyn Component>>, ComponentError> {
        let path = component_path(key);

        let local_error = if self.local.exists(&path) {
            match self.read_and_materialize(self.local.as_ref(), &path, key) {
                Ok(component) => return Ok(Some(component)),
                Err(e @ (ComponentError::Corrupt(_) | ComponentError::NotActivatable)) => {
                    debug!(tc_id = %key, error = %e, "Local component data unusable, trying module layer");
                    Some(e)
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        if self.module.exists(&path) {
            return self
                .read_and_materialize(self.module.as_ref(), &path, key)
                .map(Some);
        }
        match local_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    fn read_and_materialize(
        &self,
        storage: &dyn Storage,
        path: &Path,
        key: &str,
    ) -> Result<Arc<dyn Component>, ComponentError> {
        let data = storage.read(path).map_err(|e| match e {
            crate::error::PersistenceError::Io { source, .. } => ComponentError::Io(source),
            other => ComponentError::Corrupt(other.to_string()),
        })?;
        self.factory.materialize(key, &data)
    }

    fn report(&self, key: &str, reason: &'static str, detail: &str) {
        let first = self.reported.lock().insert((key.to_string(), reason));
        if first {
            warn!(tc_id = %key, reason, detail, "Cannot obtain component");
        } else {
            debug!(tc_id = %key, reason, detail, "Cannot obtain component (repeated)");
        }
    }

    /// Classification recorded when `key` was bound, if it ever was.
    pub fn classify(&self, key: &str) -> Option<PersistenceType> {
        self.live.lock().classification.get(key).copied()
    }

    /// Drop the cached binding of `key`.
    ///
    /// The key itself stays reserved for the rest of the session.
    pub fn release(&self, key: &str) {
        let mut live = self.live.lock();
        if live.by_key.remove(key).is_some() {
            live.by_instance.retain(|_, k| k != key);
            trace!(tc_id = %key, "Released component binding");
        }
    }

    /// Keys whose instance is still alive
    pub fn live_keys(&self) -> Vec<String> {
        let mut live = self.live.lock();
        let keys: Vec<String> = live.by_key.keys().cloned().collect();
        keys.into_iter()
            .filter(|key| live.upgrade(key).is_some())
            .collect()
    }

    pub fn mark_used(&self, key: &str) {
        if !key.is_empty() {
            self.live.lock().used.insert(key.to_string());
        }
    }

    pub fn is_used(&self, key: &str) -> bool {
        self.live.lock().used.contains(key)
    }

    pub fn used_ids(&self) -> HashSet<String> {
        self.live.lock().used.clone()
    }

    /// Forget the used-id set before a fresh load.
    pub fn reset_used(&self) {
        self.live.lock().used.clear();
    }

    /// Folded stems of every stored component in the local layer
    fn stored_keys(&self) -> HashSet<String> {
        match self.local.children(Path::new(folders::COMPONENTS)) {
            Ok(children) => children
                .into_iter()
                .filter(|c| c.has_ext(ext::SETTINGS))
                .map(|c| fold_case(&c.name))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Cannot list stored components");
                HashSet::new()
            }
        }
    }
}

/// `Components/<key>.settings`
pub fn component_path(key: &str) -> PathBuf {
    entry_path(Path::new(folders::COMPONENTS), key, ext::SETTINGS)
}
