use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::entry::{EntryParser, decode_document};
use super::kinds::{ModeAttributes, TcRefEntry};
use super::order::OrderReconciler;
use super::{Context, members};
use crate::constants::{ext, folders};
use crate::error::{PersistenceError, Result};
use crate::model::{ModeConfig, TcRefConfig};
use crate::modules::{ModuleInfo, accept};
use crate::naming::{escape_name, unescape_name};

/// Container parser for one mode and its component references.
pub struct ModeParser {
    entry: EntryParser<ModeAttributes>,
    /// Keyed by component id
    members: BTreeMap<String, EntryParser<TcRefEntry>>,
}

impl ModeParser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            entry: EntryParser::new(name, folders::MODES),
            members: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn is_in_module(&self) -> bool {
        self.entry.is_in_module()
    }

    pub fn is_in_local(&self) -> bool {
        self.entry.is_in_local()
    }

    pub fn set_in_module(&mut self, present: bool) {
        self.entry.set_in_module(present);
    }

    pub fn set_in_local(&mut self, present: bool) {
        self.entry.set_in_local(present);
    }

    pub fn module(&self) -> Option<&ModuleInfo> {
        self.entry.module()
    }

    /// Location of the mode file in either layer
    pub fn path(&self) -> PathBuf {
        self.entry.path()
    }

    pub fn contains_tc_ref(&self, tc_id: &str) -> bool {
        self.members.contains_key(tc_id)
    }

    fn members_folder(&self) -> PathBuf {
        Path::new(folders::MODES).join(escape_name(self.name()))
    }

    /// Load attributes, then discover, order and filter the members.
    ///
    /// `masked` holds component ids stored locally in any mode; a member only
    /// present in this mode's module folder is skipped when masked.
    pub fn load(&mut self, ctx: &Context<'_>, masked: &HashSet<String>) -> Result<ModeConfig> {
        let mut config = self.entry.load(ctx)?;
        debug!(mode = %self.name(), "Mode attributes loaded");
        config.tc_refs = self.load_members(ctx, masked)?;
        Ok(config)
    }

    fn load_members(&mut self, ctx: &Context<'_>, masked: &HashSet<String>) -> Result<Vec<TcRefConfig>> {
        let folder = self.members_folder();
        let found = members::discover(ctx, &folder, ext::TC_REF)?;

        self.members.retain(|name, _| found.contains_key(name));
        for (name, presence) in &found {
            let parser = self
                .members
                .entry(name.clone())
                .or_insert_with(|| EntryParser::new(name.clone(), folder.clone()));
            parser.set_in_module(presence.in_module);
            parser.set_in_local(presence.in_local);
        }
        debug!(mode = %self.name(), count = found.len(), "Component references discovered");

        let names: Vec<String> = self.members.keys().cloned().collect();
        let reconciler = OrderReconciler::new(ctx.module, ctx.local, &folder, ext::TC_REF);
        let ordered = reconciler.order(&names);
        if let Err(e) = reconciler.write_record(&ordered) {
            warn!(mode = %self.name(), error = %e, "Cannot write reference order, keeping computed order");
        }

        let mode = self.entry.name().to_string();
        let mut tc_refs = Vec::with_capacity(ordered.len());
        for name in ordered {
            let Some(parser) = self.members.get_mut(&name) else {
                continue;
            };

            if masked.contains(&name) && parser.is_in_module() && !parser.is_in_local() {
                debug!(mode = %mode, tc_id = %name, "Reference stored locally in another mode, skipped");
                self.members.remove(&name);
                continue;
            }

            match parser.load(ctx) {
                Ok(tc_ref) => {
                    let acceptance = accept(ctx.extensions, parser.module());
                    if acceptance.is_accepted() {
                        ctx.identities.mark_used(&tc_ref.tc_id);
                        tc_refs.push(tc_ref);
                    } else {
                        info!(mode = %mode, tc_id = %name, ?acceptance, "Owning module unavailable, dropping reference");
                        parser.delete_local(ctx);
                        self.members.remove(&name);
                    }
                }
                Err(e) => {
                    warn!(mode = %mode, tc_id = %name, error = %e, "Dropping unreadable reference");
                    parser.delete_local(ctx);
                    self.members.remove(&name);
                }
            }
        }

        if tc_refs.len() != names.len() {
            let kept: Vec<String> = tc_refs.iter().map(|r| r.tc_id.clone()).collect();
            if let Err(e) = reconciler.write_record(&kept) {
                warn!(mode = %mode, error = %e, "Cannot write reference order, keeping computed order");
            }
        }
        Ok(tc_refs)
    }

    /// Attributes, then members, then the order record.
    pub fn save(&mut self, ctx: &Context<'_>, config: &ModeConfig) -> Result<()> {
        self.entry.save(ctx, config)?;

        let folder = self.members_folder();
        let wanted: HashSet<&str> = config.tc_ids().collect();
        let stale: Vec<String> = self
            .members
            .keys()
            .filter(|name| !wanted.contains(name.as_str()))
            .cloned()
            .collect();
        for name in stale {
            if let Some(mut parser) = self.members.remove(&name) {
                debug!(mode = %self.name(), tc_id = %name, "Removing stale reference");
                parser.delete_local(ctx);
            }
        }

        for tc_ref in &config.tc_refs {
            let parser = self
                .members
                .entry(tc_ref.tc_id.clone())
                .or_insert_with(|| EntryParser::new(tc_ref.tc_id.clone(), folder.clone()));
            parser.save(ctx, tc_ref)?;
        }

        let order: Vec<String> = config.tc_ids().map(String::from).collect();
        OrderReconciler::new(ctx.module, ctx.local, &folder, ext::TC_REF).write_record(&order)
    }

    pub fn to_xml(&self, config: &ModeConfig) -> Result<String> {
        self.entry.to_xml(config)
    }

    /// Load one reference that appeared in the module layer.
    pub fn add_tc_ref(&mut self, ctx: &Context<'_>, tc_id: &str) -> Option<TcRefConfig> {
        let mut parser = EntryParser::<TcRefEntry>::new(tc_id, self.members_folder());
        parser.set_in_module(true);
        parser.set_in_local(ctx.local.exists(&parser.path()));

        let tc_ref = match parser.load(ctx) {
            Ok(tc_ref) => tc_ref,
            Err(e) => {
                warn!(mode = %self.name(), tc_id, error = %e, "Cannot load added reference");
                return None;
            }
        };
        let acceptance = accept(ctx.extensions, parser.module());
        if !acceptance.is_accepted() {
            info!(mode = %self.name(), tc_id, ?acceptance, "Owning module unavailable, ignoring added reference");
            return None;
        }

        ctx.identities.mark_used(&tc_ref.tc_id);
        self.members.insert(tc_id.to_string(), parser);
        self.rewrite_order(ctx);
        Some(tc_ref)
    }

    /// Forget one reference and delete its local file.
    pub fn remove_tc_ref(&mut self, ctx: &Context<'_>, tc_id: &str) -> bool {
        let Some(mut parser) = self.members.remove(tc_id) else {
            return false;
        };
        self.rewrite_order(ctx);
        parser.delete_local(ctx);
        true
    }

    fn rewrite_order(&self, ctx: &Context<'_>) {
        let folder = self.members_folder();
        let names: Vec<String> = self.members.keys().cloned().collect();
        if let Err(e) = OrderReconciler::new(ctx.module, ctx.local, &folder, ext::TC_REF).reconcile(&names) {
            warn!(mode = %self.name(), error = %e, "Cannot rewrite reference order");
        }
    }

    /// Delete the mode file and member folder from the local layer.
    pub fn delete_local(&mut self, ctx: &Context<'_>) {
        self.entry.delete_local(ctx);
        if let Err(e) = ctx.local.delete(&self.members_folder()) {
            warn!(mode = %self.name(), error = %e, "Cannot delete local mode folder");
        }
    }

    /// Load a mode file from anywhere on disk, with the references stored in
    /// the sibling folder of the same name.
    pub fn load_from_file(path: &Path) -> Result<ModeConfig> {
        let xml = std::fs::read_to_string(path).map_err(|e| PersistenceError::io("read", path, e))?;
        let name = path
            .file_stem()
            .map(|s| unescape_name(&s.to_string_lossy()))
            .unwrap_or_default();
        let (mut config, _) = decode_document::<ModeAttributes>(&xml, &name, true)?;

        let Some(folder) = path.parent().map(|p| p.join(path.file_stem().unwrap_or_default())) else {
            return Ok(config);
        };
        let mut files: Vec<PathBuf> = match std::fs::read_dir(&folder) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|e| e == ext::TC_REF))
                .collect(),
            Err(_) => Vec::new(),
        };
        files.sort();

        for file in files {
            let stem = file
                .file_stem()
                .map(|s| unescape_name(&s.to_string_lossy()))
                .unwrap_or_default();
            let decoded = std::fs::read_to_string(&file)
                .map_err(|e| PersistenceError::io("read", &file, e))
                .and_then(|xml| decode_document::<TcRefEntry>(&xml, &stem, true));
            match decoded {
                Ok((tc_ref, _)) => config.tc_refs.push(tc_ref),
                Err(e) => warn!(mode = %name, tc_id = %stem, error = %e, "Skipping unreadable reference"),
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::BlobFactory;
    use crate::constants::attrs::TC_REF_ORDER;
    use crate::identity::IdentityRegistry;
    use crate::model::ModeKind;
    use crate::modules::{Extension, PermissiveRegistry, StaticExtensionRegistry};
    use crate::parser::encode_document;
    use crate::storage::{FsStorage, Storage};
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    struct Layers {
        _dir: TempDir,
        module: Arc<FsStorage>,
        local: Arc<FsStorage>,
        identities: IdentityRegistry,
    }

    impl Layers {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let module = Arc::new(FsStorage::new(dir.path().join("module")));
            let local = Arc::new(FsStorage::new(dir.path().join("local")));
            let identities = IdentityRegistry::new(local.clone(), module.clone(), Arc::new(BlobFactory));
            Self {
                _dir: dir,
                module,
                local,
                identities,
            }
        }

        fn ctx<'a>(&'a self, extensions: &'a dyn crate::modules::ExtensionRegistry) -> Context<'a> {
            Context {
                module: self.module.as_ref(),
                local: self.local.as_ref(),
                extensions,
                identities: &self.identities,
            }
        }
    }

    fn put_tc_ref(storage: &FsStorage, mode: &str, tc_ref: &TcRefConfig, module: Option<&ModuleInfo>) {
        let xml = encode_document::<TcRefEntry>(tc_ref, module, &tc_ref.tc_id).unwrap();
        let path = Path::new(folders::MODES)
            .join(mode)
            .join(format!("{}.{}", tc_ref.tc_id, ext::TC_REF));
        storage.write(&path, xml.as_bytes()).unwrap();
    }

    fn put_mode(storage: &FsStorage, mode: &ModeConfig) {
        let xml = encode_document::<ModeAttributes>(mode, None, &mode.name).unwrap();
        let path = Path::new(folders::MODES).join(format!("{}.{}", mode.name, ext::MODE));
        storage.write(&path, xml.as_bytes()).unwrap();
    }

    fn loaded(layers: &Layers, name: &str, masked: &HashSet<String>) -> (ModeParser, ModeConfig) {
        let mut parser = ModeParser::new(name);
        parser.set_in_module(true);
        parser.set_in_local(true);
        let config = parser.load(&layers.ctx(&PermissiveRegistry), masked).unwrap();
        (parser, config)
    }

    #[test]
    fn test_save_then_load() {
        let layers = Layers::new();
        let ctx = layers.ctx(&PermissiveRegistry);
        let mut mode = ModeConfig::new("explorer", ModeKind::View);
        mode.tc_refs = vec![TcRefConfig::new("z").opened(true), TcRefConfig::new("a")];
        mode.selected_tc_id = Some("z".into());

        let mut parser = ModeParser::new("explorer");
        parser.save(&ctx, &mode).unwrap();
        let folder = Path::new("Modes/explorer");
        assert_eq!(layers.local.attribute(folder, TC_REF_ORDER).as_deref(), Some("z/a"));

        let (_, reloaded) = loaded(&layers, "explorer", &HashSet::new());
        assert_eq!(reloaded, mode);
        assert!(layers.identities.is_used("z"));
    }

    #[test]
    fn test_order_write_failure_keeps_mode() {
        let layers = Layers::new();
        put_mode(&layers.module, &ModeConfig::new("output", ModeKind::View));
        put_tc_ref(&layers.module, "output", &TcRefConfig::new("log"), None);
        put_tc_ref(&layers.module, "output", &TcRefConfig::new("search"), None);

        let read_only = FsStorage::read_only(layers._dir.path().join("local"));
        let ctx = Context {
            module: layers.module.as_ref(),
            local: &read_only,
            extensions: &PermissiveRegistry,
            identities: &layers.identities,
        };
        let mut parser = ModeParser::new("output");
        parser.set_in_module(true);
        let mode = parser.load(&ctx, &HashSet::new()).unwrap();

        assert_eq!(mode.tc_ids().collect::<Vec<_>>(), vec!["log", "search"]);
        assert_eq!(read_only.attribute(Path::new("Modes/output"), TC_REF_ORDER), None);
    }

    #[test]
    fn test_save_purges_stale_members() {
        let layers = Layers::new();
        let ctx = layers.ctx(&PermissiveRegistry);
        let mut mode = ModeConfig::new("output", ModeKind::View);
        mode.tc_refs = vec![TcRefConfig::new("log"), TcRefConfig::new("tasks")];

        let mut parser = ModeParser::new("output");
        parser.save(&ctx, &mode).unwrap();
        mode.tc_refs.truncate(1);
        parser.save(&ctx, &mode).unwrap();

        assert!(!layers.local.exists(Path::new("Modes/output/tasks.wstcref")));
        let (_, reloaded) = loaded(&layers, "output", &HashSet::new());
        assert_eq!(reloaded.tc_ids().collect::<Vec<_>>(), vec!["log"]);
    }

    #[test]
    fn test_unreadable_member_dropped_and_deleted() {
        let layers = Layers::new();
        put_mode(&layers.local, &ModeConfig::new("editor", ModeKind::Editor));
        put_tc_ref(&layers.local, "editor", &TcRefConfig::new("welcome"), None);
        let broken = Path::new("Modes/editor/broken.wstcref");
        layers.local.write(broken, b"<tc-ref version=\"2.2\"><oops></tc-ref>").unwrap();

        let (_, config) = loaded(&layers, "editor", &HashSet::new());
        assert_eq!(config.tc_ids().collect::<Vec<_>>(), vec!["welcome"]);
        assert!(!layers.local.exists(broken));
        assert_eq!(
            layers.local.attribute(Path::new("Modes/editor"), TC_REF_ORDER).as_deref(),
            Some("welcome")
        );
    }

    #[test]
    fn test_rejected_member_removed() {
        let layers = Layers::new();
        put_mode(&layers.local, &ModeConfig::new("explorer", ModeKind::View));
        let owner = ModuleInfo::from_attributes("org.example.gone/1", None);
        put_tc_ref(&layers.local, "explorer", &TcRefConfig::new("orphan"), Some(&owner));
        put_tc_ref(&layers.local, "explorer", &TcRefConfig::new("kept"), None);

        let registry = StaticExtensionRegistry::new(vec![Extension {
            code_name_base: "org.example.other".into(),
            release: None,
            spec_version: "1.0".into(),
            enabled: true,
        }]);
        let mut parser = ModeParser::new("explorer");
        parser.set_in_local(true);
        let config = parser.load(&layers.ctx(&registry), &HashSet::new()).unwrap();

        assert_eq!(config.tc_ids().collect::<Vec<_>>(), vec!["kept"]);
        assert!(!layers.local.exists(Path::new("Modes/explorer/orphan.wstcref")));
    }

    #[test]
    fn test_masked_module_member_skipped() {
        let layers = Layers::new();
        put_mode(&layers.module, &ModeConfig::new("explorer", ModeKind::View));
        put_tc_ref(&layers.module, "explorer", &TcRefConfig::new("moved"), None);
        put_tc_ref(&layers.module, "explorer", &TcRefConfig::new("stays"), None);

        let masked: HashSet<String> = ["moved".to_string()].into();
        let (parser, config) = loaded(&layers, "explorer", &masked);
        assert_eq!(config.tc_ids().collect::<Vec<_>>(), vec!["stays"]);
        assert!(!parser.contains_tc_ref("moved"));
    }

    #[test]
    fn test_add_and_remove_tc_ref() {
        let layers = Layers::new();
        let ctx = layers.ctx(&PermissiveRegistry);
        let mut mode = ModeConfig::new("output", ModeKind::View);
        mode.tc_refs = vec![TcRefConfig::new("log")];
        let mut parser = ModeParser::new("output");
        parser.save(&ctx, &mode).unwrap();

        put_tc_ref(&layers.module, "output", &TcRefConfig::new("search"), None);
        let added = parser.add_tc_ref(&ctx, "search").unwrap();
        assert_eq!(added.tc_id, "search");
        let folder = Path::new("Modes/output");
        assert_eq!(layers.local.attribute(folder, TC_REF_ORDER).as_deref(), Some("log/search"));

        assert!(parser.remove_tc_ref(&ctx, "log"));
        assert!(!layers.local.exists(Path::new("Modes/output/log.wstcref")));
        assert_eq!(layers.local.attribute(folder, TC_REF_ORDER).as_deref(), Some("search"));
        assert!(!parser.remove_tc_ref(&ctx, "log"));
        assert!(parser.add_tc_ref(&ctx, "missing").is_none());
    }

    #[test]
    fn test_load_from_file() {
        let layers = Layers::new();
        let mut mode = ModeConfig::new("properties", ModeKind::View);
        mode.permanent = true;
        put_mode(&layers.local, &mode);
        put_tc_ref(&layers.local, "properties", &TcRefConfig::new("sheet"), None);

        let path = layers.local.root().join("Modes/properties.wsmode");
        let config = ModeParser::load_from_file(&path).unwrap();
        assert!(config.permanent);
        assert_eq!(config.tc_ids().collect::<Vec<_>>(), vec!["sheet"]);
    }
}
