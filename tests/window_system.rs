use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use tempfile::{TempDir, tempdir};
use winsys_persistence::constants::attrs::TC_REF_ORDER;
use winsys_persistence::identity::component_path;
use winsys_persistence::model::{Orientation, Rect, SplitConstraint};
use winsys_persistence::modules::{Extension, ModuleInfo};
use winsys_persistence::parser::{ModeAttributes, TcRefEntry, encode_document};
use winsys_persistence::{
    BlobComponent, BlobFactory, Component, ExtensionRegistry, FsStorage, GroupConfig, ModeConfig, ModeKind,
    PermissiveRegistry, PersistenceManager, PersistenceType, StaticExtensionRegistry, Storage, TcGroupConfig,
    TcRefConfig, WindowManagerConfig,
};

struct Layout {
    dir: TempDir,
    module: FsStorage,
    local: FsStorage,
}

impl Layout {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let module = FsStorage::new(dir.path().join("module"));
        let local = FsStorage::new(dir.path().join("local"));
        Self { dir, module, local }
    }

    fn manager(&self) -> PersistenceManager {
        self.manager_with(Arc::new(PermissiveRegistry))
    }

    fn manager_with(&self, extensions: Arc<dyn ExtensionRegistry>) -> PersistenceManager {
        PersistenceManager::new(
            self.dir.path().join("module"),
            self.dir.path().join("local"),
            "WindowManager",
            extensions,
            Arc::new(BlobFactory),
        )
    }
}

fn put_mode(storage: &FsStorage, mode: &ModeConfig, owner: Option<&ModuleInfo>) {
    let xml = encode_document::<ModeAttributes>(mode, owner, &mode.name).unwrap();
    storage
        .write(&Path::new("Modes").join(format!("{}.wsmode", mode.name)), xml.as_bytes())
        .unwrap();
    for tc_ref in &mode.tc_refs {
        put_tc_ref(storage, &mode.name, tc_ref, None);
    }
}

fn put_tc_ref(storage: &FsStorage, mode: &str, tc_ref: &TcRefConfig, owner: Option<&ModuleInfo>) {
    let xml = encode_document::<TcRefEntry>(tc_ref, owner, &tc_ref.tc_id).unwrap();
    let path = Path::new("Modes")
        .join(mode)
        .join(format!("{}.wstcref", tc_ref.tc_id));
    storage.write(&path, xml.as_bytes()).unwrap();
}

fn mode(name: &str, members: &[&str]) -> ModeConfig {
    let mut mode = ModeConfig::new(name, ModeKind::View);
    mode.tc_refs = members.iter().map(|id| TcRefConfig::new(*id)).collect();
    mode
}

fn blob(persistence: PersistenceType, opened: bool) -> Arc<dyn Component> {
    Arc::new(BlobComponent {
        persistence,
        opened,
        data: b"state".to_vec(),
    })
}

/// Component the blob factory cannot serialize
struct Widget;

impl Component for Widget {
    fn persistence_type(&self) -> PersistenceType {
        PersistenceType::Always
    }

    fn is_opened(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn sample_layout() -> WindowManagerConfig {
    let mut explorer = mode("explorer", &["projects", "files", "services"]);
    explorer.tc_refs[0].opened = true;
    explorer.selected_tc_id = Some("projects".into());
    explorer.constraints = vec![SplitConstraint::new(Orientation::Horizontal, 0, 0.25)];
    explorer.bounds = Some(Rect::new(0, 0, 300, 600));

    let mut editor = mode("editor", &["welcome"]);
    editor.kind = ModeKind::Editor;
    editor.permanent = true;

    let mut debugger = GroupConfig::new("debugger");
    let mut watches = TcGroupConfig::new("watches");
    watches.open = true;
    watches.close = true;
    debugger.tc_groups = vec![watches, TcGroupConfig::new("callstack")];

    WindowManagerConfig {
        active_mode: Some("editor".into()),
        recent_view_list: vec!["files".into(), "projects".into()],
        modes: vec![explorer, editor],
        groups: vec![debugger],
        ..WindowManagerConfig::default()
    }
}

#[test]
fn test_save_then_load_roundtrip() {
    let layout = Layout::new();
    let config = sample_layout();

    let saved = layout.manager().save_window_system(&config).unwrap();
    assert_eq!(saved, config);

    let loaded = layout.manager().load_window_system().unwrap();
    assert_eq!(loaded, config);
    assert_eq!(
        loaded.mode("explorer").unwrap().tc_ids().collect::<Vec<_>>(),
        vec!["projects", "files", "services"]
    );
}

#[test]
fn test_repeated_save_and_load_is_stable() {
    let layout = Layout::new();
    let manager = layout.manager();
    manager.save_window_system(&sample_layout()).unwrap();

    let first = manager.load_window_system().unwrap();
    let first_record = layout.local.attribute(Path::new("Modes/explorer"), TC_REF_ORDER);
    manager.save_window_system(&first).unwrap();
    let second = manager.load_window_system().unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first_record,
        layout.local.attribute(Path::new("Modes/explorer"), TC_REF_ORDER)
    );
    assert_eq!(first_record.as_deref(), Some("projects/files/services"));
}

#[test]
fn test_order_record_with_new_reference() {
    let layout = Layout::new();
    put_mode(&layout.module, &mode("explorer", &["a", "b", "c", "d"]), None);
    layout
        .local
        .set_attribute(Path::new("Modes/explorer"), TC_REF_ORDER, Some("c/a/b"))
        .unwrap();

    let config = layout.manager().load_window_system().unwrap();

    assert_eq!(
        config.mode("explorer").unwrap().tc_ids().collect::<Vec<_>>(),
        vec!["c", "a", "b", "d"]
    );
    assert_eq!(
        layout.local.attribute(Path::new("Modes/explorer"), TC_REF_ORDER).as_deref(),
        Some("c/a/b/d")
    );
}

#[test]
fn test_entities_of_missing_modules_are_pruned() {
    let layout = Layout::new();
    let gone = ModuleInfo::from_attributes("org.example.gone", None);
    let present = ModuleInfo::from_attributes("org.example.core/1", Some("1.0"));

    // mode owned by a missing module, customized locally
    put_mode(&layout.module, &mode("profiler", &["hotspots"]), Some(&gone));
    put_mode(&layout.local, &mode("profiler", &["hotspots"]), Some(&gone));

    // reference owned by a missing module inside a surviving mode
    put_mode(&layout.module, &mode("output", &["log"]), Some(&present));
    put_tc_ref(&layout.local, "output", &TcRefConfig::new("search"), Some(&gone));

    let registry = StaticExtensionRegistry::new(vec![Extension {
        code_name_base: "org.example.core".into(),
        release: Some("1".into()),
        spec_version: "1.2".into(),
        enabled: true,
    }]);
    let config = layout.manager_with(Arc::new(registry)).load_window_system().unwrap();

    assert!(config.mode("profiler").is_none());
    assert!(!layout.local.exists(Path::new("Modes/profiler.wsmode")));
    assert!(!layout.local.exists(Path::new("Modes/profiler")));
    assert!(layout.module.exists(Path::new("Modes/profiler.wsmode")));

    let output = config.mode("output").unwrap();
    assert_eq!(output.tc_ids().collect::<Vec<_>>(), vec!["log"]);
    assert!(!layout.local.exists(Path::new("Modes/output/search.wstcref")));
}

#[test]
fn test_alias_merge_appends_absorbed_members() {
    let layout = Layout::new();
    put_mode(&layout.module, &mode("a", &["x"]), None);
    let mut b = mode("b", &["y"]);
    b.other_names.insert("a".into());
    put_mode(&layout.module, &b, None);

    let config = layout.manager().load_window_system().unwrap();

    assert!(config.mode("a").is_none());
    assert_eq!(config.mode("b").unwrap().tc_ids().collect::<Vec<_>>(), vec!["y", "x"]);
}

#[test]
fn test_unserializable_component_is_purged() {
    let layout = Layout::new();
    let manager = layout.manager();
    let widget: Arc<dyn Component> = Arc::new(Widget);
    assert_eq!(manager.global_identity(&widget, "X"), "X");

    let mut explorer = mode("explorer", &["projects", "X"]);
    explorer.selected_tc_id = Some("X".into());
    explorer.previous_selected_tc_id = Some("X".into());
    let mut debugger = GroupConfig::new("debugger");
    debugger.tc_groups = vec![TcGroupConfig::new("X")];
    let config = WindowManagerConfig {
        recent_view_list: vec!["X".into(), "projects".into()],
        modes: vec![explorer],
        groups: vec![debugger],
        ..WindowManagerConfig::default()
    };

    let saved = manager.save_window_system(&config).unwrap();

    let explorer = saved.mode("explorer").unwrap();
    assert_eq!(explorer.tc_ids().collect::<Vec<_>>(), vec!["projects"]);
    assert_eq!(explorer.selected_tc_id, None);
    assert_eq!(explorer.previous_selected_tc_id, None);
    assert_eq!(saved.recent_view_list, vec!["projects".to_string()]);
    assert!(saved.group("debugger").unwrap().tc_groups.is_empty());
    assert!(!layout.local.exists(Path::new("Modes/explorer/X.wstcref")));
    assert!(!layout.local.exists(&component_path("X")));

    assert_eq!(layout.manager().load_window_system().unwrap(), saved);
}

#[test]
fn test_persistence_classification_filters_save() {
    let layout = Layout::new();
    let manager = layout.manager();
    let kept = blob(PersistenceType::Always, false);
    let closed = blob(PersistenceType::OnlyWhenOpened, false);
    let open = blob(PersistenceType::OnlyWhenOpened, true);
    let never = blob(PersistenceType::Never, true);
    for (component, key) in [(&kept, "kept"), (&closed, "closed"), (&open, "open"), (&never, "never")] {
        assert_eq!(manager.global_identity(component, key), key);
    }

    let config = WindowManagerConfig {
        modes: vec![mode("output", &["kept", "closed", "open", "never"])],
        ..WindowManagerConfig::default()
    };
    let saved = manager.save_window_system(&config).unwrap();

    assert_eq!(
        saved.mode("output").unwrap().tc_ids().collect::<Vec<_>>(),
        vec!["kept", "open"]
    );
    assert_eq!(layout.local.read(&component_path("kept")).unwrap(), b"state");
    assert!(layout.local.exists(&component_path("open")));
    assert!(!layout.local.exists(&component_path("closed")));
    assert!(!layout.local.exists(&component_path("never")));
}

#[test]
fn test_module_component_copied_on_save() {
    let layout = Layout::new();
    layout.module.write(&component_path("output"), b"module").unwrap();
    put_mode(&layout.module, &mode("bottom", &["output"]), None);

    let manager = layout.manager();
    let config = manager.load_window_system().unwrap();
    assert!(!layout.local.exists(&component_path("output")));

    manager.save_window_system(&config).unwrap();
    assert_eq!(layout.local.read(&component_path("output")).unwrap(), b"module");

    let component = manager.component_for_key("output", true).unwrap();
    let blob = component.as_any().downcast_ref::<BlobComponent>().unwrap();
    assert_eq!(blob.data, b"module");
}

#[test]
fn test_moved_reference_is_masked() {
    let layout = Layout::new();
    put_mode(&layout.module, &mode("explorer", &["projects", "favorites"]), None);
    put_mode(&layout.module, &mode("navigator", &[]), None);
    // user moved favorites into navigator
    put_tc_ref(&layout.local, "navigator", &TcRefConfig::new("favorites"), None);

    let config = layout.manager().load_window_system().unwrap();

    assert_eq!(
        config.mode("explorer").unwrap().tc_ids().collect::<Vec<_>>(),
        vec!["projects"]
    );
    assert_eq!(
        config.mode("navigator").unwrap().tc_ids().collect::<Vec<_>>(),
        vec!["favorites"]
    );
}

#[test]
fn test_incremental_module_changes() {
    let layout = Layout::new();
    let manager = layout.manager();
    manager.save_window_system(&sample_layout()).unwrap();
    manager.load_window_system().unwrap();

    put_mode(&layout.module, &mode("properties", &["sheet"]), None);
    let added = manager.add_mode("properties").unwrap();
    assert_eq!(added.tc_ids().collect::<Vec<_>>(), vec!["sheet"]);
    assert_eq!(manager.mode_of("sheet").as_deref(), Some("properties"));

    put_tc_ref(&layout.module, "explorer", &TcRefConfig::new("favorites"), None);
    assert!(manager.add_tc_ref("explorer", "favorites").is_some());
    assert_eq!(
        layout.local.attribute(Path::new("Modes/explorer"), TC_REF_ORDER).as_deref(),
        Some("projects/files/services/favorites")
    );

    assert!(manager.remove_tc_ref("files"));
    assert_eq!(
        layout.local.attribute(Path::new("Modes/explorer"), TC_REF_ORDER).as_deref(),
        Some("projects/services/favorites")
    );
    assert_eq!(manager.mode_of("files"), None);

    manager.remove_group("debugger");
    assert!(!layout.local.exists(Path::new("Groups/debugger.wsgrp")));
}

#[test]
fn test_load_mode_config_from_file() {
    let layout = Layout::new();
    let mut output = mode("output", &["log", "search"]);
    output.minimized = true;
    put_mode(&layout.local, &output, None);

    let manager = layout.manager();
    let loaded = manager
        .load_mode_config_from(&layout.dir.path().join("local/Modes/output.wsmode"))
        .unwrap();
    assert_eq!(loaded, output);

    let xmls = manager
        .mode_config_xmls(&WindowManagerConfig {
            modes: vec![output],
            ..WindowManagerConfig::default()
        })
        .unwrap();
    assert!(xmls[0].contains(r#"minimized="true""#));
}

#[test]
fn test_reference_id_with_separator_keeps_order() {
    let layout = Layout::new();
    let config = WindowManagerConfig {
        modes: vec![mode("explorer", &["x", "a/b", "c"])],
        ..WindowManagerConfig::default()
    };
    layout.manager().save_window_system(&config).unwrap();

    let loaded = layout.manager().load_window_system().unwrap();
    assert_eq!(
        loaded.mode("explorer").unwrap().tc_ids().collect::<Vec<_>>(),
        vec!["x", "a/b", "c"]
    );
}
