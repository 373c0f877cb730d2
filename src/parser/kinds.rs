//! Attribute schemas of the five persisted entity kinds.

use std::collections::BTreeSet;

use tracing::debug;

use super::entry::{EntryKind, Repair, check_declared_name};
use crate::constants::{ext, versions, window_manager};
use crate::error::{PersistenceError, Result};
use crate::model::{
    EditorAreaConfig, EditorAreaState, GroupConfig, MainWindowGeometry, ModeConfig, ModeKind,
    ModeState, Orientation, Rect, Side, SplitConstraint, TcGroupConfig, TcRefConfig,
    WindowManagerConfig,
};
use crate::xml::{DocumentWriter, Element};

type WriteResult = std::result::Result<(), quick_xml::Error>;

fn invalid(kind: &'static str, name: &str, reason: impl Into<String>) -> PersistenceError {
    PersistenceError::InvalidEntity {
        kind,
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn rect_attrs(rect: &Rect) -> [(&'static str, String); 4] {
    [
        ("x", rect.x.to_string()),
        ("y", rect.y.to_string()),
        ("width", rect.width.to_string()),
        ("height", rect.height.to_string()),
    ]
}

fn decode_path(repair: &Repair<'_>, el: &Element) -> SplitConstraint {
    let orientation = match el.attr("orientation") {
        Some(value) => Orientation::parse(value).unwrap_or_else(|| {
            repair.warn("path/orientation", value);
            Orientation::Vertical
        }),
        None => Orientation::Vertical,
    };
    SplitConstraint::new(
        orientation,
        repair.int(el, "number", 0),
        repair.float(el, "weight", window_manager::DEFAULT_SPLIT_WEIGHT),
    )
}

fn encode_constraints(w: &mut DocumentWriter, constraints: &[SplitConstraint]) -> WriteResult {
    if constraints.is_empty() {
        return Ok(());
    }
    w.start("constraints", &[])?;
    for c in constraints {
        w.empty(
            "path",
            &[
                ("orientation", c.orientation.as_str().to_string()),
                ("number", c.index.to_string()),
                ("weight", c.weight.to_string()),
            ],
        )?;
    }
    w.end("constraints")
}

/// Component reference inside a mode folder
pub struct TcRefEntry;

impl EntryKind for TcRefEntry {
    type Config = TcRefConfig;

    const KIND: &'static str = "tc-ref";
    const ROOT: &'static str = "tc-ref";
    const EXT: &'static str = ext::TC_REF;
    const VERSION: &'static str = versions::TC_REF;

    fn decode(children: &[Element], name: &str, expected: Option<&str>) -> Result<TcRefConfig> {
        let repair = Repair { kind: Self::KIND, name };
        let mut config = TcRefConfig::new(name);

        for el in children {
            match el.name.as_str() {
                "tc-id" => {
                    let id = el
                        .attr("id")
                        .ok_or_else(|| invalid(Self::KIND, name, "missing tc-id/id"))?;
                    check_declared_name(Self::KIND, id, expected)?;
                    config.tc_id = id.to_string();
                }
                "state" => config.opened = repair.bool(el, "opened", false),
                "previousMode" => {
                    config.previous_mode = el.attr("name").filter(|n| !n.is_empty()).map(String::from);
                    config.previous_index = match el.attr("index") {
                        None => None,
                        Some(raw) => match raw.trim().parse::<i64>() {
                            Ok(index) => u32::try_from(index).ok(),
                            Err(_) => {
                                repair.warn("previousMode/index", raw);
                                None
                            }
                        },
                    };
                }
                "docking-status" => {
                    config.docked_in_maximized = repair.bool(el, "maximized-mode", false);
                    config.docked_in_default = repair.bool(el, "default-mode", true);
                }
                "slide-in-status" => {
                    config.slid_in_maximized = repair.bool(el, "maximized-mode", false);
                }
                _ => {}
            }
        }
        Ok(config)
    }

    fn encode(config: &TcRefConfig, w: &mut DocumentWriter) -> WriteResult {
        w.empty("tc-id", &[("id", config.tc_id.clone())])?;
        w.empty("state", &[("opened", config.opened.to_string())])?;
        if let Some(mode) = &config.previous_mode {
            let mut attrs = vec![("name", mode.clone())];
            if let Some(index) = config.previous_index {
                attrs.push(("index", index.to_string()));
            }
            w.empty("previousMode", &attrs)?;
        }
        w.empty(
            "docking-status",
            &[
                ("maximized-mode", config.docked_in_maximized.to_string()),
                ("default-mode", config.docked_in_default.to_string()),
            ],
        )?;
        w.empty(
            "slide-in-status",
            &[("maximized-mode", config.slid_in_maximized.to_string())],
        )
    }
}

/// Group membership of one component
pub struct TcGroupEntry;

impl EntryKind for TcGroupEntry {
    type Config = TcGroupConfig;

    const KIND: &'static str = "tc-group";
    const ROOT: &'static str = "tc-group";
    const EXT: &'static str = ext::TC_GROUP;
    const VERSION: &'static str = versions::TC_GROUP;

    fn decode(children: &[Element], name: &str, expected: Option<&str>) -> Result<TcGroupConfig> {
        let repair = Repair { kind: Self::KIND, name };
        let mut config = TcGroupConfig::new(name);

        for el in children {
            match el.name.as_str() {
                "tc-id" => {
                    let id = el
                        .attr("id")
                        .ok_or_else(|| invalid(Self::KIND, name, "missing tc-id/id"))?;
                    check_declared_name(Self::KIND, id, expected)?;
                    config.tc_id = id.to_string();
                }
                "open-close-behavior" => {
                    config.open = repair.bool(el, "open", false);
                    config.close = repair.bool(el, "close", false);
                }
                "tc-state" => config.was_opened = repair.bool(el, "was-opened", false),
                _ => {}
            }
        }
        Ok(config)
    }

    fn encode(config: &TcGroupConfig, w: &mut DocumentWriter) -> WriteResult {
        w.empty("tc-id", &[("id", config.tc_id.clone())])?;
        w.empty(
            "open-close-behavior",
            &[
                ("open", config.open.to_string()),
                ("close", config.close.to_string()),
            ],
        )?;
        w.empty("tc-state", &[("was-opened", config.was_opened.to_string())])
    }
}

/// Own attributes of a mode; members are stored separately.
pub struct ModeAttributes;

impl EntryKind for ModeAttributes {
    type Config = ModeConfig;

    const KIND: &'static str = "mode";
    const ROOT: &'static str = "mode";
    const EXT: &'static str = ext::MODE;
    const VERSION: &'static str = versions::MODE;

    fn decode(children: &[Element], name: &str, expected: Option<&str>) -> Result<ModeConfig> {
        let repair = Repair { kind: Self::KIND, name };
        let mut config = ModeConfig::new(name, ModeKind::View);

        for el in children {
            match el.name.as_str() {
                "name" => {
                    let unique = el
                        .attr("unique")
                        .ok_or_else(|| invalid(Self::KIND, name, "missing name/unique"))?;
                    check_declared_name(Self::KIND, unique, expected)?;
                    config.name = unique.to_string();

                    if let Some(includes) = el.attr("includes") {
                        let other_names: BTreeSet<String> = includes
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(String::from)
                            .collect();
                        if other_names.is_empty() {
                            return Err(invalid(Self::KIND, name, "includes names no modes"));
                        }
                        config.other_names = other_names;
                    }
                }
                "kind" => {
                    let value = el.attr("type").unwrap_or_default();
                    config.kind = ModeKind::parse(value).unwrap_or_else(|| {
                        repair.warn("kind/type", value);
                        ModeKind::View
                    });
                }
                "slidingSide" => {
                    let value = el.attr("side").unwrap_or_default();
                    config.side = Some(Side::parse(value).unwrap_or_else(|| {
                        repair.warn("slidingSide/side", value);
                        Side::Left
                    }));
                }
                "slide-in-size" => {
                    let size = el.attr("size").and_then(|s| s.trim().parse::<i32>().ok());
                    match (el.attr("tc-id"), size) {
                        (Some(tc_id), Some(size)) => {
                            config.slide_in_sizes.insert(tc_id.to_string(), size);
                        }
                        _ => repair.warn("slide-in-size", el.attr("size").unwrap_or_default()),
                    }
                }
                "state" => {
                    let value = el.attr("type").unwrap_or_default();
                    config.state = ModeState::parse(value).unwrap_or_else(|| {
                        repair.warn("state/type", value);
                        ModeState::Joined
                    });
                    config.minimized = repair.bool(el, "minimized", false);
                }
                "path" if el.is_child_of("constraints") => {
                    config.constraints.push(decode_path(&repair, el));
                }
                "bounds" => config.bounds = repair.rect(el),
                "relative-bounds" => config.relative_bounds = repair.rect(el),
                "frame" => {
                    config.frame_state = repair.int(el, "state", window_manager::FRAME_NORMAL)
                }
                "active-tc" => {
                    config.selected_tc_id = el.attr("id").filter(|s| !s.is_empty()).map(String::from);
                    config.previous_selected_tc_id =
                        el.attr("prev-id").filter(|s| !s.is_empty()).map(String::from);
                }
                "empty-behavior" => config.permanent = repair.bool(el, "permanent", false),
                _ => {}
            }
        }

        if config.kind == ModeKind::Sliding {
            if !config.other_names.is_empty() {
                return Err(invalid(Self::KIND, name, "sliding modes cannot include other modes"));
            }
            if config.minimized {
                return Err(invalid(Self::KIND, name, "sliding modes cannot be minimized"));
            }
            if config.side.is_none() {
                return Err(invalid(Self::KIND, name, "sliding modes need a side"));
            }
            if !config.permanent {
                debug!(mode = %config.name, "Anonymous sliding mode made permanent");
                config.permanent = true;
            }
        }
        Ok(config)
    }

    fn encode(config: &ModeConfig, w: &mut DocumentWriter) -> WriteResult {
        let mut name = vec![("unique", config.name.clone())];
        if !config.other_names.is_empty() {
            let includes: Vec<&str> = config.other_names.iter().map(String::as_str).collect();
            name.push(("includes", includes.join(",")));
        }
        w.empty("name", &name)?;
        w.empty("kind", &[("type", config.kind.as_str().to_string())])?;
        if let Some(side) = config.side {
            w.empty("slidingSide", &[("side", side.as_str().to_string())])?;
        }
        for (tc_id, size) in &config.slide_in_sizes {
            w.empty(
                "slide-in-size",
                &[("tc-id", tc_id.clone()), ("size", size.to_string())],
            )?;
        }
        w.empty(
            "state",
            &[
                ("type", config.state.as_str().to_string()),
                ("minimized", config.minimized.to_string()),
            ],
        )?;
        encode_constraints(w, &config.constraints)?;
        if let Some(bounds) = &config.bounds {
            w.empty("bounds", &rect_attrs(bounds))?;
        } else if let Some(bounds) = &config.relative_bounds {
            w.empty("relative-bounds", &rect_attrs(bounds))?;
        }
        w.empty("frame", &[("state", config.frame_state.to_string())])?;

        let mut active = Vec::new();
        if let Some(id) = config.selected_tc_id.as_ref().filter(|s| !s.is_empty()) {
            active.push(("id", id.clone()));
        }
        if let Some(id) = config.previous_selected_tc_id.as_ref().filter(|s| !s.is_empty()) {
            active.push(("prev-id", id.clone()));
        }
        if !active.is_empty() {
            w.empty("active-tc", &active)?;
        }
        w.empty("empty-behavior", &[("permanent", config.permanent.to_string())])
    }
}

/// Own attributes of a group; members are stored separately.
pub struct GroupAttributes;

impl EntryKind for GroupAttributes {
    type Config = GroupConfig;

    const KIND: &'static str = "group";
    const ROOT: &'static str = "group";
    const EXT: &'static str = ext::GROUP;
    const VERSION: &'static str = versions::GROUP;

    fn decode(children: &[Element], name: &str, expected: Option<&str>) -> Result<GroupConfig> {
        let repair = Repair { kind: Self::KIND, name };
        let mut config = GroupConfig::new(name);

        for el in children {
            match el.name.as_str() {
                "name" => {
                    let unique = el
                        .attr("unique")
                        .ok_or_else(|| invalid(Self::KIND, name, "missing name/unique"))?;
                    check_declared_name(Self::KIND, unique, expected)?;
                    config.name = unique.to_string();
                }
                "state" => config.opened = repair.bool(el, "opened", false),
                _ => {}
            }
        }
        Ok(config)
    }

    fn encode(config: &GroupConfig, w: &mut DocumentWriter) -> WriteResult {
        w.empty("name", &[("unique", config.name.clone())])?;
        w.empty("state", &[("opened", config.opened.to_string())])
    }
}

/// Window-manager properties; modes and groups are stored separately.
pub struct WindowManagerAttributes;

impl WindowManagerAttributes {
    fn decode_geometry(repair: &Repair<'_>, el: &Element) -> MainWindowGeometry {
        let d = MainWindowGeometry::default();
        MainWindowGeometry {
            x: repair.int(el, "x", d.x),
            y: repair.int(el, "y", d.y),
            width: repair.int(el, "width", d.width),
            height: repair.int(el, "height", d.height),
            relative_x: repair.float(el, "relative-x", d.relative_x),
            relative_y: repair.float(el, "relative-y", d.relative_y),
            relative_width: repair.float(el, "relative-width", d.relative_width),
            relative_height: repair.float(el, "relative-height", d.relative_height),
            centered_horizontally: repair.bool(el, "centered-horizontally", false),
            centered_vertically: repair.bool(el, "centered-vertically", false),
            maximize_if_width_below: repair.int(el, "maximize-if-width-below", d.maximize_if_width_below),
            maximize_if_height_below: repair.int(el, "maximize-if-height-below", d.maximize_if_height_below),
            frame_state: repair.int(el, "frame-state", d.frame_state),
        }
    }

    fn encode_geometry(w: &mut DocumentWriter, name: &str, g: &MainWindowGeometry) -> WriteResult {
        w.empty(
            name,
            &[
                ("x", g.x.to_string()),
                ("y", g.y.to_string()),
                ("width", g.width.to_string()),
                ("height", g.height.to_string()),
                ("relative-x", g.relative_x.to_string()),
                ("relative-y", g.relative_y.to_string()),
                ("relative-width", g.relative_width.to_string()),
                ("relative-height", g.relative_height.to_string()),
                ("centered-horizontally", g.centered_horizontally.to_string()),
                ("centered-vertically", g.centered_vertically.to_string()),
                ("maximize-if-width-below", g.maximize_if_width_below.to_string()),
                ("maximize-if-height-below", g.maximize_if_height_below.to_string()),
                ("frame-state", g.frame_state.to_string()),
            ],
        )
    }
}

impl EntryKind for WindowManagerAttributes {
    type Config = WindowManagerConfig;

    const KIND: &'static str = "window-manager";
    const ROOT: &'static str = "windowmanager";
    const EXT: &'static str = ext::WINDOW_MANAGER;
    const VERSION: &'static str = versions::WINDOW_MANAGER;

    fn decode(children: &[Element], name: &str, _expected: Option<&str>) -> Result<WindowManagerConfig> {
        let repair = Repair { kind: Self::KIND, name };
        let mut config = WindowManagerConfig::default();

        for el in children {
            match el.name.as_str() {
                "joined-properties" => config.joined = Self::decode_geometry(&repair, el),
                "separated-properties" => config.separated = Self::decode_geometry(&repair, el),
                "editor-area" => {
                    let state = match el.attr("state") {
                        Some("separated") => EditorAreaState::Separated,
                        Some("joined") | None => EditorAreaState::Joined,
                        Some(other) => {
                            repair.warn("editor-area/state", other);
                            EditorAreaState::Joined
                        }
                    };
                    config.editor_area = EditorAreaConfig {
                        state,
                        frame_state: repair.int(el, "frame-state", window_manager::FRAME_NORMAL),
                        ..EditorAreaConfig::default()
                    };
                }
                "path" if el.is_child_of("constraints") => {
                    config.editor_area.constraints.push(decode_path(&repair, el));
                }
                "bounds" if el.is_child_of("editor-area") => {
                    config.editor_area.bounds = repair.rect(el);
                }
                "relative-bounds" if el.is_child_of("editor-area") => {
                    config.editor_area.relative_bounds = repair.rect(el);
                }
                "screen" => {
                    let width = repair.int(el, "width", -1);
                    let height = repair.int(el, "height", -1);
                    config.screen_size = (width >= 0 && height >= 0).then_some((width, height));
                }
                "active-mode" => {
                    config.active_mode = el.attr("name").filter(|s| !s.is_empty()).map(String::from);
                }
                "maximized-mode" => {
                    config.editor_maximized_mode =
                        el.attr("editor").filter(|s| !s.is_empty()).map(String::from);
                    config.view_maximized_mode =
                        el.attr("view").filter(|s| !s.is_empty()).map(String::from);
                }
                "toolbar" => {
                    config.toolbar_configuration =
                        el.attr("configuration").filter(|s| !s.is_empty()).map(String::from);
                    let size = repair.int(el, "preferred-icon-size", window_manager::LARGE_ICON_SIZE);
                    config.preferred_toolbar_icon_size =
                        if size == window_manager::SMALL_ICON_SIZE || size == window_manager::LARGE_ICON_SIZE {
                            size
                        } else {
                            repair.warn("toolbar/preferred-icon-size", &size.to_string());
                            window_manager::LARGE_ICON_SIZE
                        };
                }
                "tc-id" if el.is_child_of("tc-list") => match el.attr("id") {
                    Some(id) if !id.is_empty() => config.recent_view_list.push(id.to_string()),
                    _ => repair.warn("tc-list/tc-id/id", ""),
                },
                _ => {}
            }
        }
        Ok(config)
    }

    fn encode(config: &WindowManagerConfig, w: &mut DocumentWriter) -> WriteResult {
        w.start("main-window", &[])?;
        Self::encode_geometry(w, "joined-properties", &config.joined)?;
        Self::encode_geometry(w, "separated-properties", &config.separated)?;
        w.end("main-window")?;

        let area = &config.editor_area;
        let state = match area.state {
            EditorAreaState::Joined => "joined",
            EditorAreaState::Separated => "separated",
        };
        w.start(
            "editor-area",
            &[
                ("state", state.to_string()),
                ("frame-state", area.frame_state.to_string()),
            ],
        )?;
        encode_constraints(w, &area.constraints)?;
        if let Some(bounds) = &area.bounds {
            w.empty("bounds", &rect_attrs(bounds))?;
        } else if let Some(bounds) = &area.relative_bounds {
            w.empty("relative-bounds", &rect_attrs(bounds))?;
        }
        w.end("editor-area")?;

        if let Some((width, height)) = config.screen_size {
            w.empty(
                "screen",
                &[("width", width.to_string()), ("height", height.to_string())],
            )?;
        }
        if let Some(mode) = &config.active_mode {
            w.empty("active-mode", &[("name", mode.clone())])?;
        }
        let mut maximized = Vec::new();
        if let Some(mode) = &config.editor_maximized_mode {
            maximized.push(("editor", mode.clone()));
        }
        if let Some(mode) = &config.view_maximized_mode {
            maximized.push(("view", mode.clone()));
        }
        if !maximized.is_empty() {
            w.empty("maximized-mode", &maximized)?;
        }

        let mut toolbar = Vec::new();
        if let Some(configuration) = &config.toolbar_configuration {
            toolbar.push(("configuration", configuration.clone()));
        }
        toolbar.push((
            "preferred-icon-size",
            config.preferred_toolbar_icon_size.to_string(),
        ));
        w.empty("toolbar", &toolbar)?;

        w.start("tc-list", &[])?;
        for id in &config.recent_view_list {
            w.empty("tc-id", &[("id", id.clone())])?;
        }
        w.end("tc-list")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{decode_document, encode_document};

    fn roundtrip<K: EntryKind>(config: &K::Config, name: &str) -> K::Config {
        let xml = encode_document::<K>(config, None, name).unwrap();
        decode_document::<K>(&xml, name, true).unwrap().0
    }

    #[test]
    fn test_mode_document() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <mode version="2.4">
                <module name="org.example.ide/1" spec="1.2"/>
                <name unique="explorer" includes=" navigator , ,files"/>
                <kind type="view"/>
                <state type="separated" minimized="true"/>
                <constraints>
                    <path orientation="horizontal" number="20" weight="0.3"/>
                    <path orientation="diagonal" number="x"/>
                </constraints>
                <bounds x="1" y="2" width="300" height="400"/>
                <frame state="6"/>
                <active-tc id="projects" prev-id=""/>
                <empty-behavior permanent="true"/>
            </mode>"#;
        let (mode, header) = decode_document::<ModeAttributes>(xml, "explorer", true).unwrap();

        assert_eq!(header.module.unwrap().code_name(), "org.example.ide/1");
        let names: Vec<_> = mode.other_names.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["files", "navigator"]);
        assert_eq!(mode.state, ModeState::Separated);
        assert!(mode.minimized);
        assert_eq!(
            mode.constraints,
            vec![
                SplitConstraint::new(Orientation::Horizontal, 20, 0.3),
                SplitConstraint::new(Orientation::Vertical, 0, 0.5),
            ]
        );
        assert_eq!(mode.bounds, Some(Rect::new(1, 2, 300, 400)));
        assert_eq!(mode.frame_state, 6);
        assert_eq!(mode.selected_tc_id.as_deref(), Some("projects"));
        assert_eq!(mode.previous_selected_tc_id, None);
        assert!(mode.permanent);
    }

    #[test]
    fn test_mode_name_mismatch() {
        let xml = r#"<mode version="2.4"><name unique="output"/></mode>"#;
        let err = decode_document::<ModeAttributes>(xml, "explorer", true).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidReference { .. }));

        // Not tied to a file
        let (mode, _) = decode_document::<ModeAttributes>(xml, "explorer", false).unwrap();
        assert_eq!(mode.name, "output");
    }

    #[test]
    fn test_mode_empty_includes_rejected() {
        let xml = r#"<mode version="2.4"><name unique="m" includes=" , "/></mode>"#;
        let err = decode_document::<ModeAttributes>(xml, "m", true).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidEntity { .. }));
    }

    #[test]
    fn test_sliding_validation() {
        let aliased = r#"<mode version="2.4"><name unique="s" includes="a"/><kind type="sliding"/></mode>"#;
        assert!(decode_document::<ModeAttributes>(aliased, "s", true).is_err());

        let minimized = r#"<mode version="2.4"><name unique="s"/><kind type="sliding"/><state type="joined" minimized="true"/></mode>"#;
        assert!(decode_document::<ModeAttributes>(minimized, "s", true).is_err());

        let sideless = r#"<mode version="2.4"><name unique="s"/><kind type="sliding"/><state type="joined"/></mode>"#;
        assert!(decode_document::<ModeAttributes>(sideless, "s", true).is_err());

        let anonymous = r#"<mode version="2.4"><name unique="s"/><kind type="sliding"/><slidingSide side="up"/></mode>"#;
        let (mode, _) = decode_document::<ModeAttributes>(anonymous, "s", true).unwrap();
        assert_eq!(mode.side, Some(Side::Left));
        assert!(mode.permanent);
    }

    #[test]
    fn test_mode_invalid_kind_falls_back() {
        let xml = r#"<mode version="2.4"><name unique="m"/><kind type="floating"/></mode>"#;
        let (mode, _) = decode_document::<ModeAttributes>(xml, "m", true).unwrap();
        assert_eq!(mode.kind, ModeKind::View);
    }

    #[test]
    fn test_mode_roundtrip() {
        let mut mode = ModeConfig::new("rightSlidingSide", ModeKind::Sliding);
        mode.side = Some(Side::Right);
        mode.permanent = true;
        mode.slide_in_sizes.insert("output".into(), 250);
        mode.constraints = vec![SplitConstraint::new(Orientation::Horizontal, 1, 0.25)];
        mode.relative_bounds = Some(Rect::new(10, 10, 50, 50));
        mode.selected_tc_id = Some("output".into());
        assert_eq!(roundtrip::<ModeAttributes>(&mode, "rightSlidingSide"), mode);
    }

    #[test]
    fn test_tc_ref_document() {
        let xml = r#"<tc-ref version="2.2">
                <tc-id id="output"/>
                <state opened="maybe"/>
                <previousMode name="editor" index="-1"/>
                <docking-status maximized-mode="true" default-mode="false"/>
                <slide-in-status maximized-mode="true"/>
            </tc-ref>"#;
        let (tc_ref, _) = decode_document::<TcRefEntry>(xml, "output", true).unwrap();
        assert!(!tc_ref.opened);
        assert_eq!(tc_ref.previous_mode.as_deref(), Some("editor"));
        assert_eq!(tc_ref.previous_index, None);
        assert!(tc_ref.docked_in_maximized);
        assert!(!tc_ref.docked_in_default);
        assert!(tc_ref.slid_in_maximized);

        let mismatch = r#"<tc-ref version="2.2"><tc-id id="other"/></tc-ref>"#;
        assert!(matches!(
            decode_document::<TcRefEntry>(mismatch, "output", true),
            Err(PersistenceError::InvalidReference { .. })
        ));
    }

    #[test]
    fn test_tc_ref_roundtrip() {
        let mut tc_ref = TcRefConfig::new("output").opened(true);
        tc_ref.previous_mode = Some("editor".into());
        tc_ref.previous_index = Some(3);
        assert_eq!(roundtrip::<TcRefEntry>(&tc_ref, "output"), tc_ref);
    }

    #[test]
    fn test_group_roundtrip() {
        let mut group = GroupConfig::new("debugger");
        group.opened = true;
        assert_eq!(roundtrip::<GroupAttributes>(&group, "debugger"), group);

        let mut member = TcGroupConfig::new("watches");
        member.open = true;
        member.was_opened = true;
        assert_eq!(roundtrip::<TcGroupEntry>(&member, "watches"), member);
    }

    #[test]
    fn test_window_manager_document() {
        let xml = r#"<windowmanager version="2.1">
                <main-window>
                    <joined-properties x="10" y="20" width="800" height="600" centered-horizontally="true"/>
                </main-window>
                <editor-area state="separated" frame-state="6">
                    <constraints><path orientation="horizontal" number="1" weight="0.7"/></constraints>
                    <relative-bounds x="0" y="0" width="50" height="100"/>
                </editor-area>
                <screen width="1920" height="1080"/>
                <active-mode name="editor"/>
                <maximized-mode view="output"/>
                <toolbar configuration="Standard" preferred-icon-size="20"/>
                <tc-list><tc-id id="a"/><tc-id id=""/><tc-id id="b"/></tc-list>
            </windowmanager>"#;
        let (wm, _) = decode_document::<WindowManagerAttributes>(xml, "WindowManager", true).unwrap();

        assert_eq!(wm.joined.width, 800);
        assert_eq!(wm.joined.relative_x, -1.0);
        assert!(wm.joined.centered_horizontally);
        assert_eq!(wm.separated, MainWindowGeometry::default());
        assert_eq!(wm.editor_area.state, EditorAreaState::Separated);
        assert_eq!(wm.editor_area.frame_state, 6);
        assert_eq!(wm.editor_area.constraints.len(), 1);
        assert_eq!(wm.editor_area.relative_bounds, Some(Rect::new(0, 0, 50, 100)));
        assert_eq!(wm.screen_size, Some((1920, 1080)));
        assert_eq!(wm.active_mode.as_deref(), Some("editor"));
        assert_eq!(wm.editor_maximized_mode, None);
        assert_eq!(wm.view_maximized_mode.as_deref(), Some("output"));
        assert_eq!(wm.preferred_toolbar_icon_size, 24);
        assert_eq!(wm.recent_view_list, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_window_manager_roundtrip() {
        let mut wm = WindowManagerConfig::default();
        wm.joined.x = 5;
        wm.joined.relative_width = 0.75;
        wm.separated.maximize_if_height_below = 400;
        wm.editor_area.bounds = Some(Rect::new(0, 0, 640, 480));
        wm.screen_size = Some((1280, 1024));
        wm.active_mode = Some("editor".into());
        wm.toolbar_configuration = Some("Debugging".into());
        wm.preferred_toolbar_icon_size = 16;
        wm.recent_view_list = vec!["output".into()];
        assert_eq!(roundtrip::<WindowManagerAttributes>(&wm, "WindowManager"), wm);
    }
}
