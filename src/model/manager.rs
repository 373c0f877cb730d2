use serde::{Deserialize, Serialize};

use super::{GroupConfig, ModeConfig, Rect, SplitConstraint};
use crate::constants::window_manager::{FRAME_NORMAL, LARGE_ICON_SIZE};

/// Main-window placement for one display state.
///
/// `-1` marks an unknown pixel value, the same convention the layout files use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainWindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub relative_x: f64,
    pub relative_y: f64,
    pub relative_width: f64,
    pub relative_height: f64,
    pub centered_horizontally: bool,
    pub centered_vertically: bool,
    pub maximize_if_width_below: i32,
    pub maximize_if_height_below: i32,
    pub frame_state: i32,
}

impl Default for MainWindowGeometry {
    fn default() -> Self {
        Self {
            x: -1,
            y: -1,
            width: -1,
            height: -1,
            relative_x: -1.0,
            relative_y: -1.0,
            relative_width: -1.0,
            relative_height: -1.0,
            centered_horizontally: false,
            centered_vertically: false,
            maximize_if_width_below: -1,
            maximize_if_height_below: -1,
            frame_state: FRAME_NORMAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorAreaState {
    #[default]
    Joined,
    Separated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorAreaConfig {
    #[serde(default)]
    pub state: EditorAreaState,

    #[serde(default)]
    pub frame_state: i32,

    /// Position of the editor area in the split tree
    #[serde(default)]
    pub constraints: Vec<SplitConstraint>,

    #[serde(default)]
    pub bounds: Option<Rect>,

    #[serde(default)]
    pub relative_bounds: Option<Rect>,
}

impl Default for EditorAreaConfig {
    fn default() -> Self {
        Self {
            state: EditorAreaState::Joined,
            frame_state: FRAME_NORMAL,
            constraints: Vec::new(),
            bounds: None,
            relative_bounds: None,
        }
    }
}

/// Root of the layout model.
///
/// Equality compares modes and groups by name, ignoring their storage order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowManagerConfig {
    #[serde(default)]
    pub joined: MainWindowGeometry,

    #[serde(default)]
    pub separated: MainWindowGeometry,

    #[serde(default)]
    pub editor_area: EditorAreaConfig,

    /// Screen size the layout was saved on, as (width, height)
    #[serde(default)]
    pub screen_size: Option<(i32, i32)>,

    #[serde(default)]
    pub active_mode: Option<String>,

    #[serde(default)]
    pub editor_maximized_mode: Option<String>,

    #[serde(default)]
    pub view_maximized_mode: Option<String>,

    #[serde(default)]
    pub toolbar_configuration: Option<String>,

    #[serde(default = "default_icon_size")]
    pub preferred_toolbar_icon_size: i32,

    /// Recently viewed components, most recent last
    #[serde(default)]
    pub recent_view_list: Vec<String>,

    #[serde(default)]
    pub modes: Vec<ModeConfig>,

    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

fn default_icon_size() -> i32 {
    LARGE_ICON_SIZE
}

impl Default for WindowManagerConfig {
    fn default() -> Self {
        Self {
            joined: MainWindowGeometry::default(),
            separated: MainWindowGeometry::default(),
            editor_area: EditorAreaConfig::default(),
            screen_size: None,
            active_mode: None,
            editor_maximized_mode: None,
            view_maximized_mode: None,
            toolbar_configuration: None,
            preferred_toolbar_icon_size: LARGE_ICON_SIZE,
            recent_view_list: Vec::new(),
            modes: Vec::new(),
            groups: Vec::new(),
        }
    }
}

impl WindowManagerConfig {
    pub fn mode(&self, name: &str) -> Option<&ModeConfig> {
        self.modes.iter().find(|m| m.name == name)
    }

    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Every component id the layout refers to, in first-seen order.
    pub fn referenced_ids(&self) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        let mut ids = Vec::new();
        let mut push = |id: &str| {
            if !id.is_empty() && seen.insert(id.to_string()) {
                ids.push(id.to_string());
            }
        };

        for mode in &self.modes {
            for tc_id in mode.tc_ids() {
                push(tc_id);
            }
            if let Some(id) = &mode.selected_tc_id {
                push(id);
            }
            if let Some(id) = &mode.previous_selected_tc_id {
                push(id);
            }
        }
        for group in &self.groups {
            for member in &group.tc_groups {
                push(&member.tc_id);
            }
        }
        for id in &self.recent_view_list {
            push(id);
        }
        ids
    }

    /// Remove `tc_id` from every mode, group and the recent-view list.
    pub fn purge(&mut self, tc_id: &str) -> bool {
        let mut changed = false;
        for mode in &mut self.modes {
            changed |= mode.purge(tc_id);
        }
        for group in &mut self.groups {
            changed |= group.purge(tc_id);
        }
        let before = self.recent_view_list.len();
        self.recent_view_list.retain(|id| id != tc_id);
        changed | (before != self.recent_view_list.len())
    }
}

impl PartialEq for WindowManagerConfig {
    fn eq(&self, other: &Self) -> bool {
        fn same_by_name<T: PartialEq>(a: &[T], b: &[T], name: impl Fn(&T) -> &str) -> bool {
            a.len() == b.len()
                && a.iter().all(|x| b.iter().any(|y| name(x) == name(y) && x == y))
        }

        self.joined == other.joined
            && self.separated == other.separated
            && self.editor_area == other.editor_area
            && self.screen_size == other.screen_size
            && self.active_mode == other.active_mode
            && self.editor_maximized_mode == other.editor_maximized_mode
            && self.view_maximized_mode == other.view_maximized_mode
            && self.toolbar_configuration == other.toolbar_configuration
            && self.preferred_toolbar_icon_size == other.preferred_toolbar_icon_size
            && self.recent_view_list == other.recent_view_list
            && same_by_name(&self.modes, &other.modes, |m| m.name.as_str())
            && same_by_name(&self.groups, &other.groups, |g| g.name.as_str())
    }
}
