use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{Rect, SplitConstraint};
use crate::constants::window_manager::FRAME_NORMAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Editor,
    #[default]
    View,
    Sliding,
}

impl ModeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Editor => "editor",
            Self::View => "view",
            Self::Sliding => "sliding",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "editor" => Some(Self::Editor),
            "view" => Some(Self::View),
            "sliding" => Some(Self::Sliding),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeState {
    #[default]
    Joined,
    Separated,
}

impl ModeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Joined => "joined",
            Self::Separated => "separated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "joined" => Some(Self::Joined),
            "separated" => Some(Self::Separated),
            _ => None,
        }
    }
}

/// Edge a sliding mode is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }
}

/// A docking container and its ordered component references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    /// Unique name, also the storage key
    pub name: String,

    /// Names of other modes merged into this one on load
    #[serde(default)]
    pub other_names: BTreeSet<String>,

    #[serde(default)]
    pub kind: ModeKind,

    /// Only meaningful for sliding modes
    #[serde(default)]
    pub side: Option<Side>,

    #[serde(default)]
    pub state: ModeState,

    #[serde(default)]
    pub minimized: bool,

    #[serde(default)]
    pub constraints: Vec<SplitConstraint>,

    /// Absolute bounds; wins over `relative_bounds` when both are set
    #[serde(default)]
    pub bounds: Option<Rect>,

    #[serde(default)]
    pub relative_bounds: Option<Rect>,

    #[serde(default = "default_frame_state")]
    pub frame_state: i32,

    #[serde(default)]
    pub selected_tc_id: Option<String>,

    #[serde(default)]
    pub previous_selected_tc_id: Option<String>,

    #[serde(default)]
    pub permanent: bool,

    /// Preferred slide-in size per component, sliding modes only
    #[serde(default)]
    pub slide_in_sizes: BTreeMap<String, i32>,

    /// Order is significant
    #[serde(default)]
    pub tc_refs: Vec<TcRefConfig>,
}

fn default_frame_state() -> i32 {
    FRAME_NORMAL
}

impl ModeConfig {
    pub fn new(name: impl Into<String>, kind: ModeKind) -> Self {
        Self {
            name: name.into(),
            other_names: BTreeSet::new(),
            kind,
            side: None,
            state: ModeState::Joined,
            minimized: false,
            constraints: Vec::new(),
            bounds: None,
            relative_bounds: None,
            frame_state: FRAME_NORMAL,
            selected_tc_id: None,
            previous_selected_tc_id: None,
            permanent: false,
            slide_in_sizes: BTreeMap::new(),
            tc_refs: Vec::new(),
        }
    }

    pub fn contains(&self, tc_id: &str) -> bool {
        self.tc_refs.iter().any(|r| r.tc_id == tc_id)
    }

    pub fn tc_ids(&self) -> impl Iterator<Item = &str> {
        self.tc_refs.iter().map(|r| r.tc_id.as_str())
    }

    /// Drop every trace of `tc_id` from this mode.
    ///
    /// Returns true when anything changed.
    pub fn purge(&mut self, tc_id: &str) -> bool {
        let before = self.tc_refs.len();
        self.tc_refs.retain(|r| r.tc_id != tc_id);
        let mut changed = before != self.tc_refs.len();

        if self.selected_tc_id.as_deref() == Some(tc_id) {
            self.selected_tc_id = None;
            changed = true;
        }
        if self.previous_selected_tc_id.as_deref() == Some(tc_id) {
            self.previous_selected_tc_id = None;
            changed = true;
        }
        changed |= self.slide_in_sizes.remove(tc_id).is_some();
        changed
    }
}

/// One component reference inside a mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcRefConfig {
    pub tc_id: String,

    #[serde(default)]
    pub opened: bool,

    /// Mode the component was in before it was slid or maximized
    #[serde(default)]
    pub previous_mode: Option<String>,

    #[serde(default)]
    pub previous_index: Option<u32>,

    #[serde(default)]
    pub docked_in_maximized: bool,

    #[serde(default = "default_true")]
    pub docked_in_default: bool,

    #[serde(default)]
    pub slid_in_maximized: bool,
}

fn default_true() -> bool {
    true
}

impl TcRefConfig {
    pub fn new(tc_id: impl Into<String>) -> Self {
        Self {
            tc_id: tc_id.into(),
            opened: false,
            previous_mode: None,
            previous_index: None,
            docked_in_maximized: false,
            docked_in_default: true,
            slid_in_maximized: false,
        }
    }

    pub fn opened(mut self, opened: bool) -> Self {
        self.opened = opened;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_clears_selection() {
        let mut mode = ModeConfig::new("explorer", ModeKind::View);
        mode.tc_refs = vec![TcRefConfig::new("a"), TcRefConfig::new("x")];
        mode.selected_tc_id = Some("x".into());
        mode.previous_selected_tc_id = Some("a".into());

        assert!(mode.purge("x"));
        assert_eq!(mode.tc_ids().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(mode.selected_tc_id, None);
        assert_eq!(mode.previous_selected_tc_id.as_deref(), Some("a"));
        assert!(!mode.purge("x"));
    }

    #[test]
    fn test_member_order_is_significant() {
        let mut a = ModeConfig::new("m", ModeKind::View);
        a.tc_refs = vec![TcRefConfig::new("a"), TcRefConfig::new("b")];
        let mut b = a.clone();
        b.tc_refs.reverse();
        assert_ne!(a, b);
    }

    #[test]
    fn test_enum_strings() {
        for kind in [ModeKind::Editor, ModeKind::View, ModeKind::Sliding] {
            assert_eq!(ModeKind::parse(kind.as_str()), Some(kind));
        }
        for side in [Side::Left, Side::Right, Side::Top, Side::Bottom] {
            assert_eq!(Side::parse(side.as_str()), Some(side));
        }
        assert_eq!(ModeState::parse("floating"), None);
    }
}
