use serde::{Deserialize, Serialize};

/// A named snapshot of components that open and close together.
///
/// Member order carries no meaning, so equality ignores it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,

    #[serde(default)]
    pub opened: bool,

    #[serde(default)]
    pub tc_groups: Vec<TcGroupConfig>,
}

impl GroupConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            opened: false,
            tc_groups: Vec::new(),
        }
    }

    pub fn purge(&mut self, tc_id: &str) -> bool {
        let before = self.tc_groups.len();
        self.tc_groups.retain(|g| g.tc_id != tc_id);
        before != self.tc_groups.len()
    }

    fn sorted_members(&self) -> Vec<&TcGroupConfig> {
        let mut members: Vec<_> = self.tc_groups.iter().collect();
        members.sort_by(|a, b| a.tc_id.cmp(&b.tc_id));
        members
    }
}

impl PartialEq for GroupConfig {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.opened == other.opened
            && self.sorted_members() == other.sorted_members()
    }
}

/// Group membership of one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcGroupConfig {
    pub tc_id: String,

    /// Open the component when the group is opened
    #[serde(default)]
    pub open: bool,

    /// Close the component when the group is closed
    #[serde(default)]
    pub close: bool,

    /// Component was open when the group was last closed
    #[serde(default)]
    pub was_opened: bool,
}

impl TcGroupConfig {
    pub fn new(tc_id: impl Into<String>) -> Self {
        Self {
            tc_id: tc_id.into(),
            open: false,
            close: false,
            was_opened: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_member_order() {
        let mut a = GroupConfig::new("debugging");
        a.tc_groups = vec![TcGroupConfig::new("x"), TcGroupConfig::new("y")];
        let mut b = a.clone();
        b.tc_groups.reverse();
        assert_eq!(a, b);

        b.tc_groups[0].open = true;
        assert_ne!(a, b);
    }
}
