use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use tracing::{debug, info, warn};

use super::entry::EntryParser;
use super::group::GroupParser;
use super::kinds::WindowManagerAttributes;
use super::mode::ModeParser;
use super::{Context, members};
use crate::constants::{ext, folders};
use crate::error::{PersistenceError, Result};
use crate::model::{GroupConfig, ModeConfig, TcGroupConfig, TcRefConfig, WindowManagerConfig};
use crate::modules::{ModuleInfo, accept};

/// Root aggregator: the window-manager properties plus every mode and group.
pub struct WindowManagerParser {
    entry: EntryParser<WindowManagerAttributes>,
    modes: BTreeMap<String, ModeParser>,
    groups: BTreeMap<String, GroupParser>,
}

fn log_rejection(kind: &'static str, name: &str, module: Option<&ModuleInfo>) {
    let err = PersistenceError::ExtensionUnavailable {
        kind,
        name: name.to_string(),
        module: module.map(ToString::to_string).unwrap_or_default(),
    };
    info!("{err}, dropping it");
}

impl WindowManagerParser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            entry: EntryParser::new(name, ""),
            modes: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn mode_parser(&self, name: &str) -> Option<&ModeParser> {
        self.modes.get(name)
    }

    pub fn group_parser(&self, name: &str) -> Option<&GroupParser> {
        self.groups.get(name)
    }

    /// Load the whole layout.
    ///
    /// Missing or unreadable properties fall back to defaults; modes and groups
    /// that fail to load are left out.
    pub fn load(&mut self, ctx: &Context<'_>) -> Result<WindowManagerConfig> {
        let path = self.entry.path();
        self.entry.set_in_module(ctx.module.exists(&path));
        self.entry.set_in_local(ctx.local.exists(&path));

        let mut config = match self.entry.load(ctx) {
            Ok(config) => config,
            Err(e) if e.is_not_found() => {
                info!(name = %self.name(), "No window manager properties, using defaults");
                WindowManagerConfig::default()
            }
            Err(e) => {
                warn!(name = %self.name(), error = %e, "Unreadable window manager properties, using defaults");
                WindowManagerConfig::default()
            }
        };

        config.modes = self.load_modes(ctx);
        config.groups = self.load_groups(ctx);
        for id in config.referenced_ids() {
            ctx.identities.mark_used(&id);
        }
        info!(
            modes = config.modes.len(),
            groups = config.groups.len(),
            "Window system loaded"
        );
        Ok(config)
    }

    /// Component ids stored in any local mode folder
    fn masked_tc_refs(ctx: &Context<'_>) -> HashSet<String> {
        members::nested_names(ctx.local, Path::new(folders::MODES), ext::TC_REF).unwrap_or_else(|e| {
            warn!(error = %e, "Cannot scan local mode folders");
            HashSet::new()
        })
    }

    fn load_modes(&mut self, ctx: &Context<'_>) -> Vec<ModeConfig> {
        let found = match members::discover(ctx, Path::new(folders::MODES), ext::MODE) {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Cannot list modes");
                return Vec::new();
            }
        };
        let masked = Self::masked_tc_refs(ctx);

        self.modes.retain(|name, _| found.contains_key(name));
        let mut loaded = Vec::with_capacity(found.len());
        let mut rejected = Vec::new();
        for (name, presence) in found {
            let parser = self
                .modes
                .entry(name.clone())
                .or_insert_with(|| ModeParser::new(name.clone()));
            parser.set_in_module(presence.in_module);
            parser.set_in_local(presence.in_local);

            match parser.load(ctx, &masked) {
                Ok(mode) if accept(ctx.extensions, parser.module()).is_accepted() => loaded.push(mode),
                Ok(_) => {
                    log_rejection("mode", &name, parser.module());
                    rejected.push(name);
                }
                Err(e) => warn!(mode = %name, error = %e, "Cannot load mode, skipped"),
            }
        }

        for name in rejected {
            if let Some(mut parser) = self.modes.remove(&name) {
                parser.delete_local(ctx);
            }
        }
        self.merge_aliases(loaded)
    }

    /// Fold every mode named in another mode's `other_names` into that mode.
    fn merge_aliases(&mut self, mut modes: Vec<ModeConfig>) -> Vec<ModeConfig> {
        let claims: Vec<(String, Vec<String>)> = modes
            .iter()
            .filter(|m| !m.other_names.is_empty())
            .map(|m| (m.name.clone(), m.other_names.iter().cloned().collect()))
            .collect();

        for (owner, aliases) in claims {
            for alias in aliases {
                if alias == owner {
                    continue;
                }
                let Some(pos) = modes.iter().position(|m| m.name == alias) else {
                    continue;
                };
                let absorbed = modes.remove(pos);
                self.modes.remove(&alias);

                let Some(target) = modes.iter_mut().find(|m| m.name == owner) else {
                    continue;
                };
                for tc_ref in absorbed.tc_refs {
                    if !target.contains(&tc_ref.tc_id) {
                        target.tc_refs.push(tc_ref);
                    }
                }
                debug!(mode = %owner, alias = %alias, "Merged aliased mode");
            }
        }
        modes
    }

    fn load_groups(&mut self, ctx: &Context<'_>) -> Vec<GroupConfig> {
        let found = match members::discover(ctx, Path::new(folders::GROUPS), ext::GROUP) {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Cannot list groups");
                return Vec::new();
            }
        };

        self.groups.retain(|name, _| found.contains_key(name));
        let mut loaded = Vec::with_capacity(found.len());
        let mut rejected = Vec::new();
        for (name, presence) in found {
            let parser = self
                .groups
                .entry(name.clone())
                .or_insert_with(|| GroupParser::new(name.clone()));
            parser.set_in_module(presence.in_module);
            parser.set_in_local(presence.in_local);

            match parser.load(ctx) {
                Ok(group) if accept(ctx.extensions, parser.module()).is_accepted() => loaded.push(group),
                Ok(_) => {
                    log_rejection("group", &name, parser.module());
                    rejected.push(name);
                }
                Err(e) => warn!(group = %name, error = %e, "Cannot load group, skipped"),
            }
        }

        for name in rejected {
            if let Some(mut parser) = self.groups.remove(&name) {
                parser.delete_local(ctx);
            }
        }
        loaded
    }

    /// Save properties, then modes, then groups.
    ///
    /// Modes and groups absent from `config` lose their local files.
    pub fn save(&mut self, ctx: &Context<'_>, config: &WindowManagerConfig) -> Result<()> {
        self.entry.save(ctx, config)?;
        self.save_modes(ctx, &config.modes)?;
        self.save_groups(ctx, &config.groups)?;
        info!(
            modes = config.modes.len(),
            groups = config.groups.len(),
            "Window system saved"
        );
        Ok(())
    }

    fn save_modes(&mut self, ctx: &Context<'_>, modes: &[ModeConfig]) -> Result<()> {
        let wanted: HashSet<&str> = modes.iter().map(|m| m.name.as_str()).collect();
        let obsolete: Vec<String> = self
            .modes
            .keys()
            .filter(|name| !wanted.contains(name.as_str()))
            .cloned()
            .collect();
        for name in obsolete {
            if let Some(mut parser) = self.modes.remove(&name) {
                debug!(mode = %name, "Deleting obsolete mode");
                parser.delete_local(ctx);
            }
        }

        for mode in modes {
            self.modes
                .entry(mode.name.clone())
                .or_insert_with(|| ModeParser::new(mode.name.clone()))
                .save(ctx, mode)?;
        }
        Ok(())
    }

    fn save_groups(&mut self, ctx: &Context<'_>, groups: &[GroupConfig]) -> Result<()> {
        let wanted: HashSet<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        let obsolete: Vec<String> = self
            .groups
            .keys()
            .filter(|name| !wanted.contains(name.as_str()))
            .cloned()
            .collect();
        for name in obsolete {
            if let Some(mut parser) = self.groups.remove(&name) {
                debug!(group = %name, "Deleting obsolete group");
                parser.delete_local(ctx);
            }
        }

        for group in groups {
            self.groups
                .entry(group.name.clone())
                .or_insert_with(|| GroupParser::new(group.name.clone()))
                .save(ctx, group)?;
        }
        Ok(())
    }

    /// Load a mode that appeared in the module layer.
    pub fn add_mode(&mut self, ctx: &Context<'_>, name: &str) -> Option<ModeConfig> {
        let masked = Self::masked_tc_refs(ctx);
        let parser = self
            .modes
            .entry(name.to_string())
            .or_insert_with(|| ModeParser::new(name));
        parser.set_in_module(true);
        parser.set_in_local(ctx.local.exists(&parser.path()));

        match parser.load(ctx, &masked) {
            Ok(mode) if accept(ctx.extensions, parser.module()).is_accepted() => Some(mode),
            Ok(_) => {
                log_rejection("mode", name, parser.module());
                None
            }
            Err(e) => {
                warn!(mode = %name, error = %e, "Cannot load added mode");
                None
            }
        }
    }

    /// The module layer no longer provides `name`; local files are kept.
    pub fn remove_mode(&mut self, name: &str) {
        match self.modes.get_mut(name) {
            Some(parser) => parser.set_in_module(false),
            None => debug!(mode = %name, "Removed mode is not known"),
        }
    }

    /// Load a group that appeared in the module layer, replacing any parser
    /// of the same name.
    pub fn add_group(&mut self, ctx: &Context<'_>, name: &str) -> Option<GroupConfig> {
        let mut parser = GroupParser::new(name);
        parser.set_in_module(true);
        parser.set_in_local(ctx.local.exists(&parser.path()));

        match parser.load(ctx) {
            Ok(group) if accept(ctx.extensions, parser.module()).is_accepted() => {
                self.groups.insert(name.to_string(), parser);
                Some(group)
            }
            Ok(_) => {
                log_rejection("group", name, parser.module());
                None
            }
            Err(e) => {
                warn!(group = %name, error = %e, "Cannot load added group");
                None
            }
        }
    }

    /// Forget a group and delete its local files.
    pub fn remove_group(&mut self, ctx: &Context<'_>, name: &str) {
        if let Some(mut parser) = self.groups.remove(name) {
            parser.delete_local(ctx);
        }
    }

    pub fn add_tc_ref(&mut self, ctx: &Context<'_>, mode: &str, tc_id: &str) -> Option<TcRefConfig> {
        match self.modes.get_mut(mode) {
            Some(parser) => parser.add_tc_ref(ctx, tc_id),
            None => {
                warn!(mode = %mode, tc_id, "Cannot add reference to unknown mode");
                None
            }
        }
    }

    /// Remove `tc_id` from whichever mode holds it.
    pub fn remove_tc_ref(&mut self, ctx: &Context<'_>, tc_id: &str) -> bool {
        match self.modes.values_mut().find(|p| p.contains_tc_ref(tc_id)) {
            Some(parser) => parser.remove_tc_ref(ctx, tc_id),
            None => {
                debug!(tc_id, "Removed reference is not in any mode");
                false
            }
        }
    }

    pub fn add_tc_group(&mut self, ctx: &Context<'_>, group: &str, tc_id: &str) -> Option<TcGroupConfig> {
        match self.groups.get_mut(group) {
            Some(parser) => parser.add_tc_group(ctx, tc_id),
            None => {
                warn!(group = %group, tc_id, "Cannot add membership to unknown group");
                None
            }
        }
    }

    pub fn remove_tc_group(&mut self, ctx: &Context<'_>, group: &str, tc_id: &str) -> bool {
        self.groups
            .get_mut(group)
            .is_some_and(|parser| parser.remove_tc_group(ctx, tc_id))
    }

    /// Mode parser currently holding `tc_id`
    pub fn find_mode_parser(&self, tc_id: &str) -> Option<&ModeParser> {
        self.modes.values().find(|p| p.contains_tc_ref(tc_id))
    }

    /// Every mode of `config` serialized as it would be saved.
    pub fn mode_config_xmls(&self, config: &WindowManagerConfig) -> Result<Vec<String>> {
        config
            .modes
            .iter()
            .map(|mode| match self.modes.get(&mode.name) {
                Some(parser) => parser.to_xml(mode),
                None => ModeParser::new(mode.name.clone()).to_xml(mode),
            })
            .collect()
    }
}
