use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::entry::EntryParser;
use super::kinds::{GroupAttributes, TcGroupEntry};
use super::{Context, members};
use crate::constants::{ext, folders};
use crate::error::Result;
use crate::model::{GroupConfig, TcGroupConfig};
use crate::modules::accept;
use crate::naming::escape_name;

/// Container parser for one group and its memberships.
///
/// Member order is not persisted.
pub struct GroupParser {
    entry: EntryParser<GroupAttributes>,
    members: BTreeMap<String, EntryParser<TcGroupEntry>>,
}

impl GroupParser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            entry: EntryParser::new(name, folders::GROUPS),
            members: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn is_in_module(&self) -> bool {
        self.entry.is_in_module()
    }

    pub fn set_in_module(&mut self, present: bool) {
        self.entry.set_in_module(present);
    }

    pub fn set_in_local(&mut self, present: bool) {
        self.entry.set_in_local(present);
    }

    pub fn module(&self) -> Option<&crate::modules::ModuleInfo> {
        self.entry.module()
    }

    pub fn path(&self) -> PathBuf {
        self.entry.path()
    }

    fn members_folder(&self) -> PathBuf {
        Path::new(folders::GROUPS).join(escape_name(self.name()))
    }

    pub fn load(&mut self, ctx: &Context<'_>) -> Result<GroupConfig> {
        let mut config = self.entry.load(ctx)?;
        let folder = self.members_folder();
        let found = members::discover(ctx, &folder, ext::TC_GROUP)?;

        self.members.retain(|name, _| found.contains_key(name));
        let group = self.name().to_string();
        for (name, presence) in found {
            let parser = self
                .members
                .entry(name.clone())
                .or_insert_with(|| EntryParser::new(name.clone(), folder.clone()));
            parser.set_in_module(presence.in_module);
            parser.set_in_local(presence.in_local);

            match parser.load(ctx) {
                Ok(member) if accept(ctx.extensions, parser.module()).is_accepted() => {
                    ctx.identities.mark_used(&member.tc_id);
                    config.tc_groups.push(member);
                }
                Ok(_) => {
                    info!(group = %group, tc_id = %name, "Owning module unavailable, dropping membership");
                    parser.delete_local(ctx);
                    self.members.remove(&name);
                }
                Err(e) => {
                    warn!(group = %group, tc_id = %name, error = %e, "Dropping unreadable membership");
                    parser.delete_local(ctx);
                    self.members.remove(&name);
                }
            }
        }
        debug!(group = %group, count = config.tc_groups.len(), "Group loaded");
        Ok(config)
    }

    pub fn save(&mut self, ctx: &Context<'_>, config: &GroupConfig) -> Result<()> {
        self.entry.save(ctx, config)?;

        let folder = self.members_folder();
        let wanted: HashSet<&str> = config.tc_groups.iter().map(|g| g.tc_id.as_str()).collect();
        let stale: Vec<String> = self
            .members
            .keys()
            .filter(|name| !wanted.contains(name.as_str()))
            .cloned()
            .collect();
        for name in stale {
            if let Some(mut parser) = self.members.remove(&name) {
                parser.delete_local(ctx);
            }
        }

        for member in &config.tc_groups {
            self.members
                .entry(member.tc_id.clone())
                .or_insert_with(|| EntryParser::new(member.tc_id.clone(), folder.clone()))
                .save(ctx, member)?;
        }
        Ok(())
    }

    /// Load one membership that appeared in the module layer.
    pub fn add_tc_group(&mut self, ctx: &Context<'_>, tc_id: &str) -> Option<TcGroupConfig> {
        let mut parser = EntryParser::<TcGroupEntry>::new(tc_id, self.members_folder());
        parser.set_in_module(true);
        parser.set_in_local(ctx.local.exists(&parser.path()));

        let member = match parser.load(ctx) {
            Ok(member) => member,
            Err(e) => {
                warn!(group = %self.name(), tc_id, error = %e, "Cannot load added membership");
                return None;
            }
        };
        if !accept(ctx.extensions, parser.module()).is_accepted() {
            info!(group = %self.name(), tc_id, "Owning module unavailable, ignoring added membership");
            return None;
        }
        ctx.identities.mark_used(&member.tc_id);
        self.members.insert(tc_id.to_string(), parser);
        Some(member)
    }

    pub fn remove_tc_group(&mut self, ctx: &Context<'_>, tc_id: &str) -> bool {
        match self.members.remove(tc_id) {
            Some(mut parser) => {
                parser.delete_local(ctx);
                true
            }
            None => false,
        }
    }

    /// Delete the group file and member folder from the local layer.
    pub fn delete_local(&mut self, ctx: &Context<'_>) {
        self.entry.delete_local(ctx);
        if let Err(e) = ctx.local.delete(&self.members_folder()) {
            warn!(group = %self.name(), error = %e, "Cannot delete local group folder");
        }
    }
}
