use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::Context;
use crate::error::Result;
use crate::naming::unescape_name;
use crate::storage::Storage;

/// Where a member was found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presence {
    pub in_module: bool,
    pub in_local: bool,
}

/// Scan `folder` in both layers for `ext` files, deduplicated by name.
pub fn discover(ctx: &Context<'_>, folder: &Path, ext: &str) -> Result<BTreeMap<String, Presence>> {
    let mut found: BTreeMap<String, Presence> = BTreeMap::new();
    for child in ctx.module.children(folder)? {
        if child.has_ext(ext) {
            found.entry(unescape_name(&child.name)).or_default().in_module = true;
        }
    }
    for child in ctx.local.children(folder)? {
        if child.has_ext(ext) {
            found.entry(unescape_name(&child.name)).or_default().in_local = true;
        }
    }
    Ok(found)
}

/// Names of every `ext` file stored one folder below `parent` in `storage`.
pub fn nested_names(storage: &dyn Storage, parent: &Path, ext: &str) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    for folder in storage.children(parent)?.into_iter().filter(|c| c.is_folder) {
        for child in storage.children(&parent.join(&folder.name))? {
            if child.has_ext(ext) {
                names.insert(unescape_name(&child.name));
            }
        }
    }
    Ok(names)
}
