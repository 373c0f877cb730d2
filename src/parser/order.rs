use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, trace};

use crate::constants::attrs::{ORDER_SEPARATOR, TC_REF_ORDER};
use crate::error::Result;
use crate::naming::{escape_name, unescape_name};
use crate::storage::Storage;

/// Keeps the order of a mode's members stable across sessions.
///
/// The explicit record lives on the member folder in the local layer and is
/// rewritten in full after every reconciliation.
pub struct OrderReconciler<'a> {
    module: &'a dyn Storage,
    local: &'a dyn Storage,
    folder: &'a Path,
    ext: &'static str,
}

impl<'a> OrderReconciler<'a> {
    pub fn new(
        module: &'a dyn Storage,
        local: &'a dyn Storage,
        folder: &'a Path,
        ext: &'static str,
    ) -> Self {
        Self {
            module,
            local,
            folder,
            ext,
        }
    }

    /// Explicit record, local layer first.
    pub fn record(&self) -> Option<Vec<String>> {
        let raw = self
            .local
            .attribute(self.folder, TC_REF_ORDER)
            .or_else(|| self.module.attribute(self.folder, TC_REF_ORDER))?;
        Some(
            raw.split(ORDER_SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(unescape_name)
                .collect(),
        )
    }

    /// Order `names` (given in stable map order) without writing anything.
    pub fn order(&self, names: &[String]) -> Vec<String> {
        if let Some(record) = self.record() {
            trace!(folder = %self.folder.display(), "Ordering by explicit record");
            return apply_record(&record, names);
        }
        match self.natural(names) {
            Some(ordered) => ordered,
            None => {
                debug!(folder = %self.folder.display(), "No usable natural order, keeping map order");
                names.to_vec()
            }
        }
    }

    /// Order `names` and rewrite the record to match.
    pub fn reconcile(&self, names: &[String]) -> Result<Vec<String>> {
        let ordered = self.order(names);
        self.write_record(&ordered)?;
        Ok(ordered)
    }

    /// Names are stored escaped so the separator cannot appear inside one.
    pub fn write_record(&self, names: &[String]) -> Result<()> {
        let escaped: Vec<String> = names.iter().map(|n| escape_name(n)).collect();
        let value = escaped.join(&ORDER_SEPARATOR.to_string());
        let value = (!value.is_empty()).then_some(value);
        self.local.set_attribute(self.folder, TC_REF_ORDER, value.as_deref())
    }

    /// Natural order of the module folder, usable only when every name has a
    /// module counterpart.
    fn natural(&self, names: &[String]) -> Option<Vec<String>> {
        let natural: Vec<String> = self
            .module
            .natural_order(self.folder, self.ext)?
            .iter()
            .map(|stem| unescape_name(stem))
            .collect();
        if !names.iter().all(|n| natural.contains(n)) {
            return None;
        }
        Some(natural.into_iter().filter(|n| names.contains(n)).collect())
    }
}

/// Place recorded names at their recorded slot, then append the rest.
fn apply_record(record: &[String], names: &[String]) -> Vec<String> {
    let index: HashMap<&str, usize> = record
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut slots: Vec<Option<&String>> = vec![None; record.len()];
    let mut unrecorded = Vec::new();
    for name in names {
        match index.get(name.as_str()) {
            Some(&i) => slots[i] = Some(name),
            None => unrecorded.push(name.clone()),
        }
    }

    slots
        .into_iter()
        .flatten()
        .cloned()
        .chain(unrecorded)
        .collect()
}
