use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use super::Context;
use crate::constants::versions;
use crate::error::{PersistenceError, Result};
use crate::model::Rect;
use crate::modules::{ModuleInfo, SpecVersion};
use crate::naming::escape_name;
use crate::storage::entry_path;
use crate::xml::{self, DocumentWriter, Element};

/// Describes one entity kind: where it is stored and how its attribute set
/// maps to XML.
pub trait EntryKind {
    type Config;

    /// Used in log lines and errors
    const KIND: &'static str;
    const ROOT: &'static str;
    const EXT: &'static str;
    /// Version written on save
    const VERSION: &'static str;

    /// Build the entity from the root's child elements.
    ///
    /// `expected` is the storage-derived name the declared name must match,
    /// or `None` when the document is not tied to a file.
    fn decode(children: &[Element], name: &str, expected: Option<&str>) -> Result<Self::Config>;

    fn encode(config: &Self::Config, writer: &mut DocumentWriter) -> std::result::Result<(), quick_xml::Error>;
}

/// Version and owning module read from a document
#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub version: SpecVersion,
    pub module: Option<ModuleInfo>,
}

pub fn decode_document<K: EntryKind>(
    xml: &str,
    name: &str,
    check_name: bool,
) -> Result<(K::Config, EntryHeader)> {
    let elements = xml::scan(xml).map_err(|source| PersistenceError::MalformedDocument {
        kind: K::KIND,
        name: name.to_string(),
        source,
    })?;

    let root = elements
        .first()
        .filter(|e| e.name == K::ROOT)
        .ok_or_else(|| PersistenceError::InvalidEntity {
            kind: K::KIND,
            name: name.to_string(),
            reason: format!("missing <{}> root element", K::ROOT),
        })?;

    let version = match root.attr("version") {
        Some(v) => SpecVersion::parse(v),
        None => {
            warn!(kind = K::KIND, name, "Missing version attribute, assuming {}", versions::ASSUMED);
            SpecVersion::parse(versions::ASSUMED)
        }
    };

    let children: &[Element] = if version < SpecVersion::parse(versions::FIRST_SUPPORTED) {
        debug!(kind = K::KIND, name, %version, "Legacy format, child elements ignored");
        &[]
    } else {
        &elements[1..]
    };

    let module = children
        .iter()
        .find(|e| e.name == "module" && e.is_child_of(K::ROOT))
        .and_then(|e| {
            e.attr("name")
                .map(|code_name| ModuleInfo::from_attributes(code_name, e.attr("spec")))
        });

    let expected = check_name.then_some(name);
    let config = K::decode(children, name, expected)?;
    Ok((config, EntryHeader { version, module }))
}

pub fn encode_document<K: EntryKind>(
    config: &K::Config,
    module: Option<&ModuleInfo>,
    name: &str,
) -> Result<String> {
    let encode = || -> std::result::Result<String, quick_xml::Error> {
        let mut w = DocumentWriter::new()?;
        w.start(K::ROOT, &[("version", K::VERSION.to_string())])?;
        if let Some(module) = module {
            let mut attrs = vec![("name", module.code_name())];
            if let Some(spec) = &module.spec_version {
                attrs.push(("spec", spec.clone()));
            }
            w.empty("module", &attrs)?;
        }
        K::encode(config, &mut w)?;
        w.end(K::ROOT)?;
        Ok(w.finish())
    };
    encode().map_err(|e| {
        PersistenceError::io(
            "encode",
            format!("{name}.{}", K::EXT),
            std::io::Error::other(e.to_string()),
        )
    })
}

/// Bidirectional mapping between one entity and its file in either layer.
pub struct EntryParser<K: EntryKind> {
    name: String,
    /// Parent folder, relative to both layer roots
    folder: PathBuf,
    in_module: bool,
    in_local: bool,
    /// Owning module of the last loaded document, written back on save
    module: Option<ModuleInfo>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: EntryKind> EntryParser<K> {
    pub fn new(name: impl Into<String>, folder: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            in_module: false,
            in_local: false,
            module: None,
            _kind: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn path(&self) -> PathBuf {
        entry_path(&self.folder, &escape_name(&self.name), K::EXT)
    }

    pub fn is_in_module(&self) -> bool {
        self.in_module
    }

    pub fn is_in_local(&self) -> bool {
        self.in_local
    }

    pub fn set_in_module(&mut self, present: bool) {
        self.in_module = present;
    }

    pub fn set_in_local(&mut self, present: bool) {
        self.in_local = present;
    }

    pub fn module(&self) -> Option<&ModuleInfo> {
        self.module.as_ref()
    }

    pub fn set_module(&mut self, module: Option<ModuleInfo>) {
        self.module = module;
    }

    /// Read the entity, local layer first.
    pub fn load(&mut self, ctx: &Context<'_>) -> Result<K::Config> {
        let path = self.path();
        let (storage, layer) = if self.in_local && ctx.local.exists(&path) {
            (ctx.local, "local")
        } else if self.in_module && ctx.module.exists(&path) {
            (ctx.module, "module")
        } else {
            return Err(PersistenceError::NotFound {
                kind: K::KIND,
                name: self.name.clone(),
            });
        };

        let xml = storage.read_to_string(&path)?;
        let (config, header) = decode_document::<K>(&xml, &self.name, true)?;
        trace!(kind = K::KIND, name = %self.name, layer, version = %header.version, "Loaded entry");
        self.module = header.module;
        Ok(config)
    }

    /// Write the full document to the local layer.
    pub fn save(&mut self, ctx: &Context<'_>, config: &K::Config) -> Result<()> {
        let xml = encode_document::<K>(config, self.module.as_ref(), &self.name)?;
        ctx.local.write(&self.path(), xml.as_bytes())?;
        self.in_local = true;
        trace!(kind = K::KIND, name = %self.name, "Saved entry");
        Ok(())
    }

    /// Serialized form without touching storage.
    pub fn to_xml(&self, config: &K::Config) -> Result<String> {
        encode_document::<K>(config, self.module.as_ref(), &self.name)
    }

    /// Remove the local file; failures are logged.
    pub fn delete_local(&mut self, ctx: &Context<'_>) {
        if let Err(e) = ctx.local.delete(&self.path()) {
            warn!(kind = K::KIND, name = %self.name, error = %e, "Cannot delete local entry");
        }
        self.in_local = false;
    }
}

/// Logs repaired attributes of one entity.
pub(crate) struct Repair<'a> {
    pub kind: &'static str,
    pub name: &'a str,
}

impl Repair<'_> {
    pub fn warn(&self, attribute: &str, value: &str) {
        let err = PersistenceError::MalformedAttribute {
            kind: self.kind,
            name: self.name.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        };
        warn!(kind = self.kind, name = self.name, "{err}, using default");
    }

    pub fn bool(&self, el: &Element, key: &str, default: bool) -> bool {
        match el.attr(key) {
            None => default,
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                self.warn(&format!("{}/{key}", el.name), other);
                default
            }
        }
    }

    pub fn int(&self, el: &Element, key: &str, default: i32) -> i32 {
        match el.attr(key) {
            None => default,
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                self.warn(&format!("{}/{key}", el.name), value);
                default
            }),
        }
    }

    pub fn float(&self, el: &Element, key: &str, default: f64) -> f64 {
        match el.attr(key) {
            None => default,
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                self.warn(&format!("{}/{key}", el.name), value);
                default
            }),
        }
    }

    /// All four of `x`, `y`, `width`, `height`, or nothing.
    pub fn rect(&self, el: &Element) -> Option<Rect> {
        let mut values = [0i32; 4];
        for (slot, key) in values.iter_mut().zip(["x", "y", "width", "height"]) {
            let Some(raw) = el.attr(key) else {
                self.warn(&format!("{}/{key}", el.name), "");
                return None;
            };
            match raw.trim().parse() {
                Ok(v) => *slot = v,
                Err(_) => {
                    self.warn(&format!("{}/{key}", el.name), raw);
                    return None;
                }
            }
        }
        let [x, y, width, height] = values;
        Some(Rect::new(x, y, width, height))
    }
}

/// Declared name check shared by every kind.
pub(crate) fn check_declared_name(
    kind: &'static str,
    declared: &str,
    expected: Option<&str>,
) -> Result<()> {
    match expected {
        Some(expected) if expected != declared => Err(PersistenceError::InvalidReference {
            kind,
            expected: expected.to_string(),
            found: declared.to_string(),
        }),
        _ => Ok(()),
    }
}
