//! Owning-extension bookkeeping and the module-acceptance filter.
//!
//! Layout entities contributed by an extension carry a
//! `<module name="base/release" spec="x.y"/>` element. When that extension is
//! missing or disabled the entity is dropped and its local customization
//! deleted.

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Dotted-integer specification version (`1.2.3`).
///
/// Missing trailing components compare as zero, so `1.2 == 1.2.0`.
#[derive(Debug, Clone)]
pub struct SpecVersion(Vec<u32>);

impl SpecVersion {
    /// Parse leniently; unparsable components count as zero.
    pub fn parse(value: &str) -> Self {
        Self(
            value
                .trim()
                .split('.')
                .map(|part| part.trim().parse::<u32>().unwrap_or(0))
                .collect(),
        )
    }

    fn component(&self, index: usize) -> u32 {
        self.0.get(index).copied().unwrap_or(0)
    }
}

impl PartialEq for SpecVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SpecVersion {}

impl PartialOrd for SpecVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SpecVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Owning-extension attribute of a layout entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub code_name_base: String,
    pub release: Option<String>,
    /// Minimum specification version, kept verbatim for re-saving
    pub spec_version: Option<String>,
}

impl ModuleInfo {
    /// Build from the `name` and `spec` attributes of a `<module>` element.
    ///
    /// A release saved as the literal text `null` is repaired to absent.
    pub fn from_attributes(name: &str, spec: Option<&str>) -> Self {
        let (base, release) = match name.split_once('/') {
            Some((base, release)) => (base, Some(release)),
            None => (name, None),
        };
        let release = match release {
            Some("null") => {
                warn!(module = %base, "Module release code was saved as \"null\", repairing");
                None
            }
            other => other.map(str::to_string),
        };
        Self {
            code_name_base: base.to_string(),
            release,
            spec_version: spec.map(str::to_string),
        }
    }

    /// Value of the `name` attribute when written back
    pub fn code_name(&self) -> String {
        match &self.release {
            Some(release) => format!("{}/{}", self.code_name_base, release),
            None => self.code_name_base.clone(),
        }
    }
}

impl fmt::Display for ModuleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code_name())?;
        if let Some(spec) = &self.spec_version {
            write!(f, " > {spec}")?;
        }
        Ok(())
    }
}

/// An installed extension as reported by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub code_name_base: String,
    #[serde(default)]
    pub release: Option<String>,
    pub spec_version: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Lookup capability over installed extensions.
pub trait ExtensionRegistry: Send + Sync {
    /// Extension matching `base` (and `release` when given) whose spec version
    /// is at least `min_spec`.
    fn find_extension(
        &self,
        base: &str,
        release: Option<&str>,
        min_spec: Option<&SpecVersion>,
    ) -> Option<Extension>;
}

/// Fixed extension list, usually read from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticExtensionRegistry {
    #[serde(default)]
    extensions: Vec<Extension>,
}

impl StaticExtensionRegistry {
    pub fn new(extensions: Vec<Extension>) -> Self {
        Self { extensions }
    }

    /// Load from `{"extensions": [...]}`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read extension list: {}", path.display()))?;
        let registry: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse extension list: {}", path.display()))?;
        debug!(
            path = %path.display(),
            count = registry.extensions.len(),
            "Loaded extension registry"
        );
        Ok(registry)
    }
}

impl ExtensionRegistry for StaticExtensionRegistry {
    fn find_extension(
        &self,
        base: &str,
        release: Option<&str>,
        min_spec: Option<&SpecVersion>,
    ) -> Option<Extension> {
        self.extensions
            .iter()
            .filter(|ext| ext.code_name_base == base)
            .filter(|ext| release.is_none() || ext.release.as_deref() == release)
            .find(|ext| match min_spec {
                Some(min) => SpecVersion::parse(&ext.spec_version) >= *min,
                None => true,
            })
            .cloned()
    }
}

/// Registry that reports every extension as installed and enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveRegistry;

impl ExtensionRegistry for PermissiveRegistry {
    fn find_extension(
        &self,
        base: &str,
        release: Option<&str>,
        min_spec: Option<&SpecVersion>,
    ) -> Option<Extension> {
        Some(Extension {
            code_name_base: base.to_string(),
            release: release.map(str::to_string),
            spec_version: min_spec.map(|v| v.to_string()).unwrap_or_else(|| "0".into()),
            enabled: true,
        })
    }
}

/// Outcome of the module-acceptance filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Accepted,
    /// Owning extension not installed
    Missing,
    Disabled,
}

impl Acceptance {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Decide whether an entity owned by `module` may stay in the layout.
pub fn accept(registry: &dyn ExtensionRegistry, module: Option<&ModuleInfo>) -> Acceptance {
    let Some(module) = module else {
        return Acceptance::Accepted;
    };
    let min_spec = module.spec_version.as_deref().map(SpecVersion::parse);
    match registry.find_extension(
        &module.code_name_base,
        module.release.as_deref(),
        min_spec.as_ref(),
    ) {
        None => {
            debug!(module = %module, "Cannot find owning module");
            Acceptance::Missing
        }
        Some(ext) if !ext.enabled => Acceptance::Disabled,
        Some(_) => Acceptance::Accepted,
    }
}
