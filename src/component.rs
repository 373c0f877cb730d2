//! Narrow capability interface to on-screen components.
//!
//! The layout never owns components. It asks them how they want to be
//! persisted, whether they are open, and delegates (de)serialization to a
//! [`ComponentFactory`].

use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ComponentError;

/// How a component wants to survive a restart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceType {
    /// Always written, open or closed
    #[default]
    Always,
    /// Written only while open
    OnlyWhenOpened,
    /// Never written; identity lives for the session only
    Never,
}

impl PersistenceType {
    /// Whether a component in `opened` state is part of the saved layout.
    pub fn should_persist(&self, opened: bool) -> bool {
        match self {
            Self::Always => true,
            Self::OnlyWhenOpened => opened,
            Self::Never => false,
        }
    }
}

pub trait Component: Send + Sync {
    fn persistence_type(&self) -> PersistenceType;

    fn is_opened(&self) -> bool;

    /// Human-readable name for log lines
    fn display_name(&self) -> String {
        String::from("component")
    }

    fn as_any(&self) -> &dyn Any;
}

/// Turns stored bytes into live components and back.
pub trait ComponentFactory: Send + Sync {
    /// Rebuild the component stored under `key`.
    fn materialize(&self, key: &str, data: &[u8]) -> Result<Arc<dyn Component>, ComponentError>;

    fn serialize(&self, component: &dyn Component) -> Result<Vec<u8>, ComponentError>;
}

/// Component whose state is an opaque byte blob.
///
/// Used by the command-line tool, which manipulates layouts without a GUI.
#[derive(Debug, Clone)]
pub struct BlobComponent {
    pub persistence: PersistenceType,
    pub opened: bool,
    pub data: Vec<u8>,
}

impl Component for BlobComponent {
    fn persistence_type(&self) -> PersistenceType {
        self.persistence
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory for [`BlobComponent`]s.
///
/// Empty data is treated as corrupt so broken stores surface in the logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlobFactory;

impl ComponentFactory for BlobFactory {
    fn materialize(&self, _key: &str, data: &[u8]) -> Result<Arc<dyn Component>, ComponentError> {
        if data.is_empty() {
            return Err(ComponentError::Corrupt("empty settings file".into()));
        }
        Ok(Arc::new(BlobComponent {
            persistence: PersistenceType::Always,
            opened: false,
            data: data.to_vec(),
        }))
    }

    fn serialize(&self, component: &dyn Component) -> Result<Vec<u8>, ComponentError> {
        component
            .as_any()
            .downcast_ref::<BlobComponent>()
            .map(|blob| blob.data.clone())
            .ok_or_else(|| ComponentError::Unsupported("not a blob component".into()))
    }
}
