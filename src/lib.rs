//! Window-layout persistence engine.
//!
//! Loads and saves a docking window layout (modes, groups, component
//! references) from a read-only module layer overlaid by a writable local
//! layer. Start with [`PersistenceManager`].

pub mod component;
pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod model;
pub mod modules;
pub mod naming;
pub mod parser;
pub mod persistence;
pub mod storage;
pub mod xml;

pub use component::{BlobComponent, BlobFactory, Component, ComponentFactory, PersistenceType};
pub use config::Settings;
pub use error::{ComponentError, PersistenceError, Result};
pub use identity::IdentityRegistry;
pub use model::{GroupConfig, ModeConfig, ModeKind, TcGroupConfig, TcRefConfig, WindowManagerConfig};
pub use modules::{ExtensionRegistry, PermissiveRegistry, StaticExtensionRegistry};
pub use persistence::PersistenceManager;
pub use storage::{FsStorage, Storage};
