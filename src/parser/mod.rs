//! Layout parsers.
//!
//! [`EntryParser`] maps one versioned file to one entity. Containers
//! ([`ModeParser`], [`GroupParser`]) compose entry parsers for their own
//! attributes and their members; [`WindowManagerParser`] composes containers
//! and owns the load/save transaction.

mod entry;
mod group;
mod kinds;
mod manager;
mod members;
mod mode;
mod order;

pub use entry::{EntryHeader, EntryKind, EntryParser, decode_document, encode_document};
pub use group::GroupParser;
pub use kinds::{GroupAttributes, ModeAttributes, TcGroupEntry, TcRefEntry, WindowManagerAttributes};
pub use manager::WindowManagerParser;
pub use mode::ModeParser;
pub use order::OrderReconciler;

use crate::identity::IdentityRegistry;
use crate::modules::ExtensionRegistry;
use crate::storage::Storage;

/// Collaborators every parser operation needs.
///
/// Built by the façade for the duration of one call.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub module: &'a dyn Storage,
    pub local: &'a dyn Storage,
    pub extensions: &'a dyn ExtensionRegistry,
    pub identities: &'a IdentityRegistry,
}
