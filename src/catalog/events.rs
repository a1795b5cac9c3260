//! Catalog change notifications.

use crate::catalog::ProviderCatalog;
use crate::types::TypeRef;

/// A change to catalog membership or state.
///
/// Events are delivered after the catalog's write lock has been released,
/// so listeners may query the catalog freely.
#[derive(Debug, Clone, Copy)]
pub enum CatalogEvent<'a> {
    /// A new provider or manual instance joined the catalog
    Registered { name: &'a str, declared_type: &'a TypeRef },
    /// An existing name was re-registered with a new definition
    Replaced { name: &'a str, previous: &'a TypeRef, declared_type: &'a TypeRef },
    /// A provider left the catalog
    Deregistered { name: &'a str, declared_type: &'a TypeRef },
    /// A supertype declaration changed assignability
    HierarchyChanged,
    /// The catalog became immutable
    Frozen,
    /// The catalog became mutable again
    Thawed,
}

impl CatalogEvent<'_> {
    /// The provider name the event concerns, if any.
    pub fn provider_name(&self) -> Option<&str> {
        match self {
            CatalogEvent::Registered { name, .. }
            | CatalogEvent::Replaced { name, .. }
            | CatalogEvent::Deregistered { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Receives catalog change notifications.
///
/// Listeners are held weakly; dropping the listener unsubscribes it.
pub trait CatalogListener: Send + Sync {
    fn on_catalog_event(&self, catalog: &ProviderCatalog, event: &CatalogEvent<'_>);
}
