//! Provider descriptors for introspection and diagnostics.

use crate::catalog::{Origin, Provider};

/// Snapshot of a registered provider's metadata.
///
/// Descriptors are detached copies: they do not change when the catalog
/// does. With the `diagnostics` feature they serialize to JSON through
/// [`ProviderCatalog::descriptors_json`](crate::ProviderCatalog::descriptors_json).
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::{Instance, Origin, Provider, ProviderCatalog, TypeRef};
///
/// let catalog = ProviderCatalog::new();
/// catalog.register(Provider::new("primaryRepo", TypeRef::named("Repository")).primary().qualifier("sql")).unwrap();
/// catalog.register_instance("clock", Instance::new(0u64, TypeRef::named("Clock"))).unwrap();
///
/// let descriptors = catalog.descriptors();
/// assert_eq!(descriptors.len(), 2);
///
/// let repo = descriptors.iter().find(|d| d.name == "primaryRepo").unwrap();
/// assert!(repo.primary);
/// assert_eq!(repo.qualifiers, vec!["sql".to_string()]);
/// assert_eq!(repo.declared_type, "Repository");
/// assert!(!repo.materialized);
///
/// let clock = descriptors.iter().find(|d| d.name == "clock").unwrap();
/// assert_eq!(clock.origin, Origin::Manual);
/// assert!(clock.materialized);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProviderDescriptor {
    pub name: String,
    /// Declared type in its textual form
    pub declared_type: String,
    pub qualifiers: Vec<String>,
    pub aliases: Vec<String>,
    pub primary: bool,
    pub priority: Option<i32>,
    pub autowire_candidate: bool,
    /// Whether an instance is already attached
    pub materialized: bool,
    pub origin: Origin,
}

impl ProviderDescriptor {
    pub fn from_provider(provider: &Provider, origin: Origin) -> Self {
        Self {
            name: provider.name().to_string(),
            declared_type: provider.declared_type().to_string(),
            qualifiers: provider.qualifiers().iter().map(|q| q.as_str().to_string()).collect(),
            aliases: provider.aliases().to_vec(),
            primary: provider.is_primary(),
            priority: provider.priority_value(),
            autowire_candidate: provider.is_autowire_candidate(),
            materialized: provider.materialized().is_some(),
            origin,
        }
    }

    /// Whether the descriptor answers to `name` (name or alias).
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }
}
