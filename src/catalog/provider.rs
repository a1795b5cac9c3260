//! Provider definitions and materialized instances.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::qualifier::{Qualifier, Qualifiers};
use crate::types::TypeRef;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// A materialized provider instance together with its runtime type.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::{Instance, TypeRef};
///
/// struct Database { url: String }
///
/// let instance = Instance::new(Database { url: "postgres://localhost".into() }, TypeRef::named("Database"));
/// let db = instance.downcast::<Database>().unwrap();
/// assert_eq!(db.url, "postgres://localhost");
/// assert!(instance.downcast::<String>().is_none());
/// ```
#[derive(Clone)]
pub struct Instance {
    value: AnyArc,
    type_ref: TypeRef,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(value: T, type_ref: TypeRef) -> Self {
        Self { value: Arc::new(value), type_ref }
    }

    /// Wraps a value, deriving its type descriptor from the Rust type name.
    pub fn of<T: Any + Send + Sync>(value: T) -> Self {
        Self::new(value, TypeRef::of::<T>())
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>, type_ref: TypeRef) -> Self {
        Self { value, type_ref }
    }

    pub fn from_any(value: Arc<dyn Any + Send + Sync>, type_ref: TypeRef) -> Self {
        Self { value, type_ref }
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn as_any(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.value
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    /// Identity comparison of the underlying allocation.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_ref", &self.type_ref)
            .field("ptr", &Arc::as_ptr(&self.value))
            .finish()
    }
}

/// A named, typed source of instances.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::{Provider, TypeRef};
///
/// let provider = Provider::new("postgresRepo", TypeRef::named("Repository"))
///     .primary()
///     .priority(10)
///     .qualifier("sql")
///     .alias("repo");
///
/// assert!(provider.is_primary());
/// assert_eq!(provider.priority_value(), Some(10));
/// assert!(provider.answers_to("repo"));
/// ```
#[derive(Clone)]
pub struct Provider {
    name: String,
    declared_type: TypeRef,
    qualifiers: Qualifiers,
    aliases: Vec<String>,
    primary: bool,
    priority: Option<i32>,
    autowire_candidate: bool,
    materialized: Option<Instance>,
}

impl Provider {
    pub fn new(name: impl Into<String>, declared_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            declared_type,
            qualifiers: Qualifiers::new(),
            aliases: Vec::new(),
            primary: false,
            priority: None,
            autowire_candidate: true,
            materialized: None,
        }
    }

    /// Creates a provider backed by an already materialized instance.
    pub fn from_instance(name: impl Into<String>, instance: Instance) -> Self {
        let declared_type = instance.type_ref().clone();
        Self::new(name, declared_type).with_instance(instance)
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn qualifier(mut self, tag: impl Into<Qualifier>) -> Self {
        self.qualifiers.insert(tag);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if alias != self.name && !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    /// Excludes the provider from injection candidates; it stays addressable by name.
    pub fn not_autowire_candidate(mut self) -> Self {
        self.autowire_candidate = false;
        self
    }

    pub fn with_instance(mut self, instance: Instance) -> Self {
        self.materialized = Some(instance);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> &TypeRef {
        &self.declared_type
    }

    pub fn qualifiers(&self) -> &Qualifiers {
        &self.qualifiers
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn priority_value(&self) -> Option<i32> {
        self.priority
    }

    pub fn is_autowire_candidate(&self) -> bool {
        self.autowire_candidate
    }

    pub fn materialized(&self) -> Option<&Instance> {
        self.materialized.as_ref()
    }

    /// True if `name` is this provider's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    /// Metadata equality, ignoring any materialized instance.
    pub fn same_definition(&self, other: &Provider) -> bool {
        self.name == other.name
            && self.declared_type == other.declared_type
            && self.qualifiers == other.qualifiers
            && self.aliases == other.aliases
            && self.primary == other.primary
            && self.priority == other.priority
            && self.autowire_candidate == other.autowire_candidate
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("declared_type", &self.declared_type)
            .field("qualifiers", &self.qualifiers)
            .field("aliases", &self.aliases)
            .field("primary", &self.primary)
            .field("priority", &self.priority)
            .field("autowire_candidate", &self.autowire_candidate)
            .field("materialized", &self.materialized.is_some())
            .finish()
    }
}

/// Where a catalog entry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Origin {
    /// Definition registered in this catalog
    Local,
    /// Manually registered instance in this catalog
    Manual,
    /// Entry visible through a parent catalog
    Inherited,
}

/// A provider as seen through a by-type lookup.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub provider: Arc<Provider>,
    pub origin: Origin,
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn is_local(&self) -> bool {
        self.origin != Origin::Inherited
    }
}
