//! Provider catalog module.
//!
//! The catalog owns every registered [`Provider`], keyed by unique name, and
//! answers by-type lookups for the candidate finder. Registration happens
//! mostly during startup; afterwards the catalog can be frozen, which turns
//! the by-type memo into a permanently valid table.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::descriptors::ProviderDescriptor;
use crate::error::{DiError, DiResult};
use crate::types::{self, SupertypeSource, TypeHierarchy, TypeRef};
use crate::FastMap;

pub mod events;
pub mod provider;

pub use events::{CatalogEvent, CatalogListener};
pub use provider::{CatalogEntry, Instance, Origin, Provider};

/// Behavior switches for a catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    /// Treat every `register` of a claimed name as an explicit replacement
    pub allow_overriding: bool,
}

/// What a claimed name points at.
#[derive(Debug, Clone)]
enum Claim {
    Definition,
    Manual,
    Alias(String),
}

#[derive(Default)]
struct CatalogState {
    /// Definitions in registration order
    definitions: Vec<Arc<Provider>>,
    /// Manually registered instances, after definitions in lookup order
    manual: Vec<Arc<Provider>>,
    claims: FastMap<String, Claim>,
    types: TypeHierarchy,
}

impl CatalogState {
    fn canonical<'a>(&'a self, name: &'a str) -> Option<(&'a str, &'a Claim)> {
        match self.claims.get(name)? {
            Claim::Alias(target) => self.claims.get(target.as_str()).map(|c| (target.as_str(), c)),
            claim => Some((name, claim)),
        }
    }

    fn get(&self, name: &str) -> Option<&Arc<Provider>> {
        let (name, claim) = self.canonical(name)?;
        let list = match claim {
            Claim::Definition => &self.definitions,
            Claim::Manual => &self.manual,
            Claim::Alias(_) => return None,
        };
        list.iter().find(|p| p.name() == name)
    }

    fn release_aliases(&mut self, provider: &Provider) {
        for alias in provider.aliases() {
            self.claims.remove(alias);
        }
    }

    fn claim_aliases(&mut self, provider: &Provider) {
        for alias in provider.aliases() {
            self.claims.insert(alias.clone(), Claim::Alias(provider.name().to_string()));
        }
    }

    /// Every alias must be free, or already point at `owner`.
    fn check_aliases(&self, provider: &Provider) -> DiResult<()> {
        for alias in provider.aliases() {
            match self.claims.get(alias) {
                None => {}
                Some(Claim::Alias(target)) if target == provider.name() => {}
                Some(_) => return Err(DiError::DuplicateName(alias.clone())),
            }
        }
        Ok(())
    }
}

/// Supertype lookups across a catalog and its ancestors.
struct ChainTypes<'a> {
    local: &'a TypeHierarchy,
    parent: Option<&'a ProviderCatalog>,
}

impl SupertypeSource for ChainTypes<'_> {
    fn supertypes(&self, name: &str) -> Vec<TypeRef> {
        let mut found = self.local.supertypes(name);
        if let Some(parent) = self.parent {
            for sup in parent.supertypes_of(name) {
                if !found.contains(&sup) {
                    found.push(sup);
                }
            }
        }
        found
    }
}

struct MemoEntry {
    generation: u64,
    entries: Arc<[CatalogEntry]>,
}

/// Registry of named, typed providers.
///
/// # Thread Safety
///
/// Reads take a shared lock and may run from any number of threads;
/// mutations are exclusive. Listeners are notified after the lock is released.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::{ProviderCatalog, Provider, TypeRef};
///
/// let catalog = ProviderCatalog::new();
/// catalog.declare_supertype("PostgresRepo", TypeRef::named("Repository")).unwrap();
/// catalog.register(Provider::new("postgres", TypeRef::named("PostgresRepo"))).unwrap();
/// catalog.register(Provider::new("cache", TypeRef::named("Cache"))).unwrap();
///
/// let repos = catalog.lookup_by_type(&TypeRef::named("Repository"));
/// assert_eq!(repos.len(), 1);
/// assert_eq!(repos[0].name(), "postgres");
///
/// // Names are unique
/// assert!(catalog.register(Provider::new("cache", TypeRef::named("Other"))).is_err());
/// ```
pub struct ProviderCatalog {
    parent: Option<Arc<ProviderCatalog>>,
    options: CatalogOptions,
    state: RwLock<CatalogState>,
    by_type: RwLock<FastMap<TypeRef, MemoEntry>>,
    frozen: AtomicBool,
    generation: AtomicU64,
    listeners: Mutex<Vec<Weak<dyn CatalogListener>>>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::build(None, CatalogOptions::default())
    }

    pub fn with_options(options: CatalogOptions) -> Self {
        Self::build(None, options)
    }

    /// Creates a child catalog; parent entries are visible as [`Origin::Inherited`].
    pub fn with_parent(parent: Arc<ProviderCatalog>) -> Self {
        Self::build(Some(parent), CatalogOptions::default())
    }

    fn build(parent: Option<Arc<ProviderCatalog>>, options: CatalogOptions) -> Self {
        Self {
            parent,
            options,
            state: RwLock::new(CatalogState::default()),
            by_type: RwLock::new(FastMap::default()),
            frozen: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn parent(&self) -> Option<&Arc<ProviderCatalog>> {
        self.parent.as_ref()
    }

    // ----- Mutation -----

    /// Registers a provider.
    ///
    /// Fails with [`DiError::DuplicateName`] if the name or an alias is already
    /// claimed, unless the existing definition is identical (a re-registration)
    /// or the catalog allows overriding.
    pub fn register(&self, provider: Provider) -> DiResult<()> {
        self.ensure_mutable("register provider")?;
        let existing = {
            let state = self.state.read();
            state.canonical(provider.name()).map(|(name, claim)| (name.to_string(), claim.clone()))
        };
        match existing {
            None => self.insert_definition(provider),
            Some((name, Claim::Definition)) if name == provider.name() => {
                let identical = self
                    .get(provider.name())
                    .map(|p| p.same_definition(&provider))
                    .unwrap_or(false);
                if identical || self.options.allow_overriding {
                    self.replace(provider).map(|_| ())
                } else {
                    Err(DiError::DuplicateName(provider.name().to_string()))
                }
            }
            Some(_) => Err(DiError::DuplicateName(provider.name().to_string())),
        }
    }

    fn insert_definition(&self, provider: Provider) -> DiResult<()> {
        let provider = Arc::new(provider);
        {
            let mut state = self.state.write();
            if state.claims.contains_key(provider.name()) {
                return Err(DiError::DuplicateName(provider.name().to_string()));
            }
            state.check_aliases(&provider)?;
            state.claims.insert(provider.name().to_string(), Claim::Definition);
            state.claim_aliases(&provider);
            state.definitions.push(provider.clone());
            self.touch();
        }
        self.notify(&CatalogEvent::Registered {
            name: provider.name(),
            declared_type: provider.declared_type(),
        });
        Ok(())
    }

    /// Registers or overrides a definition, keeping its registration position.
    ///
    /// Returns the replaced provider, if any. Shortcuts that referenced the
    /// old definition are invalidated through [`CatalogEvent::Replaced`].
    pub fn replace(&self, provider: Provider) -> DiResult<Option<Arc<Provider>>> {
        self.ensure_mutable("replace provider")?;
        let provider = Arc::new(provider);
        let previous = {
            let mut state = self.state.write();
            let slot = match state.claims.get(provider.name()) {
                None => None,
                Some(Claim::Definition) => state.definitions.iter().position(|p| p.name() == provider.name()),
                Some(_) => return Err(DiError::DuplicateName(provider.name().to_string())),
            };
            state.check_aliases(&provider)?;
            let previous = match slot {
                Some(index) => {
                    let previous = std::mem::replace(&mut state.definitions[index], provider.clone());
                    state.release_aliases(&previous);
                    Some(previous)
                }
                None => {
                    state.claims.insert(provider.name().to_string(), Claim::Definition);
                    state.definitions.push(provider.clone());
                    None
                }
            };
            state.claim_aliases(&provider);
            self.touch();
            previous
        };
        match &previous {
            Some(old) => self.notify(&CatalogEvent::Replaced {
                name: provider.name(),
                previous: old.declared_type(),
                declared_type: provider.declared_type(),
            }),
            None => self.notify(&CatalogEvent::Registered {
                name: provider.name(),
                declared_type: provider.declared_type(),
            }),
        }
        Ok(previous)
    }

    /// Registers an instance that carries no metadata beyond its type.
    ///
    /// Manual instances are found after all definitions in by-type lookups.
    pub fn register_instance(&self, name: impl Into<String>, instance: Instance) -> DiResult<()> {
        self.ensure_mutable("register instance")?;
        let provider = Arc::new(Provider::from_instance(name, instance));
        {
            let mut state = self.state.write();
            if state.claims.contains_key(provider.name()) {
                return Err(DiError::DuplicateName(provider.name().to_string()));
            }
            state.claims.insert(provider.name().to_string(), Claim::Manual);
            state.manual.push(provider.clone());
            self.touch();
        }
        self.notify(&CatalogEvent::Registered {
            name: provider.name(),
            declared_type: provider.declared_type(),
        });
        Ok(())
    }

    /// Removes a provider (or manual instance) by name or alias.
    pub fn deregister(&self, name: &str) -> DiResult<Arc<Provider>> {
        self.ensure_mutable("deregister provider")?;
        let removed = {
            let mut state = self.state.write();
            let (canonical, claim) = match state.canonical(name) {
                Some((canonical, claim)) => (canonical.to_string(), claim.clone()),
                None => return Err(DiError::NotRegistered(name.to_string())),
            };
            let list = match claim {
                Claim::Definition => &mut state.definitions,
                Claim::Manual => &mut state.manual,
                Claim::Alias(_) => return Err(DiError::NotRegistered(name.to_string())),
            };
            let index = list
                .iter()
                .position(|p| p.name() == canonical)
                .ok_or_else(|| DiError::NotRegistered(name.to_string()))?;
            let removed = list.remove(index);
            state.claims.remove(&canonical);
            state.release_aliases(&removed);
            self.touch();
            removed
        };
        self.notify(&CatalogEvent::Deregistered {
            name: removed.name(),
            declared_type: removed.declared_type(),
        });
        Ok(removed)
    }

    /// Declares `supertype` as a supertype of the named type `subtype`.
    pub fn declare_supertype(&self, subtype: impl AsRef<str>, supertype: TypeRef) -> DiResult<()> {
        self.ensure_mutable("declare supertype")?;
        let changed = {
            let mut state = self.state.write();
            let changed = state.types.declare(subtype, supertype);
            if changed {
                self.touch();
            }
            changed
        };
        if changed {
            self.notify(&CatalogEvent::HierarchyChanged);
        }
        Ok(())
    }

    /// Makes the catalog immutable. Returns false if it already was frozen.
    pub fn freeze(&self) -> bool {
        if self.frozen.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.touch();
        self.notify(&CatalogEvent::Frozen);
        true
    }

    /// Makes a frozen catalog mutable again. Returns false if it was not frozen.
    pub fn thaw(&self) -> bool {
        if !self.frozen.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.touch();
        self.notify(&CatalogEvent::Thawed);
        true
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    fn ensure_mutable(&self, operation: &'static str) -> DiResult<()> {
        if self.is_frozen() {
            Err(DiError::CatalogFrozen(operation))
        } else {
            Ok(())
        }
    }

    /// Bumps the generation and drops the by-type memo.
    fn touch(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.by_type.write().clear();
    }

    /// Change counter for this catalog and all of its ancestors.
    pub fn generation(&self) -> u64 {
        let own = self.generation.load(Ordering::Acquire);
        match &self.parent {
            Some(parent) => own.wrapping_add(parent.generation()),
            None => own,
        }
    }

    // ----- Listeners -----

    /// Subscribes a listener to this catalog's events.
    pub fn add_listener(&self, listener: Weak<dyn CatalogListener>) {
        self.listeners.lock().push(listener);
    }

    fn notify(&self, event: &CatalogEvent<'_>) {
        tracing::debug!(
            target: "ferrous_autowire",
            event = ?event,
            generation = self.generation(),
            "catalog changed"
        );
        let live: Vec<Arc<dyn CatalogListener>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            listener.on_catalog_event(self, event);
        }
    }

    // ----- Lookup -----

    /// Returns every provider whose declared type is assignable to `requested`.
    ///
    /// Order: local definitions in registration order, then manual instances,
    /// then parent entries whose names are not shadowed locally.
    pub fn lookup_by_type(&self, requested: &TypeRef) -> Arc<[CatalogEntry]> {
        let generation = self.generation();
        if let Some(memo) = self.by_type.read().get(requested) {
            if memo.generation == generation {
                return memo.entries.clone();
            }
        }

        let entries: Arc<[CatalogEntry]> = self.compute_by_type(requested).into();

        // Only memoize if nothing changed while we were scanning
        if self.generation() == generation {
            self.by_type.write().insert(
                requested.clone(),
                MemoEntry { generation, entries: entries.clone() },
            );
        }
        entries
    }

    fn compute_by_type(&self, requested: &TypeRef) -> Vec<CatalogEntry> {
        let state = self.state.read();
        let chain = ChainTypes { local: &state.types, parent: self.parent.as_deref() };
        let mut entries = Vec::new();

        for provider in &state.definitions {
            if types::is_assignable(provider.declared_type(), requested, &chain) {
                entries.push(CatalogEntry { provider: provider.clone(), origin: Origin::Local });
            }
        }
        for provider in &state.manual {
            if types::is_assignable(provider.declared_type(), requested, &chain) {
                entries.push(CatalogEntry { provider: provider.clone(), origin: Origin::Manual });
            }
        }
        if let Some(parent) = &self.parent {
            for entry in parent.lookup_by_type(requested).iter() {
                if !state.claims.contains_key(entry.name()) {
                    entries.push(CatalogEntry { provider: entry.provider.clone(), origin: Origin::Inherited });
                }
            }
        }
        entries
    }

    /// Covariant assignability under this catalog's type hierarchy (and its ancestors').
    pub fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        let state = self.state.read();
        let chain = ChainTypes { local: &state.types, parent: self.parent.as_deref() };
        types::is_assignable(from, to, &chain)
    }

    fn supertypes_of(&self, name: &str) -> Vec<TypeRef> {
        let state = self.state.read();
        ChainTypes { local: &state.types, parent: self.parent.as_deref() }.supertypes(name)
    }

    /// Finds a provider by name or alias, consulting ancestors.
    pub fn get(&self, name: &str) -> Option<Arc<Provider>> {
        if let Some(provider) = self.state.read().get(name) {
            return Some(provider.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Finds a provider by name or alias in this catalog only.
    pub fn get_local(&self, name: &str) -> Option<Arc<Provider>> {
        self.state.read().get(name).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.state.read().canonical(name).is_some()
    }

    pub fn declared_type(&self, name: &str) -> Option<TypeRef> {
        self.get(name).map(|p| p.declared_type().clone())
    }

    /// Local provider names in lookup order.
    pub fn names(&self) -> Vec<String> {
        let state = self.state.read();
        state
            .definitions
            .iter()
            .chain(state.manual.iter())
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Number of local definitions and manual instances.
    pub fn len(&self) -> usize {
        let state = self.state.read();
        state.definitions.len() + state.manual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots of all local providers for introspection.
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        let state = self.state.read();
        state
            .definitions
            .iter()
            .map(|p| ProviderDescriptor::from_provider(p, Origin::Local))
            .chain(state.manual.iter().map(|p| ProviderDescriptor::from_provider(p, Origin::Manual)))
            .collect()
    }

    /// JSON dump of [`descriptors`](Self::descriptors).
    #[cfg(feature = "diagnostics")]
    pub fn descriptors_json(&self) -> DiResult<String> {
        serde_json::to_string_pretty(&self.descriptors()).map_err(|e| DiError::Config(e.to_string()))
    }
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCatalog")
            .field("providers", &self.names())
            .field("frozen", &self.is_frozen())
            .field("generation", &self.generation())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingListener {
        events: AtomicUsize,
    }

    impl CatalogListener for CountingListener {
        fn on_catalog_event(&self, _catalog: &ProviderCatalog, _event: &CatalogEvent<'_>) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_identical_reregistration_is_allowed() {
        let catalog = ProviderCatalog::new();
        let provider = Provider::new("p1", TypeRef::named("Foo")).priority(3);
        catalog.register(provider.clone()).unwrap();
        catalog.register(provider).unwrap();
        assert_eq!(catalog.len(), 1);

        let changed = Provider::new("p1", TypeRef::named("Foo")).priority(4);
        assert!(matches!(catalog.register(changed), Err(DiError::DuplicateName(n)) if n == "p1"));
    }

    #[test]
    fn test_overriding_catalog_replaces_in_place() {
        let catalog = ProviderCatalog::with_options(CatalogOptions { allow_overriding: true });
        catalog.register(Provider::new("a", TypeRef::named("Foo"))).unwrap();
        catalog.register(Provider::new("b", TypeRef::named("Foo"))).unwrap();
        catalog.register(Provider::new("a", TypeRef::named("Foo")).primary()).unwrap();

        assert_eq!(catalog.names(), vec!["a", "b"]);
        assert!(catalog.get("a").unwrap().is_primary());
    }

    #[test]
    fn test_alias_claims() {
        let catalog = ProviderCatalog::new();
        catalog.register(Provider::new("a", TypeRef::named("Foo")).alias("x")).unwrap();

        assert_eq!(catalog.get("x").unwrap().name(), "a");
        assert!(catalog.register(Provider::new("x", TypeRef::named("Foo"))).is_err());
        assert!(catalog.register(Provider::new("b", TypeRef::named("Foo")).alias("a")).is_err());

        catalog.deregister("x").unwrap();
        assert!(!catalog.is_registered("a"));
        assert!(!catalog.is_registered("x"));
    }

    #[test]
    fn test_generation_and_memo() {
        let catalog = ProviderCatalog::new();
        let foo = TypeRef::named("Foo");
        let g0 = catalog.generation();
        assert!(catalog.lookup_by_type(&foo).is_empty());

        catalog.register(Provider::new("a", foo.clone())).unwrap();
        assert!(catalog.generation() > g0);
        assert_eq!(catalog.lookup_by_type(&foo).len(), 1);

        let first = catalog.lookup_by_type(&foo);
        let second = catalog.lookup_by_type(&foo);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_listeners_are_weak() {
        let catalog = ProviderCatalog::new();
        let listener = Arc::new(CountingListener { events: AtomicUsize::new(0) });
        let weak: Weak<dyn CatalogListener> = Arc::downgrade(&listener) as Weak<dyn CatalogListener>;
        catalog.add_listener(weak);

        catalog.register(Provider::new("a", TypeRef::named("Foo"))).unwrap();
        catalog.freeze();
        catalog.thaw();
        assert_eq!(listener.events.load(Ordering::SeqCst), 3);

        drop(listener);
        catalog.register(Provider::new("b", TypeRef::named("Foo"))).unwrap();
        assert!(catalog.listeners.lock().is_empty());
    }

    #[test]
    fn test_parent_entries_are_shadowed_by_local_names() {
        let parent = Arc::new(ProviderCatalog::new());
        parent.register(Provider::new("shared", TypeRef::named("Foo"))).unwrap();
        parent.register(Provider::new("inherited", TypeRef::named("Foo"))).unwrap();

        let child = ProviderCatalog::with_parent(parent.clone());
        child.register(Provider::new("shared", TypeRef::named("Foo")).primary()).unwrap();

        let found = child.lookup_by_type(&TypeRef::named("Foo"));
        let names: Vec<_> = found.iter().map(|e| (e.name().to_string(), e.origin)).collect();
        assert_eq!(
            names,
            vec![("shared".to_string(), Origin::Local), ("inherited".to_string(), Origin::Inherited)]
        );

        // Parent mutations are visible through the chain generation
        let before = child.generation();
        parent.register(Provider::new("late", TypeRef::named("Foo"))).unwrap();
        assert_ne!(child.generation(), before);
        assert_eq!(child.lookup_by_type(&TypeRef::named("Foo")).len(), 3);
    }
}
