//! Per-injection-point shortcut cache.
//!
//! Once a scalar point has been resolved to a single provider, the cache
//! remembers the provider name and expected type. Later resolutions of the
//! same point skip discovery and tie-breaking and go straight to
//! materialization.
//!
//! Reads take a shared lock on the entry table. Population happens under one
//! of [`STRIPE_COUNT`] striped mutexes, chosen by key hash, so concurrent
//! resolutions of the same point compute one entry between them.

use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::catalog::{CatalogEvent, CatalogListener, ProviderCatalog};
use crate::injection::InjectionKey;
use crate::types::TypeRef;
use crate::FastMap;

/// Number of slow-path lock stripes. Powers of 2 hash best.
pub const STRIPE_COUNT: usize = 64;

/// A pre-resolved candidate for one injection point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    /// Selected provider name
    pub provider: String,
    /// Type the materialized instance must satisfy
    pub expected: TypeRef,
}

/// What the cache knows about one injection point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    Shortcut(Shortcut),
    /// An optional point resolved to nothing
    NoneFound,
    /// Resolution must not be cached (e.g. it relied on self reference)
    NotCacheable,
}

#[derive(Debug, Clone)]
struct Slot {
    entry: CacheEntry,
    requested: TypeRef,
}

/// Shortcut cache keyed by injection point identity.
///
/// The cache subscribes to its catalog chain and drops entries as providers
/// come and go. It holds the catalog strongly; the catalog holds the cache
/// weakly through its listener list.
pub struct ResolutionCache {
    catalog: Arc<ProviderCatalog>,
    entries: RwLock<FastMap<InjectionKey, Slot>>,
    stripes: Box<[Mutex<()>]>,
    hasher: std::collections::hash_map::RandomState,
}

impl ResolutionCache {
    /// Creates a cache and subscribes it to `catalog` and all its ancestors.
    pub fn new(catalog: Arc<ProviderCatalog>) -> Arc<Self> {
        let cache = Arc::new(Self {
            catalog: catalog.clone(),
            entries: RwLock::new(FastMap::default()),
            stripes: (0..STRIPE_COUNT).map(|_| Mutex::new(())).collect(),
            hasher: Default::default(),
        });

        let weak = Arc::downgrade(&cache);
        let weak: Weak<dyn CatalogListener> = weak;
        let mut current = Some(&catalog);
        while let Some(c) = current {
            c.add_listener(weak.clone());
            current = c.parent();
        }
        cache
    }

    /// Fast-path read.
    pub fn get(&self, key: &InjectionKey) -> Option<CacheEntry> {
        self.entries.read().get(key).map(|slot| slot.entry.clone())
    }

    /// Slow-path lock for `key`. Hold it while re-checking and populating.
    pub(crate) fn lock_stripe(&self, key: &InjectionKey) -> MutexGuard<'_, ()> {
        let mut hasher = self.hasher.build_hasher();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) & (STRIPE_COUNT - 1);
        self.stripes[index].lock()
    }

    /// Stores an entry if the catalog did not change since `generation`.
    ///
    /// Returns false when the entry was discarded as already stale.
    pub(crate) fn store(&self, key: InjectionKey, requested: TypeRef, entry: CacheEntry, generation: u64) -> bool {
        let mut entries = self.entries.write();
        // Checked under the write lock so a concurrent invalidation either
        // runs first (and we bail) or sees our entry.
        if self.catalog.generation() != generation {
            return false;
        }
        entries.insert(key, Slot { entry, requested });
        true
    }

    /// Drops one entry.
    pub fn invalidate(&self, key: &InjectionKey) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Drops the entry for `key` only if it still equals `stale`.
    ///
    /// A concurrent slow path may have replaced the stale entry with a fresh
    /// one in the meantime; that entry is kept.
    pub(crate) fn invalidate_stale(&self, key: &InjectionKey, stale: &CacheEntry) -> bool {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(slot) if slot.entry == *stale => entries.remove(key).is_some(),
            _ => false,
        }
    }

    /// Drops every entry belonging to `owner`, e.g. after its metadata changed.
    pub fn reset_owner(&self, owner: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| key.owner() != owner);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Shortcut names currently cached, for diagnostics.
    pub fn shortcuts(&self) -> Vec<(InjectionKey, String)> {
        self.entries
            .read()
            .iter()
            .filter_map(|(key, slot)| match &slot.entry {
                CacheEntry::Shortcut(s) => Some((key.clone(), s.provider.clone())),
                _ => None,
            })
            .collect()
    }

    /// A new provider of `declared_type` may change any resolution whose
    /// requested type it is assignable to.
    fn drop_affected_by(&self, declared_type: &TypeRef) {
        let affected: Vec<InjectionKey> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|(_, slot)| {
                    self.catalog.is_assignable(declared_type, &slot.requested)
                        || self.catalog.is_assignable(&declared_type.raw(), &slot.requested.raw())
                })
                .map(|(key, _)| key.clone())
                .collect()
        };
        if !affected.is_empty() {
            let mut entries = self.entries.write();
            for key in affected {
                entries.remove(&key);
            }
        }
    }

    fn drop_referencing(&self, name: &str) {
        self.entries.write().retain(|_, slot| match &slot.entry {
            CacheEntry::Shortcut(s) => s.provider != name,
            _ => true,
        });
    }
}

impl CatalogListener for ResolutionCache {
    fn on_catalog_event(&self, _catalog: &ProviderCatalog, event: &CatalogEvent<'_>) {
        match event {
            CatalogEvent::Registered { declared_type, .. } => self.drop_affected_by(declared_type),
            CatalogEvent::Replaced { name, declared_type, .. } => {
                self.drop_referencing(name);
                self.reset_owner(name);
                self.drop_affected_by(declared_type);
            }
            CatalogEvent::Deregistered { name, .. } => {
                self.drop_referencing(name);
                self.reset_owner(name);
            }
            CatalogEvent::HierarchyChanged | CatalogEvent::Frozen | CatalogEvent::Thawed => self.clear(),
        }
        tracing::trace!(target: "ferrous_autowire", event = ?event, remaining = self.len(), "cache invalidation");
    }
}

impl std::fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionCache").field("entries", &self.len()).finish()
    }
}
