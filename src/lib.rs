//! # ferrous-autowire
//!
//! Type-directed dependency resolution: given a catalog of named, typed
//! providers and a set of injection points, decide deterministically which
//! provider (or providers) satisfy each point.
//!
//! ## Features
//!
//! - **Covariant type matching**: declared supertypes, generic arguments and array covariance
//! - **Deterministic tie-breaking**: qualifier, primary, priority, then name fallback
//! - **Collection requests**: arrays, lists, sets, string-keyed maps and lazy streams
//! - **Shortcut caching**: repeat resolutions skip discovery entirely
//! - **Deferred handles**: resolution postponed until first use
//! - **Thread-safe**: many concurrent readers, rare catalog mutation
//!
//! The engine never builds objects itself. Once a provider is selected it asks
//! a [`Materializer`] for the instance.
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_autowire::{
//!     FnMaterializer, InjectionPoint, Instance, Provider, ProviderCatalog, ResolutionEngine, TypeRef,
//! };
//! use std::sync::Arc;
//!
//! struct Repository {
//!     url: &'static str,
//! }
//!
//! let catalog = Arc::new(ProviderCatalog::new());
//! catalog.register(Provider::new("replica", TypeRef::named("Repository")).priority(10)).unwrap();
//! catalog.register(Provider::new("primaryDb", TypeRef::named("Repository")).priority(1)).unwrap();
//!
//! let engine = ResolutionEngine::new(
//!     catalog,
//!     FnMaterializer::new(|request| {
//!         let url = match request.provider_name() {
//!             "primaryDb" => "postgres://primary",
//!             _ => "postgres://replica",
//!         };
//!         Ok(Instance::new(Repository { url }, TypeRef::named("Repository")))
//!     }),
//! );
//!
//! let point = InjectionPoint::new("UserService", 0, TypeRef::named("Repository"));
//! let repo = engine.resolve(&point).unwrap().downcast::<Repository>().unwrap();
//! assert_eq!(repo.url, "postgres://primary");
//! ```
//!
//! ## Collections
//!
//! ```rust
//! use ferrous_autowire::{EngineBuilder, InjectionPoint, Instance, ProviderCatalog, TypeRef};
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(ProviderCatalog::new());
//! catalog.register_instance("a", Instance::new(1u8, TypeRef::named("Handler"))).unwrap();
//! catalog.register_instance("b", Instance::new(2u8, TypeRef::named("Handler"))).unwrap();
//!
//! let engine = EngineBuilder::new(catalog).build();
//! let point = InjectionPoint::new("Dispatcher", 0, "List<Handler>".parse().unwrap());
//! assert_eq!(engine.resolve(&point).unwrap().instances().len(), 2);
//!
//! // Nothing registered is an empty collection, not an error
//! let none = InjectionPoint::new("Dispatcher", 1, "List<Filter>".parse().unwrap());
//! assert!(engine.resolve(&none).unwrap().instances().is_empty());
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod deferred;
pub mod descriptors;
pub mod engine;
pub mod error;
pub mod finder;
pub mod injection;
pub mod multiplicity;
pub mod observer;
pub mod qualifier;
pub mod resolution;
pub mod tie_breaker;
pub mod types;
pub mod validation;

pub use cache::{CacheEntry, ResolutionCache, Shortcut};
pub use catalog::{
    CatalogEntry, CatalogEvent, CatalogListener, CatalogOptions, Instance, Origin, Provider, ProviderCatalog,
};
pub use config::EngineConfig;
pub use deferred::{DeferredHandle, LazyIter, LazyStream};
pub use descriptors::ProviderDescriptor;
pub use engine::{
    EngineBuilder, FnMaterializer, InstanceMaterializer, MaterializeRequest, Materializer, ResolutionEngine,
};
pub use error::{DiError, DiResult};
pub use finder::{Candidate, CandidateFinder, CandidateSet, CandidateValue, MatchPass};
pub use injection::{InjectionKey, InjectionPoint};
pub use multiplicity::{DependencyComparator, Multiplicity, MultiplicityResolver, PriorityComparator};
pub use observer::{LoggingObserver, MetricsObserver, ResolutionObserver};
pub use qualifier::{Qualifier, Qualifiers};
pub use resolution::{BatchResolution, Resolution, Resolved};
pub use tie_breaker::{SelectionHint, TieBreak, TieBreaker};
pub use types::{SupertypeSource, TypeHierarchy, TypeRef};
pub use validation::{ValidationError, ValidationReport, ValidationWarning};

// Hash map used for internal tables
#[cfg(feature = "ahash")]
pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V>;
