/// Deferred and optional injection tests

use ferrous_autowire::{
    DiError, EngineBuilder, FnMaterializer, InjectionPoint, Instance, Provider, ProviderCatalog, Resolution,
    ResolutionEngine, Resolved, TypeRef,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Label(String);

fn clock() -> TypeRef {
    TypeRef::named("Clock")
}

fn engine(catalog: Arc<ProviderCatalog>, calls: Arc<AtomicUsize>) -> ResolutionEngine {
    EngineBuilder::new(catalog)
        .materializer(FnMaterializer::new(move |request| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Instance::new(
                Label(request.provider_name().to_string()),
                request.provider().declared_type().clone(),
            ))
        }))
        .build()
}

fn text(resolution: &Resolution) -> Option<String> {
    resolution.downcast::<Label>().map(|l| l.0.clone())
}

#[test]
fn test_deferred_does_not_resolve_eagerly() {
    let catalog = Arc::new(ProviderCatalog::new());
    catalog.register(Provider::new("system", clock())).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = engine(catalog, calls.clone());

    let point = InjectionPoint::new("Svc", 0, TypeRef::deferred(clock()));
    let resolution = engine.resolve(&point).unwrap();
    let handle = resolution.deferred().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(handle.target_type(), &clock());

    assert_eq!(text(&handle.get().unwrap()).as_deref(), Some("system"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_deferred_sees_later_registrations() {
    let catalog = Arc::new(ProviderCatalog::new());
    let engine = engine(catalog.clone(), Arc::new(AtomicUsize::new(0)));
    let point = InjectionPoint::new("Svc", 0, TypeRef::deferred(clock()));
    let handle = engine.resolve(&point).unwrap().deferred().cloned().unwrap();

    assert!(matches!(handle.get(), Err(DiError::Unsatisfied { .. })));
    assert!(handle.get_if_available().unwrap().is_none());

    catalog.register(Provider::new("system", clock())).unwrap();
    assert_eq!(text(&handle.get().unwrap()).as_deref(), Some("system"));
}

#[test]
fn test_get_if_unique_tolerates_ambiguity() {
    let catalog = Arc::new(ProviderCatalog::new());
    catalog.register(Provider::new("a", clock())).unwrap();
    catalog.register(Provider::new("b", clock())).unwrap();
    let engine = engine(catalog, Arc::new(AtomicUsize::new(0)));
    let handle = engine
        .resolve(&InjectionPoint::new("Svc", 0, TypeRef::deferred(clock())))
        .unwrap()
        .deferred()
        .cloned()
        .unwrap();

    assert!(matches!(handle.get_if_available(), Err(DiError::AmbiguousCandidate { .. })));
    assert!(handle.get_if_unique().unwrap().is_none());
}

#[test]
fn test_get_if_unique_treats_every_tie_break_failure_alike() {
    let handle_for = |catalog: Arc<ProviderCatalog>| {
        engine(catalog, Arc::new(AtomicUsize::new(0)))
            .resolve(&InjectionPoint::new("Svc", 0, TypeRef::deferred(clock())))
            .unwrap()
            .deferred()
            .cloned()
            .unwrap()
    };

    let primaries = Arc::new(ProviderCatalog::new());
    primaries.register(Provider::new("a", clock()).primary()).unwrap();
    primaries.register(Provider::new("b", clock()).primary()).unwrap();
    let handle = handle_for(primaries);
    assert!(matches!(handle.get(), Err(DiError::AmbiguousPrimary { .. })));
    assert!(handle.get_if_unique().unwrap().is_none());

    let priorities = Arc::new(ProviderCatalog::new());
    priorities.register(Provider::new("a", clock()).priority(1)).unwrap();
    priorities.register(Provider::new("b", clock()).priority(1)).unwrap();
    let handle = handle_for(priorities);
    assert!(matches!(handle.get_if_available(), Err(DiError::DuplicatePriority { .. })));
    assert!(handle.get_if_unique().unwrap().is_none());
}

#[test]
fn test_handle_streams() {
    let catalog = Arc::new(ProviderCatalog::new());
    catalog.register(Provider::new("slow", clock()).priority(9)).unwrap();
    catalog.register(Provider::new("fast", clock()).priority(1)).unwrap();
    let engine = engine(catalog, Arc::new(AtomicUsize::new(0)));
    let handle = engine
        .resolve(&InjectionPoint::new("Svc", 0, TypeRef::deferred(clock())))
        .unwrap()
        .deferred()
        .cloned()
        .unwrap();

    assert_eq!(handle.stream().names(), vec!["slow", "fast"]);
    assert_eq!(handle.ordered_stream().names(), vec!["fast", "slow"]);
    assert_eq!(handle.ordered_stream().iter().len(), 2);
}

#[test]
fn test_optional_wrapper_resolves_to_absent() {
    let catalog = Arc::new(ProviderCatalog::new());
    let engine = engine(catalog.clone(), Arc::new(AtomicUsize::new(0)));
    let point = InjectionPoint::new("Svc", 0, TypeRef::optional(clock()));

    let resolution = engine.resolve(&point).unwrap();
    let handle = resolution.deferred().unwrap();
    assert!(!handle.point().is_required());
    assert!(handle.resolve().unwrap().is_absent());

    catalog.register(Provider::new("system", clock())).unwrap();
    assert_eq!(text(&handle.resolve().unwrap()).as_deref(), Some("system"));
}

#[test]
fn test_nested_point_has_its_own_cache_key() {
    let catalog = Arc::new(ProviderCatalog::new());
    catalog.register(Provider::new("system", clock())).unwrap();
    let engine = engine(catalog, Arc::new(AtomicUsize::new(0)));

    let outer = InjectionPoint::new("Svc", 0, TypeRef::deferred(clock()));
    let handle = engine.resolve(&outer).unwrap().deferred().cloned().unwrap();
    handle.get().unwrap();

    assert_ne!(handle.point().key(), outer.key());
    assert_eq!(handle.point().key().nesting(), 1);
    assert!(engine.cache().get(handle.point().key()).is_some());
    assert!(engine.cache().get(outer.key()).is_none());
}

#[test]
fn test_deferred_collection() {
    let catalog = Arc::new(ProviderCatalog::new());
    catalog.register(Provider::new("a", clock())).unwrap();
    let engine = engine(catalog, Arc::new(AtomicUsize::new(0)));

    let point = InjectionPoint::new("Svc", 0, TypeRef::deferred(TypeRef::list(clock())));
    let handle = engine.resolve(&point).unwrap().deferred().cloned().unwrap();
    match handle.get().unwrap() {
        Resolution::Found(Resolved::List(items)) => assert_eq!(items.len(), 1),
        other => panic!("expected list, got {:?}", other),
    }
}
