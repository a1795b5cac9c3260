/// Observer hook tests
///
/// Callbacks arrive in resolution order and the logging observer runs
/// under a real subscriber.

use ferrous_autowire::{
    DiError, EngineBuilder, FnMaterializer, InjectionPoint, Instance, LoggingObserver, MatchPass, MetricsObserver,
    Provider, ProviderCatalog, ResolutionEngine, ResolutionObserver, TypeRef,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock())
    }
}

impl ResolutionObserver for Recorder {
    fn resolving(&self, point: &InjectionPoint) {
        self.calls.lock().push(format!("resolving {}", point.key()));
    }

    fn candidates_found(&self, _point: &InjectionPoint, pass: MatchPass, names: &[String]) {
        self.calls.lock().push(format!("candidates {:?} {}", pass, names.join(",")));
    }

    fn shortcut_hit(&self, _point: &InjectionPoint, provider: &str) {
        self.calls.lock().push(format!("shortcut {}", provider));
    }

    fn resolved(&self, _point: &InjectionPoint, _duration: Duration) {
        self.calls.lock().push("resolved".to_string());
    }

    fn failed(&self, _point: &InjectionPoint, error: &DiError) {
        let kind = match error {
            DiError::Unsatisfied { .. } => "unsatisfied",
            _ => "other",
        };
        self.calls.lock().push(format!("failed {}", kind));
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("ferrous_autowire=trace"))
        .with_test_writer()
        .try_init();
}

fn engine(catalog: Arc<ProviderCatalog>, observers: Vec<Arc<dyn ResolutionObserver>>) -> ResolutionEngine {
    let mut builder = EngineBuilder::new(catalog).materializer(FnMaterializer::new(|request| {
        Ok(Instance::new(request.provider_name().to_string(), request.provider().declared_type().clone()))
    }));
    for observer in observers {
        builder = builder.observer(observer);
    }
    builder.build()
}

#[test]
fn test_callback_order_for_discovery_then_shortcut() {
    let catalog = Arc::new(ProviderCatalog::new());
    catalog.register(Provider::new("p1", TypeRef::named("Foo"))).unwrap();
    let recorder = Arc::new(Recorder::default());
    let engine = engine(catalog, vec![recorder.clone() as Arc<dyn ResolutionObserver>]);
    let point = InjectionPoint::new("Svc", 0, TypeRef::named("Foo"));

    engine.resolve(&point).unwrap();
    let first = recorder.take();
    assert!(first[0].starts_with("resolving"));
    assert!(first.contains(&"candidates Strict p1".to_string()));
    assert_eq!(first.last().map(String::as_str), Some("resolved"));

    engine.resolve(&point).unwrap();
    let second = recorder.take();
    assert_eq!(second.len(), 3);
    assert_eq!(second[1], "shortcut p1");
    assert_eq!(second[2], "resolved");
}

#[test]
fn test_failure_is_reported_once() {
    let recorder = Arc::new(Recorder::default());
    let engine = engine(Arc::new(ProviderCatalog::new()), vec![recorder.clone() as Arc<dyn ResolutionObserver>]);

    let err = engine.resolve(&InjectionPoint::new("Svc", 0, TypeRef::named("Missing"))).unwrap_err();
    assert!(matches!(err, DiError::Unsatisfied { .. }));

    let calls = recorder.take();
    assert!(calls[0].starts_with("resolving"));
    assert_eq!(calls.iter().filter(|c| c.starts_with("failed")).count(), 1);
    assert_eq!(calls.last().map(String::as_str), Some("failed unsatisfied"));
    assert!(!calls.contains(&"resolved".to_string()));
}

#[test]
fn test_logging_and_metrics_observers_together() {
    init_tracing();
    let catalog = Arc::new(ProviderCatalog::new());
    catalog.register(Provider::new("p1", TypeRef::named("Foo"))).unwrap();
    let metrics = Arc::new(MetricsObserver::new());
    let engine = engine(
        catalog.clone(),
        vec![
            Arc::new(LoggingObserver::with_label("observer-test")) as Arc<dyn ResolutionObserver>,
            metrics.clone(),
        ],
    );
    let point = InjectionPoint::new("Svc", 0, TypeRef::named("Foo"));

    engine.resolve(&point).unwrap();
    engine.resolve(&point).unwrap();
    catalog.register(Provider::new("p2", TypeRef::named("Bar"))).unwrap();
    assert!(engine.resolve(&InjectionPoint::new("Svc", 1, TypeRef::named("Baz"))).is_err());

    assert_eq!(metrics.resolution_count(), 2);
    assert_eq!(metrics.shortcut_hits(), 1);
    assert_eq!(metrics.failure_count(), 1);
    assert!(metrics.average_resolution_time().is_some());

    metrics.reset();
    assert_eq!(metrics.resolution_count(), 0);
}
