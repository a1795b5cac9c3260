use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_autowire::*;
use std::sync::Arc;

// ===== Helpers =====

fn engine(catalog: Arc<ProviderCatalog>, config: EngineConfig) -> ResolutionEngine {
    EngineBuilder::new(catalog)
        .config(config)
        .materializer(FnMaterializer::new(|request| {
            Ok(Instance::new(42u64, request.provider().declared_type().clone()))
        }))
        .build()
}

fn catalog_with(count: usize, ty: &TypeRef) -> Arc<ProviderCatalog> {
    let catalog = Arc::new(ProviderCatalog::new());
    for i in 0..count {
        catalog.register(Provider::new(format!("p{}", i), ty.clone()).priority(i as i32)).unwrap();
    }
    catalog
}

// ===== Micro Benchmarks =====

fn bench_shortcut_hit(c: &mut Criterion) {
    let foo = TypeRef::named("Foo");
    let engine = engine(catalog_with(8, &foo), EngineConfig::default());
    let point = InjectionPoint::new("Svc", 0, foo);

    // Prime the shortcut
    engine.resolve(&point).unwrap();

    c.bench_function("shortcut_hit", |b| {
        b.iter(|| {
            let r = engine.resolve(black_box(&point)).unwrap();
            black_box(r);
        })
    });
}

fn bench_full_selection(c: &mut Criterion) {
    let foo = TypeRef::named("Foo");
    let config = EngineConfig { cache_shortcuts: false, ..EngineConfig::default() };
    let engine = engine(catalog_with(8, &foo), config);
    let point = InjectionPoint::new("Svc", 0, foo);

    c.bench_function("full_selection_uncached", |b| {
        b.iter(|| {
            let r = engine.resolve(black_box(&point)).unwrap();
            black_box(r);
        })
    });
}

fn bench_cached_vs_uncached(c: &mut Criterion) {
    let foo = TypeRef::named("Foo");
    let mut group = c.benchmark_group("cached_vs_uncached");

    for count in [1usize, 16, 128] {
        let catalog = catalog_with(count, &foo);
        let cached = engine(catalog.clone(), EngineConfig::default());
        let uncached = engine(catalog, EngineConfig { cache_shortcuts: false, ..EngineConfig::default() });
        let point = InjectionPoint::new("Svc", 0, foo.clone());
        cached.resolve(&point).unwrap();

        group.bench_with_input(BenchmarkId::new("cached", count), &count, |b, _| {
            b.iter(|| black_box(cached.resolve(&point).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("uncached", count), &count, |b, _| {
            b.iter(|| black_box(uncached.resolve(&point).unwrap()))
        });
    }

    group.finish();
}

fn bench_collection_scaling(c: &mut Criterion) {
    let handler = TypeRef::named("Handler");
    let mut group = c.benchmark_group("collection");

    for count in [4usize, 32, 256] {
        let engine = engine(catalog_with(count, &handler), EngineConfig::default());
        let point = InjectionPoint::new("Dispatcher", 0, TypeRef::list(handler.clone()));

        group.bench_with_input(BenchmarkId::new("list", count), &count, |b, _| {
            b.iter(|| black_box(engine.resolve(&point).unwrap().instances().len()))
        });
    }

    group.finish();
}

fn bench_covariant_lookup(c: &mut Criterion) {
    let catalog = Arc::new(ProviderCatalog::new());
    for depth in 0..8 {
        catalog
            .declare_supertype(format!("Level{}", depth + 1), TypeRef::named(format!("Level{}", depth)))
            .unwrap();
    }
    catalog.register(Provider::new("deep", TypeRef::named("Level8"))).unwrap();

    c.bench_function("lookup_by_type_memoized", |b| {
        b.iter(|| black_box(catalog.lookup_by_type(&TypeRef::named("Level0")).len()))
    });
    c.bench_function("is_assignable_depth_8", |b| {
        b.iter(|| black_box(catalog.is_assignable(&TypeRef::named("Level8"), &TypeRef::named("Level0"))))
    });
}

fn bench_type_parsing(c: &mut Criterion) {
    c.bench_function("parse_nested_type", |b| {
        b.iter(|| black_box("Map<String, List<Repo<User, ?>>>".parse::<TypeRef>().unwrap()))
    });
}

// ===== Macro Benchmarks =====

fn bench_large_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("large_catalog");

    for count in [100usize, 1000] {
        let catalog = Arc::new(ProviderCatalog::new());
        for i in 0..count {
            catalog.register(Provider::new(format!("svc{}", i), TypeRef::named(format!("Type{}", i)))).unwrap();
        }
        catalog.freeze();
        let engine = engine(catalog, EngineConfig::default());
        let points: Vec<InjectionPoint> = (0..count)
            .step_by(count / 10)
            .map(|i| InjectionPoint::new("Owner", i, TypeRef::named(format!("Type{}", i))))
            .collect();

        group.bench_with_input(BenchmarkId::new("resolve_all", count), &count, |b, _| {
            b.iter(|| black_box(engine.resolve_all(&points).unwrap().len()))
        });
    }

    group.finish();
}

criterion_group!(
    micro_benches,
    bench_shortcut_hit,
    bench_full_selection,
    bench_cached_vs_uncached,
    bench_collection_scaling,
    bench_covariant_lookup,
    bench_type_parsing
);

criterion_group!(macro_benches, bench_large_catalog);

criterion_main!(micro_benches, macro_benches);
