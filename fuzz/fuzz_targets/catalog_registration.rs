#![no_main]

use ferrous_autowire::{
    EngineBuilder, FnMaterializer, InjectionPoint, Instance, Provider, ProviderCatalog, TypeRef,
};
use libfuzzer_sys::fuzz_target;
use std::collections::HashSet;
use std::sync::Arc;

const TYPES: &[&str] = &["Foo", "Bar", "Baz", "Qux"];

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let catalog = Arc::new(ProviderCatalog::new());
    catalog.declare_supertype("Baz", TypeRef::named("Foo")).unwrap();
    let engine = EngineBuilder::new(catalog.clone())
        .materializer(FnMaterializer::new(|request| {
            Ok(Instance::new((), request.provider().declared_type().clone()))
        }))
        .build();

    let mut live: HashSet<String> = HashSet::new();

    // Each 4-byte chunk is one operation: op, name, type, flags
    for chunk in data.chunks_exact(4) {
        let name = format!("p{}", chunk[1] % 16);
        let ty = TypeRef::named(TYPES[(chunk[2] as usize) % TYPES.len()]);
        let flags = chunk[3];

        match chunk[0] % 5 {
            0 => {
                let mut provider = Provider::new(name.clone(), ty).with_primary(flags & 1 == 1);
                if flags & 2 == 2 {
                    provider = provider.priority((flags >> 4) as i32);
                }
                if flags & 4 == 4 {
                    provider = provider.qualifier("tagged");
                }
                // Re-registering an identical definition succeeds; anything else
                // under a live name must be rejected
                let was_live = live.contains(&name);
                let before = catalog.get(&name);
                match catalog.register(provider) {
                    Ok(()) => {
                        if was_live {
                            let after = catalog.get(&name).expect("live provider");
                            assert!(before.expect("live provider").same_definition(&after));
                        }
                        live.insert(name);
                    }
                    Err(_) => assert!(was_live || catalog.is_frozen()),
                }
            }
            1 => match catalog.deregister(&name) {
                Ok(_) => assert!(live.remove(&name)),
                Err(_) => assert!(catalog.is_frozen() || !live.contains(&name)),
            },
            2 => {
                let point = InjectionPoint::new("Owner", (flags % 4) as usize, ty).with_required(flags & 8 == 0);
                // Any outcome is fine; panics are not
                let _ = engine.resolve(&point);
                let _ = engine.resolve(&point);
            }
            3 => {
                let point = InjectionPoint::new("Owner", 10, TypeRef::list(ty.clone()));
                let found = engine.resolve(&point).map(|r| r.instances().len()).unwrap_or(0);
                assert!(found <= catalog.lookup_by_type(&ty).len().max(1));
            }
            _ => {
                if flags & 1 == 1 {
                    catalog.freeze();
                } else {
                    catalog.thaw();
                }
            }
        }
    }

    assert_eq!(catalog.len(), live.len());
});
