#![no_main]

use ferrous_autowire::{Multiplicity, TypeHierarchy, TypeRef};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => return,
    };

    let ty = match input.parse::<TypeRef>() {
        Ok(ty) => ty,
        Err(_) => return,
    };

    // Display output must parse back to the same descriptor
    let text = ty.to_string();
    let reparsed: TypeRef = text.parse().expect("display output must parse");
    assert_eq!(reparsed, ty);

    let _ = Multiplicity::classify(&ty);
    let raw = ty.raw();
    assert_eq!(raw.raw(), raw);

    let types = TypeHierarchy::new();
    assert!(types.is_assignable(&ty, &ty));
    assert!(types.is_assignable(&ty, &raw));
});
