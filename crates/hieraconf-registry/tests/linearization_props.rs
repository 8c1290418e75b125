use hieraconf_model::RecordSchema;
use hieraconf_registry::{RegistryError, TypeRegistry};
use proptest::prelude::*;
use std::collections::HashMap;

fn bases_for(index: usize, raw: &[usize]) -> Vec<usize> {
    let mut out = Vec::new();
    for &b in raw {
        if b < index && !out.contains(&b) {
            out.push(b);
        }
    }
    out
}

proptest! {
    #[test]
    fn prop_c3_orders_are_consistent(
        raw in proptest::collection::vec(proptest::collection::vec(0..10usize, 0..4), 1..10)
    ) {
        let registry = TypeRegistry::new();
        let mut declared: HashMap<String, Vec<String>> = HashMap::new();

        for (i, raw_bases) in raw.iter().enumerate() {
            let name = format!("T{i}");
            let bases: Vec<String> = bases_for(i, raw_bases).into_iter().map(|b| format!("T{b}")).collect();
            let mut builder = RecordSchema::builder(&name);
            for base in &bases {
                builder = builder.extends(base.clone());
            }
            let before = registry.len();
            match registry.register(builder.build().unwrap()) {
                Ok(_) => {
                    declared.insert(name, bases);
                }
                Err(RegistryError::InvalidLinearization { .. } | RegistryError::UnknownType { .. }) => {
                    // Failed registrations commit nothing
                    prop_assert_eq!(registry.len(), before);
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }

        for name in declared.keys() {
            let id = registry.lookup(name).unwrap();
            let order = registry.linearize(id).unwrap();
            let names = order.names();
            let pos = |n: &str| names.iter().position(|x| x == n);

            // Self first, no repeats
            prop_assert_eq!(&names[0], name);
            for (i, n) in names.iter().enumerate() {
                prop_assert_eq!(pos(n), Some(i));
            }

            // Every type precedes its bases, bases keep declaration order
            for n in names {
                let bases = &declared[n];
                let mut last = pos(n).unwrap();
                for base in bases {
                    let p = pos(base);
                    prop_assert!(p.is_some(), "{} missing from order of {}", base, name);
                    let p = p.unwrap();
                    prop_assert!(p > last, "{} out of order in {}", base, name);
                    last = p;
                }
            }

            // Monotonic with each base's own order
            for base in &declared[name] {
                let base_order = registry.linearize(registry.lookup(base).unwrap()).unwrap();
                let projected: Vec<&String> = names.iter().filter(|n| base_order.names().contains(n)).collect();
                let expected: Vec<&String> = base_order.names().iter().collect();
                prop_assert_eq!(projected, expected);
            }
        }
    }
}

#[test]
fn failed_batch_leaves_lazy_map_untouched() {
    let registry = TypeRegistry::new();
    let bad = RecordSchema::builder("Broken").extends("Nowhere").build().unwrap();
    assert!(registry.register(bad).is_err());
    assert_eq!(registry.lazy_pair_count(), 0);
    assert!(registry.type_names().is_empty());
}
