//! Property-based tests for vigil-core using proptest.

use proptest::prelude::*;
use vigil_core::{MapRef, ObjectRef, PropertyKey, SetRef, Value, WeakTable};

proptest! {
    /// Test that maps keep first-insertion order across overwrites and deletes.
    #[test]
    fn map_preserves_insertion_order(ops in prop::collection::vec((0i32..10, any::<bool>()), 1..100)) {
        let map = MapRef::new();
        let mut model: Vec<i32> = Vec::new();
        for (k, insert) in ops {
            if insert {
                map.set(Value::from(k), Value::from(k));
                if !model.contains(&k) {
                    model.push(k);
                }
            } else {
                map.delete(&Value::from(k));
                model.retain(|&m| m != k);
            }
        }
        let expected: Vec<Value> = model.into_iter().map(Value::from).collect();
        prop_assert_eq!(map.keys(), expected);
    }

    /// Test that sets never hold duplicates.
    #[test]
    fn set_has_no_duplicates(values in prop::collection::vec(0i32..20, 0..100)) {
        let set = SetRef::new();
        for &v in &values {
            set.add(Value::from(v));
        }
        let mut unique = values.clone();
        unique.sort_unstable();
        unique.dedup();
        prop_assert_eq!(set.len(), unique.len());
    }

    /// Test that object keys come back in definition order.
    #[test]
    fn object_keys_in_definition_order(names in prop::collection::vec("[a-e]", 1..30)) {
        let obj = ObjectRef::new();
        let mut model: Vec<String> = Vec::new();
        for name in names {
            obj.set(name.as_str(), 1).unwrap();
            if !model.contains(&name) {
                model.push(name);
            }
        }
        let expected: Vec<PropertyKey> = model.into_iter().map(PropertyKey::from).collect();
        prop_assert_eq!(obj.own_keys(), expected);
    }

    /// Test that weak tables only report live keys after a purge.
    #[test]
    fn weak_table_forgets_dropped_keys(keep in prop::collection::vec(any::<bool>(), 1..40)) {
        let mut table = WeakTable::new();
        let mut alive = Vec::new();
        for (i, &k) in keep.iter().enumerate() {
            let key = Value::from(ObjectRef::new());
            table.insert(&key, i).unwrap();
            if k {
                alive.push(key);
            }
        }
        table.purge();
        prop_assert_eq!(table.len(), alive.len());
        for key in &alive {
            prop_assert!(table.contains_key(key));
        }
    }
}
