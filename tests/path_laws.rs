//! Property-based tests for path navigation.
//!
//! Verifies the get/set, update and delete laws over nested values built
//! from persistent mappings, plain mappings and lists.

use proptest::prelude::*;
use typed_map::path::{delete_in, get_in, has_in, set_in, update_in};
use typed_map::persistent::PersistentMap;
use typed_map::{PlainMap, Value};

// =============================================================================
// Strategy for generating test data
// =============================================================================

fn arbitrary_key() -> impl Strategy<Value = String> {
    "[a-d]{1,2}"
}

fn arbitrary_path() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arbitrary_key(), 1..6)
}

fn arbitrary_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        "[a-z]{0,8}".prop_map(Value::Text),
    ]
}

fn arbitrary_value() -> impl Strategy<Value = Value> {
    arbitrary_scalar().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec((arbitrary_key(), inner.clone()), 0..4)
                .prop_map(|entries| Value::Map(entries.into_iter().collect())),
            prop::collection::btree_map(arbitrary_key(), inner, 0..4).prop_map(Value::Plain),
        ]
    })
}

fn root_map(value: &Value) -> Result<&PersistentMap<String, Value>, TestCaseError> {
    value
        .as_map()
        .ok_or_else(|| TestCaseError::fail("root must stay a map"))
}

fn arbitrary_root() -> impl Strategy<Value = Value> {
    prop::collection::vec((arbitrary_key(), arbitrary_value()), 0..6)
        .prop_map(|entries| Value::Map(entries.into_iter().collect::<PersistentMap<_, _>>()))
}

// =============================================================================
// Get-Set Law: get_in(set_in(m, p, v), p) == v
// =============================================================================

proptest! {
    #[test]
    fn prop_get_after_set(root in arbitrary_root(), path in arbitrary_path(), value in arbitrary_value()) {
        let updated = set_in(&root, &path, value.clone());
        prop_assert_eq!(get_in(&updated, &path), Some(&value));
    }

    #[test]
    fn prop_set_leaves_original_untouched(root in arbitrary_root(), path in arbitrary_path(), value in arbitrary_value()) {
        let before = root.to_plain_deep();
        let _ = set_in(&root, &path, value);
        prop_assert_eq!(root, before);
    }
}

// =============================================================================
// Set-Get Law: writing back what is there shares the original root
// =============================================================================

proptest! {
    #[test]
    fn prop_set_stored_value_is_identity(root in arbitrary_root(), path in arbitrary_path()) {
        if let Some(existing) = get_in(&root, &path) {
            let rewritten = set_in(&root, &path, existing.clone());
            prop_assert_eq!(&rewritten, &root);
            prop_assert!(root_map(&rewritten)?.ptr_eq(root_map(&root)?));
        }
    }
}

// =============================================================================
// Update Law: update_in(p, f) == set_in(p, f(get_in(p)))
// =============================================================================

proptest! {
    #[test]
    fn prop_update_is_set_of_get(root in arbitrary_root(), path in arbitrary_path()) {
        let wrap = |current: Option<&Value>| Value::List(vec![current.cloned().unwrap_or(Value::Null)]);

        let updated = update_in(&root, &path, wrap);
        let expected = set_in(&root, &path, wrap(get_in(&root, &path)));
        prop_assert_eq!(updated, expected);
    }
}

// =============================================================================
// Delete Laws
// =============================================================================

proptest! {
    #[test]
    fn prop_delete_after_set_removes(root in arbitrary_root(), path in arbitrary_path(), value in arbitrary_value()) {
        let updated = set_in(&root, &path, value);
        let before = updated.to_plain_deep();
        let deleted = delete_in(&updated, &path);

        prop_assert!(!has_in(&deleted, &path));
        prop_assert!(has_in(&deleted, &path[..path.len() - 1]));
        prop_assert_eq!(&updated, &before);
        prop_assert!(has_in(&updated, &path));
    }

    #[test]
    fn prop_delete_absent_is_identity(root in arbitrary_root(), path in arbitrary_path()) {
        prop_assume!(!has_in(&root, &path));
        let deleted = delete_in(&root, &path);

        prop_assert!(root_map(&deleted)?.ptr_eq(root_map(&root)?));
    }
}

// =============================================================================
// Representation: plain intermediates stay plain
// =============================================================================

proptest! {
    #[test]
    fn prop_plain_intermediate_is_kept(key in arbitrary_key(), inner in arbitrary_key(), value in arbitrary_scalar()) {
        let root = Value::Map(PersistentMap::singleton(key.clone(), Value::Plain(PlainMap::new())));
        let updated = set_in(&root, &[key.clone(), inner], value);

        prop_assert!(updated.get(&key).is_some_and(|child| child.as_plain().is_some()));
    }
}

// =============================================================================
// Lists: index keys address elements, other keys leave the list alone
// =============================================================================

fn arbitrary_list_root() -> impl Strategy<Value = (Value, usize)> {
    prop::collection::vec(arbitrary_scalar(), 0..6).prop_map(|items| {
        let length = items.len();
        (Value::Map(PersistentMap::singleton("items".to_string(), Value::List(items))), length)
    })
}

proptest! {
    #[test]
    fn prop_list_get_after_set((root, length) in arbitrary_list_root(), index in 0_usize..8, value in arbitrary_scalar()) {
        let path = ["items".to_string(), index.to_string()];
        let before = root.to_plain_deep();
        let updated = set_in(&root, &path, value.clone());

        prop_assert_eq!(get_in(&updated, &path), Some(&value));
        prop_assert_eq!(updated.get("items").and_then(Value::len), Some(length.max(index + 1)));
        prop_assert_eq!(&root, &before);
    }

    #[test]
    fn prop_list_delete_shrinks_by_one((root, length) in arbitrary_list_root(), index in 0_usize..6) {
        prop_assume!(index < length);
        let before = root.to_plain_deep();
        let deleted = delete_in(&root, &["items".to_string(), index.to_string()]);

        prop_assert_eq!(deleted.get("items").and_then(Value::len), Some(length - 1));
        prop_assert_eq!(&root, &before);
    }

    #[test]
    fn prop_list_ignores_non_index_keys((root, _) in arbitrary_list_root(), key in arbitrary_key(), value in arbitrary_scalar()) {
        let updated = set_in(&root, &["items".to_string(), key], value);
        prop_assert!(root_map(&updated)?.ptr_eq(root_map(&root)?));
    }
}
