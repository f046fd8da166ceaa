//! Integration tests for record sessions and mutable handles.

use proptest::prelude::*;
use rstest::{fixture, rstest};
use typed_map::prelude::*;

#[derive(Debug, Schema)]
struct Inventory {
    apples: i64,
    pears: i64,
    plums: i64,
    #[field(default = "main".to_string())]
    warehouse: String,
}

const COUNTS: [Field<Inventory, i64>; 3] = [Inventory::APPLES, Inventory::PEARS, Inventory::PLUMS];

#[fixture]
fn stocked() -> TypedMap<Inventory> {
    TypedMap::<Inventory>::default()
        .set(Inventory::APPLES, 4)
        .set(Inventory::PEARS, 2)
}

// =============================================================================
// RecordSession
// =============================================================================

#[rstest]
fn session_batches_sets(stocked: TypedMap<Inventory>) {
    let mut session = stocked.begin();
    session
        .set(Inventory::APPLES, 10)
        .set(Inventory::PLUMS, 7)
        .set(Inventory::WAREHOUSE, "north".to_string());

    assert_eq!(session.get(Inventory::APPLES), Some(10));
    assert_eq!(session.len(), stocked.len());

    let restocked = session.end();
    assert_eq!(restocked.get(Inventory::APPLES), Some(10));
    assert_eq!(restocked.get(Inventory::PEARS), Some(2));
    assert_eq!(restocked.get(Inventory::PLUMS), Some(7));
    assert_eq!(stocked.get(Inventory::APPLES), Some(4));
    assert_eq!(stocked.get(Inventory::WAREHOUSE).as_deref(), Some("main"));
}

#[rstest]
fn unaltered_session_returns_original(stocked: TypedMap<Inventory>) {
    let mut session = stocked.begin();
    session.set(Inventory::APPLES, 4);

    assert!(!session.was_altered());
    assert!(session.end().ptr_eq(&stocked));
}

#[rstest]
fn session_set_key_validates(stocked: TypedMap<Inventory>) {
    let mut session = stocked.begin();

    assert!(session.set_key("pears", 9).is_ok());
    assert_eq!(
        session.set_key("bananas", 1),
        Err(RecordError::UnknownField {
            schema: "Inventory",
            field: "bananas".to_string()
        })
    );
    assert_eq!(session.end().get(Inventory::PEARS), Some(9));
}

#[rstest]
fn session_merge_copies_fields(stocked: TypedMap<Inventory>) {
    let delivery = TypedMap::<Inventory>::default().set(Inventory::PLUMS, 12);
    let mut session = stocked.begin();
    session.merge([&delivery]);

    let merged = session.end();
    assert_eq!(merged.get(Inventory::PLUMS), Some(12));
    assert_eq!(merged, stocked.merge([&delivery]));
}

#[rstest]
fn session_rejects_structural_operations(stocked: TypedMap<Inventory>) {
    let path = KeyPath::new(["apples"]).unwrap();
    let mut session = stocked.begin();

    assert_eq!(
        session.delete("apples"),
        Err(RecordError::UnsupportedInSession { operation: "delete" })
    );
    assert!(matches!(
        session.set_in(&path, 1),
        Err(RecordError::UnsupportedInSession { .. })
    ));
    assert!(matches!(
        session.delete_in(&path),
        Err(RecordError::UnsupportedInSession { .. })
    ));
    assert!(!session.was_altered());
}

#[rstest]
fn with_mutations_commits_or_discards(stocked: TypedMap<Inventory>) {
    let committed = stocked
        .with_mutations(|session| {
            session.set(Inventory::PEARS, 0);
            session.set_key("plums", 3)
        })
        .unwrap();
    assert_eq!(committed.get(Inventory::PEARS), Some(0));
    assert_eq!(committed.get(Inventory::PLUMS), Some(3));

    let failed = stocked.with_mutations(|session| {
        session.set(Inventory::PEARS, 0);
        session.delete("apples")
    });
    assert!(failed.is_err());
    assert_eq!(stocked.get(Inventory::PEARS), Some(2));
}

// =============================================================================
// MutableRecord
// =============================================================================

#[rstest]
fn mutable_record_freezes_once(stocked: TypedMap<Inventory>) {
    let mut handle = stocked.as_mutable();
    handle.set(Inventory::APPLES, 1).unwrap();
    handle.set_key("warehouse", "south").unwrap();
    assert_eq!(handle.get_value("apples").unwrap(), Some(&Value::from(1)));
    assert!(handle.was_altered().unwrap());

    let frozen = handle.as_immutable().unwrap();
    assert!(handle.is_closed());
    assert_eq!(frozen.get(Inventory::APPLES), Some(1));
    assert_eq!(frozen.get(Inventory::WAREHOUSE).as_deref(), Some("south"));
    assert_eq!(stocked.get(Inventory::APPLES), Some(4));
}

#[rstest]
fn mutable_record_closed_after_freeze(stocked: TypedMap<Inventory>) {
    let mut handle = stocked.as_mutable();
    let _ = handle.as_immutable().unwrap();

    assert_eq!(handle.set(Inventory::PEARS, 1), Err(RecordError::SessionClosed));
    assert_eq!(handle.set_key("pears", 1), Err(RecordError::SessionClosed));
    assert_eq!(handle.merge([&stocked]), Err(RecordError::SessionClosed));
    assert_eq!(handle.delete("pears"), Err(RecordError::SessionClosed));
    assert_eq!(handle.get_value("pears"), Err(RecordError::SessionClosed));
    assert_eq!(handle.was_altered(), Err(RecordError::SessionClosed));
    assert_eq!(handle.as_immutable(), Err(RecordError::SessionClosed));
}

#[rstest]
fn mutable_record_rejects_delete_while_open(stocked: TypedMap<Inventory>) {
    let mut handle = stocked.as_mutable();
    assert_eq!(
        handle.delete("pears"),
        Err(RecordError::UnsupportedInSession { operation: "delete" })
    );
    assert!(!handle.is_closed());
}

// =============================================================================
// Session Equivalence: a batch of sets equals the same sets applied one by one
// =============================================================================

fn arbitrary_sets() -> impl Strategy<Value = Vec<(usize, i64)>> {
    prop::collection::vec((0..COUNTS.len(), -50_i64..50), 0..40)
}

proptest! {
    #[test]
    fn prop_session_matches_sequential_sets(sets in arbitrary_sets()) {
        let base = TypedMap::<Inventory>::default();

        let sequential = sets
            .iter()
            .fold(base.clone(), |record, &(index, count)| record.set(COUNTS[index], count));

        let batched = base
            .with_mutations(|session| {
                for &(index, count) in &sets {
                    session.set(COUNTS[index], count);
                }
                Ok(())
            })
            .unwrap();

        prop_assert_eq!(&batched, &sequential);
        prop_assert_eq!(batched.hash_code(), sequential.hash_code());
        prop_assert_eq!(base.get(Inventory::APPLES), Some(0));
    }

    #[test]
    fn prop_mutable_handle_matches_session(sets in arbitrary_sets()) {
        let base = TypedMap::<Inventory>::default();

        let mut session = base.begin();
        let mut handle = base.as_mutable();
        for &(index, count) in &sets {
            session.set(COUNTS[index], count);
            handle.set(COUNTS[index], count).unwrap();
        }

        prop_assert_eq!(handle.as_immutable().unwrap(), session.end());
    }
}
