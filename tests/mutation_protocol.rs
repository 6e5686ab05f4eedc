//! Mutation protocol: inserts, updates, removals, bulk loads and uniqueness.

use rand::Rng;
use serde_json::json;

use docindex::{CompositeKey, Document, Index, UpdateMode, Value};

// ==================== Helpers ====================

fn doc(value: serde_json::Value) -> Document {
    Document::from_json(value).unwrap()
}

fn key(values: &[Value]) -> CompositeKey {
    CompositeKey::new(values.to_vec())
}

fn email_index() -> Index {
    Index::new("email_1", ["email"], true).unwrap()
}

fn status_index() -> Index {
    Index::new("status_1", ["status"], false).unwrap()
}

// ==================== Unique Index ====================

#[test]
fn test_unique_email_walkthrough() {
    let index = email_index();
    let first = doc(json!({"id": 1, "email": "a@x.com"}));
    let second = doc(json!({"id": 2, "email": "a@x.com"}));

    assert!(index.add_or_update(&first, None).is_empty());

    let conflicts = index.add_or_update(&second, None);
    assert_eq!(conflicts, vec![key(&[Value::from("a@x.com")])]);
    assert_eq!(conflicts[0].to_string(), "[\"a@x.com\"]");
    assert_eq!(index.size(), 1);

    index.remove(&first);
    assert_eq!(index.size(), 0);

    assert!(index.add_or_update(&second, None).is_empty());
    assert_eq!(index.values(), vec![second]);
}

#[test]
fn test_unique_conflict_leaves_state_untouched() {
    let index = email_index();
    let first = doc(json!({"id": 1, "email": "a@x.com"}));
    assert!(index.add_or_update(&first, None).is_empty());
    let _ = index.add_or_update(&doc(json!({"id": 2, "email": "a@x.com"})), None);

    let stored = index.get(&doc(json!({"email": "a@x.com"}))).unwrap();
    assert_eq!(stored.as_slice(), &[first]);
}

#[test]
fn test_missing_field_counts_as_null_key() {
    let index = email_index();
    assert!(index.add_or_update(&doc(json!({"id": 1})), None).is_empty());
    let conflicts = index.add_or_update(&doc(json!({"id": 2, "email": null})), None);
    assert_eq!(conflicts, vec![key(&[Value::Null])]);
}

#[test]
fn test_numeric_keys_are_cross_type() {
    let index = Index::new("n_1", ["n"], true).unwrap();
    assert!(index.add_or_update(&doc(json!({"n": 1})), None).is_empty());
    assert_eq!(
        index.add_or_update(&doc(json!({"n": 1.0, "other": true})), None),
        vec![key(&[Value::Int(1)])]
    );
    assert!(index.get(&doc(json!({"n": 1.0}))).is_some());
}

#[test]
fn test_compound_key_uses_all_fields() {
    let index = Index::new("name_1", ["last", "first"], true).unwrap();
    assert!(index
        .add_or_update(&doc(json!({"first": "Ann", "last": "Lee"})), None)
        .is_empty());
    assert!(index
        .add_or_update(&doc(json!({"first": "Bob", "last": "Lee"})), None)
        .is_empty());
    assert_eq!(
        index.add_or_update(&doc(json!({"last": "Lee", "first": "Ann", "x": 1})), None),
        vec![key(&[Value::from("Lee"), Value::from("Ann")])]
    );
    assert_eq!(index.size(), 2);
}

#[test]
fn test_unique_invariant_random_ops() {
    let mut rng = rand::thread_rng();
    let index = Index::new("k_1", ["k"], true).unwrap();
    let mut live: Vec<Document> = Vec::new();

    for id in 0..500 {
        if !live.is_empty() && rng.gen_bool(0.3) {
            let victim = live.swap_remove(rng.gen_range(0..live.len()));
            index.remove(&victim);
        } else {
            let candidate = doc(json!({"id": id, "k": rng.gen_range(0..40)}));
            if index.add_or_update(&candidate, None).is_empty() {
                live.push(candidate);
            }
        }

        let values = index.values();
        assert_eq!(index.size(), values.len());
        assert_eq!(values.len(), live.len());
    }
}

// ==================== Non-unique Index ====================

#[test]
fn test_status_walkthrough() {
    let index = status_index();
    let docs: Vec<Document> = (1..=3)
        .map(|id| doc(json!({"id": id, "status": "open"})))
        .collect();
    for d in &docs {
        assert!(index.add_or_update(d, None).is_empty());
    }

    let query = doc(json!({"status": "open"}));
    assert_eq!(index.get(&query).unwrap().as_slice(), docs.as_slice());

    index.remove(&docs[1]);
    assert_eq!(
        index.get(&query).unwrap().as_slice(),
        &[docs[0].clone(), docs[2].clone()]
    );

    index.remove(&docs[0]);
    index.remove(&docs[2]);
    assert!(index.get(&query).is_none());
    assert_eq!(index.size(), 0);
}

#[test]
fn test_same_document_indexed_once_per_key() {
    let index = status_index();
    let d = doc(json!({"id": 1, "status": "open"}));
    assert!(index.add_or_update(&d, None).is_empty());
    assert!(index.add_or_update(&d, None).is_empty());
    assert_eq!(index.values().len(), 1);
}

#[test]
fn test_round_trip_restores_entries() {
    let index = status_index();
    let a = doc(json!({"id": 1, "status": "open"}));
    let b = doc(json!({"id": 2, "status": "open"}));
    assert!(index.add_or_update(&a, None).is_empty());
    let before = index.values();

    assert!(index.add_or_update(&b, None).is_empty());
    index.remove(&b);
    assert_eq!(index.values(), before);

    index.remove(&a);
    assert!(index.get(&a).is_none());
}

#[test]
fn test_remove_is_idempotent() {
    let index = status_index();
    let a = doc(json!({"id": 1, "status": "open"}));
    let b = doc(json!({"id": 2, "status": "open"}));
    assert!(index.add_all([&a, &b]).is_empty());

    index.remove(&a);
    let once = index.values();
    index.remove(&a);
    assert_eq!(index.values(), once);
    assert_eq!(once, vec![b]);
}

#[test]
fn test_remove_unknown_document_is_noop() {
    let index = status_index();
    let a = doc(json!({"id": 1, "status": "open"}));
    assert!(index.add_or_update(&a, None).is_empty());
    index.remove(&doc(json!({"id": 9, "status": "open"})));
    index.remove(&doc(json!({"id": 9, "status": "closed"})));
    assert_eq!(index.values(), vec![a]);
}

// ==================== Updates ====================

#[test]
fn test_non_unique_update_equals_remove_then_insert() {
    let old = doc(json!({"id": 1, "status": "open"}));
    let new = doc(json!({"id": 1, "status": "closed"}));
    let other = doc(json!({"id": 2, "status": "open"}));

    for mode in [UpdateMode::Atomic, UpdateMode::RemoveThenInsert] {
        let updated = status_index().with_update_mode(mode);
        assert!(updated.add_all([&old, &other]).is_empty());
        assert!(updated.add_or_update(&new, Some(&old)).is_empty());

        let manual = status_index();
        assert!(manual.add_all([&old, &other]).is_empty());
        manual.remove(&old);
        assert!(manual.add_or_update(&new, None).is_empty());

        for lookup in [&old, &new] {
            assert_eq!(updated.get(lookup), manual.get(lookup));
        }
        assert_eq!(updated.size(), manual.size());
    }
}

#[test]
fn test_atomic_update_conflict_keeps_old_document() {
    let index = email_index();
    assert_eq!(index.update_mode(), UpdateMode::Atomic);
    let old = doc(json!({"id": 1, "email": "a@x.com"}));
    let third = doc(json!({"id": 2, "email": "b@x.com"}));
    assert!(index.add_all([&old, &third]).is_empty());

    let new = doc(json!({"id": 1, "email": "b@x.com"}));
    assert_eq!(
        index.add_or_update(&new, Some(&old)),
        vec![key(&[Value::from("b@x.com")])]
    );
    assert_eq!(index.get(&old).unwrap().as_slice(), &[old.clone()]);
    assert_eq!(index.get(&new).unwrap().as_slice(), &[third]);
    assert_eq!(index.size(), 2);
}

#[test]
fn test_remove_then_insert_conflict_drops_old_document() {
    let index = email_index().with_update_mode(UpdateMode::RemoveThenInsert);
    let old = doc(json!({"id": 1, "email": "a@x.com"}));
    let third = doc(json!({"id": 2, "email": "b@x.com"}));
    assert!(index.add_all([&old, &third]).is_empty());

    let new = doc(json!({"id": 1, "email": "b@x.com"}));
    assert_eq!(
        index.add_or_update(&new, Some(&old)),
        vec![key(&[Value::from("b@x.com")])]
    );
    assert!(index.get(&old).is_none());
    assert_eq!(index.size(), 1);
}

#[test]
fn test_unique_update_moves_key() {
    let index = email_index();
    let old = doc(json!({"id": 1, "email": "a@x.com"}));
    let new = doc(json!({"id": 1, "email": "c@x.com"}));
    assert!(index.add_or_update(&old, None).is_empty());
    assert!(index.add_or_update(&new, Some(&old)).is_empty());
    assert!(index.get(&old).is_none());
    assert_eq!(index.get(&new).unwrap().as_slice(), &[new.clone()]);
}

// ==================== Dry Runs ====================

#[test]
fn test_check_add_or_update() {
    let index = email_index();
    let existing = doc(json!({"id": 1, "email": "a@x.com"}));
    assert!(index.add_or_update(&existing, None).is_empty());

    let clash = doc(json!({"id": 2, "email": "a@x.com"}));
    assert_eq!(
        index.check_add_or_update(&clash, None),
        vec![key(&[Value::from("a@x.com")])]
    );
    // Updating a document in place only clashes with itself.
    let renamed = doc(json!({"id": 1, "email": "a@x.com", "name": "Ann"}));
    assert!(index.check_add_or_update(&renamed, Some(&existing)).is_empty());
    assert!(index
        .check_add_or_update(&doc(json!({"email": "new@x.com"})), None)
        .is_empty());

    // Nothing was written.
    assert_eq!(index.values(), vec![existing]);
}

#[test]
fn test_check_never_conflicts_on_non_unique() {
    let index = status_index();
    let a = doc(json!({"id": 1, "status": "open"}));
    assert!(index.add_or_update(&a, None).is_empty());
    assert!(index
        .check_add_or_update(&doc(json!({"id": 2, "status": "open"})), None)
        .is_empty());
}

// ==================== Bulk Load and Clear ====================

#[test]
fn test_add_all_stops_at_first_violation() {
    let index = email_index();
    let docs = [
        doc(json!({"id": 1, "email": "a@x.com"})),
        doc(json!({"id": 2, "email": "b@x.com"})),
        doc(json!({"id": 3, "email": "a@x.com"})),
        doc(json!({"id": 4, "email": "d@x.com"})),
    ];
    assert_eq!(
        index.add_all(&docs),
        vec![key(&[Value::from("a@x.com")])]
    );
    assert_eq!(index.size(), 2);
    assert!(index.get(&docs[3]).is_none());
}

#[test]
fn test_add_all_success() {
    let index = status_index();
    let docs: Vec<Document> = (0..10)
        .map(|i| {
            let status = if i % 2 == 0 { "even" } else { "odd" };
            doc(json!({"id": i, "status": status}))
        })
        .collect();
    assert!(index.add_all(&docs).is_empty());
    assert_eq!(index.size(), 2);
    assert_eq!(index.values().len(), 10);
}

#[test]
fn test_clear_keeps_used_time() {
    let index = status_index();
    assert!(index
        .add_or_update(&doc(json!({"id": 1, "status": "open"})), None)
        .is_empty());
    index.retrieve_objects(&Document::new()).unwrap();
    index.clear();
    assert_eq!(index.size(), 0);
    assert!(index.values().is_empty());
    assert_eq!(index.used_time(), 1);
}
