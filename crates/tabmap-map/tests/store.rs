//! Invariant and scenario tests for the classification store.

use proptest::prelude::*;
use tabmap_map::{ClassificationStore, History};
use tabmap_model::{Category, EntityType, FieldDefinition, FieldSchema};

const CATEGORIES: [Category; 7] = [
    Category::Partner,
    Category::Staff,
    Category::Asin,
    Category::Weekly,
    Category::Computed,
    Category::Skip,
    Category::Unclassified,
];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn seeded(headers: &[&str], data: &[&[&str]]) -> ClassificationStore {
    let headers = strings(headers);
    let data: Vec<Vec<String>> = data.iter().map(|row| strings(row)).collect();
    let mut store = ClassificationStore::new();
    store.reinitialize_for_header_row(0, &headers, &data);
    store
}

#[derive(Debug, Clone)]
enum Op {
    SetCategory(usize, usize),
    ToggleKey(usize),
    Bulk(Vec<usize>, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8usize, 0..7usize).prop_map(|(i, c)| Op::SetCategory(i, c)),
        (0..8usize).prop_map(Op::ToggleKey),
        (proptest::collection::vec(0..8usize, 0..4), 0..7usize).prop_map(|(i, c)| Op::Bulk(i, c)),
    ]
}

fn assert_invariants(store: &ClassificationStore) {
    for entity in EntityType::ALL {
        let keys = store
            .columns()
            .iter()
            .filter(|c| c.is_key && c.category.entity() == Some(entity))
            .count();
        assert!(keys <= 1, "{entity} has {keys} key columns");
    }
    for column in store.columns() {
        if column.is_key {
            assert!(column.category.is_keyable(), "{} keyed", column.category);
        }
    }
}

proptest! {
    #[test]
    fn key_rules_hold_for_any_edit_sequence(ops in proptest::collection::vec(op(), 0..40)) {
        let mut store = seeded(&["a", "b", "c", "d", "e", "f"], &[&["1", "2", "3", "4", "5", "6"]]);
        for op in ops {
            match op {
                Op::SetCategory(i, c) => {
                    store.set_category(i, CATEGORIES[c]);
                    if let Some(column) = store.column(i) {
                        prop_assert!(!column.is_key);
                        prop_assert!(column.target_field.is_none());
                        prop_assert!(column.computed_config.is_none());
                        prop_assert!(!column.ai_suggested);
                    }
                }
                Op::ToggleKey(i) => {
                    let before = store.column(i).cloned();
                    store.toggle_key(i);
                    if let Some(before) = before
                        && !before.category.is_keyable()
                    {
                        prop_assert_eq!(store.column(i), Some(&before));
                    }
                }
                Op::Bulk(indices, c) => {
                    store.set_category_bulk(&indices, CATEGORIES[c]);
                }
            }
            assert_invariants(&store);
        }
    }
}

#[test]
fn heuristic_init_then_auto_match_resolves_brand_name() {
    let mut store = seeded(
        &["Brand Name", "W1 3/1", "", "Email"],
        &[&["Acme", "12", "", "a@acme.test"], &["Globex", "3", " ", ""]],
    );
    assert_eq!(store.columns()[0].category, Category::Unclassified);
    assert_eq!(store.columns()[1].category, Category::Weekly);
    assert_eq!(store.columns()[2].category, Category::Skip);
    assert_eq!(store.columns()[3].category, Category::Unclassified);

    store.set_category(0, Category::Partner);
    let schema = FieldSchema::new().with_fields(
        EntityType::Partner,
        vec![FieldDefinition::new("brand_name", "Brand", &["Brand Name"], None)],
    );
    let report = store.auto_match_fields(&schema);

    assert_eq!(report.assigned.len(), 1);
    assert_eq!(store.columns()[0].target_field.as_deref(), Some("brand_name"));
}

#[test]
fn second_category_change_drops_key() {
    let mut store = seeded(&["a", "b", "c"], &[&["1", "2", "3"]]);
    store.set_category(2, Category::Staff);
    store.toggle_key(2);
    assert!(store.columns()[2].is_key);
    store.set_category(2, Category::Partner);
    assert!(!store.columns()[2].is_key);
}

#[test]
fn undo_reverts_bulk_category_change() {
    let mut store = seeded(&["a", "b", "c"], &[&["1", "2", "3"]]);
    let mut history = History::default();
    store.set_category(0, Category::Partner);
    store.toggle_key(0);

    history.record(&store);
    store.set_category_bulk(&[0, 1, 2], Category::Skip);
    assert!(store.columns().iter().all(|c| c.category == Category::Skip));

    assert!(history.undo(&mut store));
    assert_eq!(store.columns()[0].category, Category::Partner);
    assert!(store.columns()[0].is_key);
    assert_eq!(store.columns()[1].category, Category::Unclassified);
}
