//! Properties of the field auto-matcher.

use std::collections::BTreeSet;

use proptest::prelude::*;
use tabmap_map::{ClassificationStore, auto_match};
use tabmap_model::{Category, EntityType, FieldSchema};

const NAMES: [&str; 10] = [
    "Brand Name",
    "brand",
    "Email",
    "Email Address",
    "ASIN",
    "Child ASIN",
    "SKU",
    "Title",
    "Notes",
    "Name",
];

const ENTITY_CATEGORIES: [Category; 4] = [
    Category::Partner,
    Category::Staff,
    Category::Asin,
    Category::Skip,
];

fn store_from(layout: &[(usize, usize)]) -> ClassificationStore {
    let headers: Vec<String> = layout.iter().map(|(n, _)| NAMES[*n].to_string()).collect();
    let data: Vec<Vec<String>> = vec![headers.iter().map(|_| "v".to_string()).collect()];
    let mut store = ClassificationStore::new();
    store.reinitialize_for_header_row(0, &headers, &data);
    for (index, (_, category)) in layout.iter().enumerate() {
        store.set_category(index, ENTITY_CATEGORIES[*category]);
    }
    store
}

proptest! {
    #[test]
    fn auto_match_never_assigns_a_field_twice(
        layout in proptest::collection::vec((0..10usize, 0..4usize), 0..12)
    ) {
        let mut store = store_from(&layout);
        store.auto_match_fields(&FieldSchema::builtin());

        for entity in EntityType::ALL {
            let mut seen = BTreeSet::new();
            for column in store.columns() {
                if column.category.entity() == Some(entity)
                    && let Some(field) = &column.target_field
                {
                    prop_assert!(seen.insert(field.clone()), "{} assigned twice", field);
                }
            }
        }
    }

    #[test]
    fn auto_match_is_idempotent(
        layout in proptest::collection::vec((0..10usize, 0..4usize), 0..12)
    ) {
        let mut store = store_from(&layout);
        let schema = FieldSchema::builtin();
        store.auto_match_fields(&schema);
        let after_first = store.columns().to_vec();

        let second = store.auto_match_fields(&schema);
        prop_assert!(second.assigned.is_empty());
        prop_assert_eq!(store.columns(), after_first.as_slice());
    }
}

#[test]
fn pure_matcher_leaves_columns_untouched() {
    let store = store_from(&[(0, 0), (2, 1)]);
    let before = store.columns().to_vec();
    let report = auto_match(store.columns(), &FieldSchema::builtin());
    assert_eq!(report.assigned.len(), 2);
    assert_eq!(store.columns(), before.as_slice());
}
