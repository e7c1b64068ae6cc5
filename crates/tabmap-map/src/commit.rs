//! Final commit payload.

use serde::{Deserialize, Serialize};
use tabmap_model::{Category, EntityType, SavedColumnMapping, SavedTabMapping};

use crate::store::ClassificationStore;

/// Request sent to the commit endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub header_row: usize,
    pub columns: Vec<SavedColumnMapping>,
    pub primary_entity: Option<EntityType>,
}

impl CommitRequest {
    pub fn from_store(store: &ClassificationStore) -> Self {
        Self {
            header_row: store.header_row(),
            columns: store
                .columns()
                .iter()
                .map(SavedColumnMapping::from_classification)
                .collect(),
            primary_entity: primary_entity(store),
        }
    }

    pub fn into_saved(self, tab: impl Into<String>) -> SavedTabMapping {
        SavedTabMapping::new(tab, self.header_row, self.columns)
    }
}

/// Entity the tab primarily describes.
///
/// The first key column decides; without a key, the entity with the most
/// columns wins, ties going to the earlier entity in [`EntityType::ALL`].
pub fn primary_entity(store: &ClassificationStore) -> Option<EntityType> {
    if let Some(entity) = store
        .columns()
        .iter()
        .filter(|c| c.is_key)
        .find_map(|c| c.category.entity())
    {
        return Some(entity);
    }
    let summary = store.summary();
    let mut best: Option<(EntityType, usize)> = None;
    for entity in EntityType::ALL {
        let count = summary
            .by_category
            .get(&Category::from(entity))
            .copied()
            .unwrap_or(0);
        if count > 0 && best.is_none_or(|(_, top)| count > top) {
            best = Some((entity, count));
        }
    }
    best.map(|(entity, _)| entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(categories: &[Category]) -> ClassificationStore {
        let headers: Vec<String> = (0..categories.len()).map(|i| format!("c{i}")).collect();
        let data = vec![headers.clone()];
        let mut store = ClassificationStore::new();
        store.reinitialize_for_header_row(0, &headers, &data);
        for (index, category) in categories.iter().enumerate() {
            store.set_category(index, *category);
        }
        store
    }

    #[test]
    fn key_column_decides_primary_entity() {
        let mut store = store(&[Category::Partner, Category::Partner, Category::Asin]);
        store.toggle_key(2);
        assert_eq!(primary_entity(&store), Some(EntityType::Asin));
    }

    #[test]
    fn falls_back_to_most_classified_entity() {
        let store = store(&[Category::Staff, Category::Asin, Category::Asin, Category::Skip]);
        assert_eq!(primary_entity(&store), Some(EntityType::Asin));
    }

    #[test]
    fn ties_go_to_earlier_entity() {
        let store = store(&[Category::Asin, Category::Partner]);
        assert_eq!(primary_entity(&store), Some(EntityType::Partner));
    }

    #[test]
    fn no_entity_columns_means_no_primary_entity() {
        let store = store(&[Category::Weekly, Category::Skip]);
        assert_eq!(primary_entity(&store), None);
        let request = CommitRequest::from_store(&store);
        assert_eq!(request.columns.len(), 2);
        assert_eq!(request.primary_entity, None);
    }
}
