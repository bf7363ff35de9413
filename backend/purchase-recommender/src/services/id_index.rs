use super::matrix::InteractionMatrix;
use crate::error::{RecommenderError, Result};
use crate::models::{ItemId, UserId};
use std::collections::HashMap;

/// Bidirectional mapping between external ids and dense matrix positions.
///
/// Built from the row (user) and column (item) labels of an interaction
/// matrix. Forward lookups are array reads, reverse lookups hash lookups.
#[derive(Debug, Clone)]
pub struct IdIndex {
    user_ids: Vec<UserId>,
    item_ids: Vec<ItemId>,
    user_positions: HashMap<UserId, usize>,
    item_positions: HashMap<ItemId, usize>,
}

impl IdIndex {
    pub fn build(matrix: &InteractionMatrix) -> Self {
        let user_ids = matrix.row_labels().to_vec();
        let item_ids = matrix.col_labels().to_vec();

        let user_positions = user_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let item_positions = item_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        Self {
            user_ids,
            item_ids,
            user_positions,
            item_positions,
        }
    }

    pub fn n_users(&self) -> usize {
        self.user_ids.len()
    }

    pub fn n_items(&self) -> usize {
        self.item_ids.len()
    }

    pub fn user_index_of(&self, user: UserId) -> Result<usize> {
        self.user_positions
            .get(&user)
            .copied()
            .ok_or_else(|| RecommenderError::UnknownUser(format!("user_id {}", user)))
    }

    pub fn item_index_of(&self, item: ItemId) -> Result<usize> {
        self.item_positions
            .get(&item)
            .copied()
            .ok_or_else(|| RecommenderError::UnknownItem(format!("item_id {}", item)))
    }

    pub fn user_id_of(&self, index: usize) -> Result<UserId> {
        self.user_ids
            .get(index)
            .copied()
            .ok_or_else(|| RecommenderError::UnknownUser(format!("dense user index {}", index)))
    }

    pub fn item_id_of(&self, index: usize) -> Result<ItemId> {
        self.item_ids
            .get(index)
            .copied()
            .ok_or_else(|| RecommenderError::UnknownItem(format!("dense item index {}", index)))
    }
}
