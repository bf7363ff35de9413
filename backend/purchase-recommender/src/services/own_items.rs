//! Item-item nearest-neighbour model used to pick a user's best-matching item.
//!
//! Similarity between items is the dot product of their user columns. Each
//! item keeps only its `k` strongest neighbours, itself included, so with
//! `k = 1` a user's score vector is dominated by the items they already hold.

use crate::config::ItemItemConfig;
use crate::error::{RecommenderError, Result};
use crate::services::matrix::InteractionMatrix;
use rayon::prelude::*;
use sprs::CsMat;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct RecommendOptions {
    pub filter_already_liked: bool,
    /// Dense item indices never returned
    pub filter_items: Option<Vec<usize>>,
    pub recalculate_user: bool,
}

#[cfg_attr(test, mockall::automock)]
pub trait OwnItemsModel: Send + Sync {
    fn n_items(&self) -> usize;

    /// Top `n` items for row `user` of `user_items`, highest score first.
    /// Only items with a non-zero score are candidates.
    fn recommend(
        &self,
        user: usize,
        user_items: &InteractionMatrix,
        n: usize,
        options: &RecommendOptions,
    ) -> Result<Vec<(usize, f32)>>;

    /// Single best item, already-purchased items allowed
    fn recommend_top_one(
        &self,
        user: usize,
        user_items: &InteractionMatrix,
    ) -> Result<Option<(usize, f32)>> {
        let ranked = self.recommend(user, user_items, 1, &RecommendOptions::default())?;
        Ok(ranked.into_iter().next())
    }
}

pub struct ItemItemTrainer {
    config: ItemItemConfig,
}

impl ItemItemTrainer {
    pub fn new(config: ItemItemConfig) -> Self {
        Self { config }
    }

    pub fn train(&self, matrix: &InteractionMatrix) -> Result<ItemItemModel> {
        let k = self.config.k;
        if k == 0 {
            return Err(RecommenderError::Training(
                "neighbourhood size must be positive".to_string(),
            ));
        }
        if matrix.is_empty() {
            return Err(RecommenderError::Training(
                "cannot train on an empty interaction matrix".to_string(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .map_err(|e| {
                RecommenderError::Training(format!("failed to start item-item workers: {}", e))
            })?;

        let user_major = matrix.csr();
        let item_major = matrix.transpose();
        let n_items = item_major.n_rows();

        let neighbours: Vec<Vec<(usize, f32)>> = pool.install(|| {
            (0..n_items)
                .into_par_iter()
                .map(|item| top_k_neighbours(item_major.csr(), user_major, item, k))
                .collect()
        });

        info!(
            items = n_items,
            k = k,
            links = neighbours.iter().map(Vec::len).sum::<usize>(),
            "Item-item model trained"
        );

        Ok(ItemItemModel { neighbours })
    }
}

/// `item_major` is items x users, `user_major` users x items
fn top_k_neighbours(
    item_major: &CsMat<f32>,
    user_major: &CsMat<f32>,
    item: usize,
    k: usize,
) -> Vec<(usize, f32)> {
    let mut scores: HashMap<usize, f32> = HashMap::new();
    if let Some(buyers) = item_major.outer_view(item) {
        for (user, &weight) in buyers.iter() {
            if let Some(basket) = user_major.outer_view(user) {
                for (other, &other_weight) in basket.iter() {
                    *scores.entry(other).or_insert(0.0) += weight * other_weight;
                }
            }
        }
    }

    let mut ranked: Vec<(usize, f32)> = scores.into_iter().filter(|&(_, s)| s != 0.0).collect();
    ranked.sort_by(rank_order);
    ranked.truncate(k);
    ranked
}

fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

/// Per-item strongest neighbours
#[derive(Debug, Clone)]
pub struct ItemItemModel {
    neighbours: Vec<Vec<(usize, f32)>>,
}

impl OwnItemsModel for ItemItemModel {
    fn n_items(&self) -> usize {
        self.neighbours.len()
    }

    fn recommend(
        &self,
        user: usize,
        user_items: &InteractionMatrix,
        n: usize,
        options: &RecommendOptions,
    ) -> Result<Vec<(usize, f32)>> {
        if options.recalculate_user {
            return Err(RecommenderError::Training(
                "item-item model cannot recalculate users".to_string(),
            ));
        }
        if user >= user_items.n_rows() {
            return Err(RecommenderError::UnknownUser(format!("dense user index {}", user)));
        }
        if user_items.n_cols() != self.n_items() {
            return Err(RecommenderError::Invariant(format!(
                "user_items has {} columns, model was trained on {} items",
                user_items.n_cols(),
                self.n_items()
            )));
        }

        let mut scores: HashMap<usize, f32> = HashMap::new();
        for (item, weight) in user_items.row(user) {
            for &(neighbour, similarity) in &self.neighbours[item] {
                *scores.entry(neighbour).or_insert(0.0) += weight * similarity;
            }
        }

        let mut excluded: HashSet<usize> = HashSet::new();
        if options.filter_already_liked {
            excluded.extend(user_items.row(user).map(|(item, _)| item));
        }
        if let Some(items) = &options.filter_items {
            excluded.extend(items.iter().copied());
        }

        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .filter(|&(item, score)| score != 0.0 && !excluded.contains(&item))
            .collect();
        ranked.sort_by(rank_order);
        ranked.truncate(n);

        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Interaction;
    use crate::services::matrix::{Aggregate, PivotSpec};

    // users 1..=3 / items 10, 20, 30
    fn matrix() -> InteractionMatrix {
        let records = vec![
            Interaction::new(1, 10, 3),
            Interaction::new(1, 20, 1),
            Interaction::new(2, 20, 2),
            Interaction::new(2, 30, 1),
            Interaction::new(3, 30, 4),
        ];
        let spec = PivotSpec {
            aggregate: Aggregate::Sum,
            ..PivotSpec::default()
        };
        InteractionMatrix::pivot(&records, &spec).unwrap()
    }

    fn config(k: usize) -> ItemItemConfig {
        ItemItemConfig { k, num_threads: 1 }
    }

    #[test]
    fn test_neighbours_by_co_purchase() {
        let model = ItemItemTrainer::new(config(2)).train(&matrix()).unwrap();

        // item 10: self 9, item 20 = 3*1
        assert_eq!(model.neighbours[0], vec![(0, 9.0), (1, 3.0)]);
        // item 20: self 1 + 4 = 5, item 10 = 3, item 30 = 2
        assert_eq!(model.neighbours[1], vec![(1, 5.0), (0, 3.0)]);
    }

    #[test]
    fn test_k1_recommends_own_items() {
        let matrix = matrix();
        let model = ItemItemTrainer::new(config(1)).train(&matrix).unwrap();

        // item 30: self 1 + 16 = 17 beats item 20 at 2
        let top = model.recommend_top_one(2, &matrix).unwrap();
        assert_eq!(top, Some((2, 68.0)));

        let ranked = model
            .recommend(0, &matrix, 5, &RecommendOptions::default())
            .unwrap();
        assert_eq!(ranked, vec![(0, 27.0), (1, 5.0)]);
    }

    #[test]
    fn test_filters() {
        let matrix = matrix();
        let model = ItemItemTrainer::new(config(3)).train(&matrix).unwrap();

        let liked = RecommendOptions {
            filter_already_liked: true,
            ..RecommendOptions::default()
        };
        let ranked = model.recommend(0, &matrix, 5, &liked).unwrap();
        assert_eq!(ranked.iter().map(|&(i, _)| i).collect::<Vec<_>>(), vec![2]);

        let explicit = RecommendOptions {
            filter_items: Some(vec![0]),
            ..RecommendOptions::default()
        };
        let ranked = model.recommend(0, &matrix, 5, &explicit).unwrap();
        assert!(ranked.iter().all(|&(i, _)| i != 0));
    }

    #[test]
    fn test_rejects_bad_requests() {
        let matrix = matrix();
        let model = ItemItemTrainer::new(config(1)).train(&matrix).unwrap();

        let recalc = RecommendOptions {
            recalculate_user: true,
            ..RecommendOptions::default()
        };
        assert!(matches!(
            model.recommend(0, &matrix, 1, &recalc),
            Err(RecommenderError::Training(_))
        ));
        assert!(matches!(
            model.recommend_top_one(3, &matrix),
            Err(RecommenderError::UnknownUser(_))
        ));

        let empty = InteractionMatrix::pivot(&[], &PivotSpec::default()).unwrap();
        assert!(ItemItemTrainer::new(config(1)).train(&empty).is_err());
        assert!(ItemItemTrainer::new(config(0)).train(&matrix).is_err());
    }
}
