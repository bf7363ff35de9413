// ============================================
// Implicit-feedback Alternating Least Squares
// ============================================
//
// Training is delegated to `discorec`. Users and items are handed over as
// dense matrix positions, so the trained recommender speaks the same index
// space as the id index. Cell values (raw or reweighted) are the implicit
// feedback strengths.

use super::{self_first, LatentFactorModel};
use crate::config::AlsConfig;
use crate::error::{RecommenderError, Result};
use crate::services::matrix::InteractionMatrix;
use discorec::{Dataset, Recommender, RecommenderBuilder};
use std::cell::Cell;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info};

pub struct AlsTrainer {
    config: AlsConfig,
}

impl AlsTrainer {
    pub fn new(config: AlsConfig) -> Self {
        Self { config }
    }

    /// Trains on a user x item matrix.
    pub fn train(&self, matrix: &InteractionMatrix) -> Result<AlsModel> {
        self.validate(matrix)?;

        let factors = u32::try_from(self.config.factors)
            .map_err(|_| RecommenderError::Training("factor count out of range".to_string()))?;
        let iterations = u32::try_from(self.config.iterations)
            .map_err(|_| RecommenderError::Training("iteration count out of range".to_string()))?;
        let started = Instant::now();

        let mut dataset = Dataset::new();
        for user in 0..matrix.n_rows() {
            for (item, value) in matrix.row(user) {
                dataset.push(user, item, value);
            }
        }

        // the fit itself is one blocking call; it runs on the configured pool
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .map_err(|e| RecommenderError::Training(format!("failed to start ALS workers: {}", e)))?;

        let recommender = pool.install(|| {
            let completed = Cell::new(0u32);
            let mut builder = RecommenderBuilder::new();
            builder
                .factors(factors)
                .iterations(iterations)
                .regularization(self.config.regularization)
                .seed(self.config.random_seed)
                .callback(|_| {
                    completed.set(completed.get() + 1);
                    debug!(iteration = completed.get(), "ALS iteration finished");
                });
            let recommender = builder.fit_implicit(&dataset);
            recommender
        });

        info!(
            users = matrix.n_rows(),
            items = matrix.n_cols(),
            nnz = matrix.nnz(),
            factors = factors,
            iterations = iterations,
            threads = pool.current_num_threads(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ALS model trained"
        );

        Ok(AlsModel {
            recommender: Mutex::new(recommender),
            n_users: matrix.n_rows(),
            n_items: matrix.n_cols(),
            factors: self.config.factors,
        })
    }

    fn validate(&self, matrix: &InteractionMatrix) -> Result<()> {
        if self.config.use_gpu {
            return Err(RecommenderError::Training(
                "GPU training requested but no accelerator backend is available".to_string(),
            ));
        }
        if self.config.factors == 0 {
            return Err(RecommenderError::Training(
                "factor count must be positive".to_string(),
            ));
        }
        if self.config.iterations == 0 {
            return Err(RecommenderError::Training(
                "iteration count must be positive".to_string(),
            ));
        }
        if matrix.n_rows() == 0 || matrix.n_cols() == 0 || matrix.is_empty() {
            return Err(RecommenderError::Training(
                "cannot train on an empty interaction matrix".to_string(),
            ));
        }
        if matrix.values().iter().any(|v| !v.is_finite()) {
            return Err(RecommenderError::Training(
                "interaction matrix contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trained ALS recommender keyed by dense user and item positions.
///
/// Positions whose matrix row or column holds no stored value are unknown to
/// the recommender; queries on them return only the query itself.
pub struct AlsModel {
    recommender: Mutex<Recommender<usize, usize>>,
    n_users: usize,
    n_items: usize,
    factors: usize,
}

impl LatentFactorModel for AlsModel {
    fn n_users(&self) -> usize {
        self.n_users
    }

    fn n_items(&self) -> usize {
        self.n_items
    }

    fn factors(&self) -> usize {
        self.factors
    }

    fn similar_items(&self, item: usize, n: usize) -> Result<Vec<(usize, f32)>> {
        if item >= self.n_items {
            return Err(RecommenderError::UnknownItem(format!("dense item index {}", item)));
        }
        // full ranking, so ties at the cut-off resolve by index
        let recommender = self.recommender.lock().unwrap_or_else(|e| e.into_inner());
        let others = recommender
            .item_recs(&item, self.n_items)
            .into_iter()
            .map(|(&other, score)| (other, score));
        Ok(self_first(item, others, n))
    }

    fn similar_users(&self, user: usize, n: usize) -> Result<Vec<(usize, f32)>> {
        if user >= self.n_users {
            return Err(RecommenderError::UnknownUser(format!("dense user index {}", user)));
        }
        let recommender = self.recommender.lock().unwrap_or_else(|e| e.into_inner());
        let others = recommender
            .similar_users(&user, self.n_users)
            .into_iter()
            .map(|(&other, score)| (other, score));
        Ok(self_first(user, others, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Interaction;
    use crate::services::matrix::PivotSpec;

    fn config(factors: usize) -> AlsConfig {
        AlsConfig {
            factors,
            regularization: 0.01,
            iterations: 10,
            use_gpu: false,
            num_threads: 2,
            random_seed: 7,
        }
    }

    // Two disjoint groups: users 1-3 buy items 10-12, users 4-6 buy items 20-22
    fn clustered() -> InteractionMatrix {
        let mut records = Vec::new();
        for user in 1..=3 {
            for item in 10..=12 {
                records.push(Interaction::new(user, item, 1));
            }
        }
        for user in 4..=6 {
            for item in 20..=22 {
                records.push(Interaction::new(user, item, 1));
            }
        }
        InteractionMatrix::pivot(&records, &PivotSpec::default()).unwrap()
    }

    #[test]
    fn test_train_shapes() {
        let matrix = clustered();
        let model = AlsTrainer::new(config(4)).train(&matrix).unwrap();

        assert_eq!(model.n_users(), 6);
        assert_eq!(model.n_items(), 6);
        assert_eq!(model.factors(), 4);
    }

    #[test]
    fn test_similar_items_contract() {
        let matrix = clustered();
        let model = AlsTrainer::new(config(4)).train(&matrix).unwrap();

        let similar = model.similar_items(0, 3).unwrap();
        assert_eq!(similar.len(), 3);
        assert_eq!(similar[0], (0, 1.0));
        assert!(similar[1].1 >= similar[2].1);
        assert!(similar.iter().skip(1).all(|&(i, s)| i != 0 && s.is_finite()));

        let users = model.similar_users(5, 100).unwrap();
        assert_eq!(users.len(), 6);
        assert_eq!(users[0].0, 5);
    }

    #[test]
    fn test_training_is_deterministic() {
        let matrix = clustered();
        let first = AlsTrainer::new(config(3)).train(&matrix).unwrap();
        let second = AlsTrainer::new(config(3)).train(&matrix).unwrap();

        for item in 0..6 {
            assert_eq!(
                first.similar_items(item, 6).unwrap(),
                second.similar_items(item, 6).unwrap()
            );
        }
    }

    #[test]
    fn test_rejects_degenerate_input() {
        let empty = InteractionMatrix::pivot(&[], &PivotSpec::default()).unwrap();
        assert!(matches!(
            AlsTrainer::new(config(4)).train(&empty),
            Err(RecommenderError::Training(_))
        ));

        assert!(matches!(
            AlsTrainer::new(config(0)).train(&clustered()),
            Err(RecommenderError::Training(_))
        ));

        let gpu = AlsConfig {
            use_gpu: true,
            ..config(4)
        };
        assert!(matches!(
            AlsTrainer::new(gpu).train(&clustered()),
            Err(RecommenderError::Training(_))
        ));
    }

    #[test]
    fn test_out_of_range_queries() {
        let model = AlsTrainer::new(config(2)).train(&clustered()).unwrap();

        assert!(matches!(model.similar_items(6, 2), Err(RecommenderError::UnknownItem(_))));
        assert!(matches!(model.similar_users(6, 2), Err(RecommenderError::UnknownUser(_))));
    }
}
