//! Latent-factor model seam.
//!
//! The engine depends only on [`LatentFactorModel`]; [`AlsModel`] wraps an
//! implicit-feedback ALS recommender from `discorec`, trained by [`AlsTrainer`].

pub mod als;

pub use als::{AlsModel, AlsTrainer};

use crate::error::Result;
use std::cmp::Ordering;

/// Similarity queries over trained user and item factors.
///
/// Self-similarity contract: both queries return the queried entity itself as
/// entry 0, followed by the most similar other entities in descending score
/// order (ties by ascending index). Callers wanting "similar but not identical"
/// entities drop entry 0. Results hold `min(n, population)` entries.
#[cfg_attr(test, mockall::automock)]
pub trait LatentFactorModel: Send + Sync {
    fn n_users(&self) -> usize;

    fn n_items(&self) -> usize;

    fn factors(&self) -> usize;

    fn similar_items(&self, item: usize, n: usize) -> Result<Vec<(usize, f32)>>;

    fn similar_users(&self, user: usize, n: usize) -> Result<Vec<(usize, f32)>>;
}

/// Ranks `others` by score and puts `query` in front, `n` entries at most
pub(crate) fn self_first<I>(query: usize, others: I, n: usize) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = (usize, f32)>,
{
    if n == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(usize, f32)> = others.into_iter().filter(|&(i, _)| i != query).collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(n - 1);
    ranked.insert(0, (query, 1.0));
    ranked
}
