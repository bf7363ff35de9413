//! Matrix reweighting applied before training.
//!
//! Both schemes treat items as documents and users as terms: the statistics
//! are computed over the item-major orientation of the user x item matrix.
//! Output keeps the input's axes and sparsity pattern.

use super::matrix::InteractionMatrix;
use crate::config::{Bm25Config, WeightingScheme};
use tracing::debug;

pub trait MatrixWeighting: Send + Sync {
    /// Must return a matrix with the same axes and layout as `matrix`
    fn transform(&self, matrix: &InteractionMatrix) -> InteractionMatrix;

    fn name(&self) -> &'static str;
}

pub fn weighting_for(scheme: WeightingScheme, bm25: &Bm25Config) -> Box<dyn MatrixWeighting> {
    match scheme {
        WeightingScheme::Bm25 => Box::new(Bm25Weighting::new(bm25.k1, bm25.b)),
        WeightingScheme::TfIdf => Box::new(TfIdfWeighting),
    }
}

/// idf per user: ln(n_items) - ln(1 + items bought by the user)
fn user_idf(matrix: &InteractionMatrix) -> Vec<f64> {
    let n_items = matrix.n_cols() as f64;
    (0..matrix.n_rows())
        .map(|u| n_items.ln() - (matrix.row_nnz(u) as f64).ln_1p())
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct Bm25Weighting {
    k1: f64,
    b: f64,
}

impl Bm25Weighting {
    pub fn new(k1: f64, b: f64) -> Self {
        Self { k1, b }
    }
}

impl Default for Bm25Weighting {
    fn default() -> Self {
        let defaults = Bm25Config::default();
        Self::new(defaults.k1, defaults.b)
    }
}

impl MatrixWeighting for Bm25Weighting {
    fn transform(&self, matrix: &InteractionMatrix) -> InteractionMatrix {
        if matrix.is_empty() {
            return matrix.map_values(|_, _, v| v);
        }

        let idf = user_idf(matrix);
        let item_lengths = matrix.col_sums();
        let average_length = item_lengths.iter().sum::<f64>() / item_lengths.len() as f64;
        let length_norm: Vec<f64> = item_lengths
            .iter()
            .map(|&len| {
                if average_length > 0.0 {
                    (1.0 - self.b) + self.b * len / average_length
                } else {
                    1.0
                }
            })
            .collect();

        debug!(
            k1 = self.k1,
            b = self.b,
            average_length = average_length,
            "Applying BM25 weighting"
        );

        matrix.map_values(|user, item, value| {
            let x = f64::from(value);
            let weight = x * (self.k1 + 1.0) / (self.k1 * length_norm[item] + x) * idf[user];
            weight as f32
        })
    }

    fn name(&self) -> &'static str {
        "bm25"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TfIdfWeighting;

impl MatrixWeighting for TfIdfWeighting {
    fn transform(&self, matrix: &InteractionMatrix) -> InteractionMatrix {
        let idf = user_idf(matrix);
        matrix.map_values(|user, _, value| (f64::from(value).sqrt() * idf[user]) as f32)
    }

    fn name(&self) -> &'static str {
        "tfidf"
    }
}
