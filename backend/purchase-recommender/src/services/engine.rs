use crate::config::RecommenderConfig;
use crate::error::{RecommenderError, Result};
use crate::models::{EngineMetadata, Interaction, ItemId, UserId};
use crate::services::factorization::{AlsTrainer, LatentFactorModel};
use crate::services::id_index::IdIndex;
use crate::services::matrix::{InteractionMatrix, PivotSpec};
use crate::services::own_items::{ItemItemTrainer, OwnItemsModel};
use crate::services::popularity::PopularityTable;
use crate::services::weighting::{weighting_for, MatrixWeighting};
use tracing::{debug, info};

pub const DEFAULT_RECOMMENDATIONS: usize = 5;

/// Purchase-history recommender.
///
/// Owns the interaction matrix, its id index, the popularity table and both
/// trained models. Nothing is mutated after construction, so queries can run
/// concurrently; retraining means building a new instance.
pub struct MainRecommender {
    matrix: InteractionMatrix,
    index: IdIndex,
    popularity: PopularityTable,
    factors: Box<dyn LatentFactorModel>,
    own_items: Box<dyn OwnItemsModel>,
    weighted: bool,
}

impl MainRecommender {
    /// Builds the engine, reweighting with the configured scheme when
    /// `config.weighting` is set.
    pub fn new(records: &[Interaction], config: &RecommenderConfig) -> Result<Self> {
        if config.weighting {
            let weighting = weighting_for(config.weighting_scheme, &config.bm25);
            Self::build(records, config, Some(weighting.as_ref()))
        } else {
            Self::build(records, config, None)
        }
    }

    /// Builds the engine with a caller-supplied weighting, ignoring
    /// `config.weighting` and `config.weighting_scheme`.
    pub fn with_weighting(
        records: &[Interaction],
        config: &RecommenderConfig,
        weighting: &dyn MatrixWeighting,
    ) -> Result<Self> {
        Self::build(records, config, Some(weighting))
    }

    fn build(
        records: &[Interaction],
        config: &RecommenderConfig,
        weighting: Option<&dyn MatrixWeighting>,
    ) -> Result<Self> {
        info!(
            records = records.len(),
            weighting = weighting.map(|w| w.name()).unwrap_or("none"),
            "Building purchase recommender"
        );

        let popularity = PopularityTable::build(records);
        let raw = InteractionMatrix::pivot(records, &PivotSpec::default())?;
        let index = IdIndex::build(&raw);

        let matrix = match weighting {
            Some(weighting) => {
                let weighted = weighting.transform(&raw);
                // the id index was built from `raw`; a reordered matrix would desynchronise it
                if !weighted.shares_axes(&raw) {
                    return Err(RecommenderError::Invariant(format!(
                        "{} weighting changed the matrix layout",
                        weighting.name()
                    )));
                }
                weighted
            }
            None => raw,
        };

        let factors = AlsTrainer::new(config.als.clone()).train(&matrix)?;
        let own_items = ItemItemTrainer::new(config.own_items.clone()).train(&matrix)?;

        Self::from_parts(
            matrix,
            index,
            popularity,
            Box::new(factors),
            Box::new(own_items),
            weighting.is_some(),
        )
    }

    /// Assembles an engine from already-built parts.
    ///
    /// `matrix` is the matrix the models were trained on and `index` must
    /// have been built from it (or from the matrix it was reweighted from).
    pub fn from_parts(
        matrix: InteractionMatrix,
        index: IdIndex,
        popularity: PopularityTable,
        factors: Box<dyn LatentFactorModel>,
        own_items: Box<dyn OwnItemsModel>,
        weighted: bool,
    ) -> Result<Self> {
        let shapes = [
            ("id index users", index.n_users(), matrix.n_rows()),
            ("id index items", index.n_items(), matrix.n_cols()),
            ("factor model users", factors.n_users(), matrix.n_rows()),
            ("factor model items", factors.n_items(), matrix.n_cols()),
            ("own-items model items", own_items.n_items(), matrix.n_cols()),
        ];
        for (what, got, expected) in shapes {
            if got != expected {
                return Err(RecommenderError::Invariant(format!(
                    "{} = {}, interaction matrix has {}",
                    what, got, expected
                )));
            }
        }

        Ok(Self {
            matrix,
            index,
            popularity,
            factors,
            own_items,
            weighted,
        })
    }

    /// For each of the user's `n` most purchased items, the nearest other
    /// item under the factor model.
    pub fn similar_items_recommendation(&self, user: UserId, n: usize) -> Result<Vec<ItemId>> {
        self.index.user_index_of(user)?;

        let popular = self.popularity.top_n(user, n);
        let mut recommendations = Vec::with_capacity(n);

        for item in popular {
            let item_index = self.index.item_index_of(item)?;
            let similar = self.factors.similar_items(item_index, 2)?;
            if let Some(&(neighbour, score)) = without_self(&similar, item_index)?.first() {
                debug!(user, item, neighbour, score, "Similar item selected");
                recommendations.push(self.index.item_id_of(neighbour)?);
            }
        }

        expect_exactly(recommendations, n, user, "similar items")
    }

    /// One item per each of the user's `n` most similar users, picked by the
    /// own-items model from that user's history.
    pub fn similar_users_recommendation(&self, user: UserId, n: usize) -> Result<Vec<ItemId>> {
        let user_index = self.index.user_index_of(user)?;

        let similar = self.factors.similar_users(user_index, n + 1)?;
        let mut recommendations = Vec::with_capacity(n);

        for &(similar_user, similarity) in without_self(&similar, user_index)? {
            if let Some((item, score)) = self.own_items.recommend_top_one(similar_user, &self.matrix)? {
                debug!(user, similar_user, similarity, item, score, "Own item selected");
                recommendations.push(self.index.item_id_of(item)?);
            }
        }

        expect_exactly(recommendations, n, user, "similar users")
    }

    pub fn metadata(&self) -> EngineMetadata {
        EngineMetadata {
            n_users: self.matrix.n_rows(),
            n_items: self.matrix.n_cols(),
            nnz: self.matrix.nnz(),
            factors: self.factors.factors(),
            weighted: self.weighted,
        }
    }

    pub fn id_index(&self) -> &IdIndex {
        &self.index
    }

    pub fn popularity(&self) -> &PopularityTable {
        &self.popularity
    }

    pub fn matrix(&self) -> &InteractionMatrix {
        &self.matrix
    }
}

/// Drops entry 0 of a similarity list, checking it is the queried entity
fn without_self(similar: &[(usize, f32)], query: usize) -> Result<&[(usize, f32)]> {
    match similar.split_first() {
        Some((&(first, _), rest)) if first == query => Ok(rest),
        Some((&(first, _), _)) => Err(RecommenderError::Invariant(format!(
            "similarity list for index {} starts with index {}",
            query, first
        ))),
        None => Ok(&[]),
    }
}

fn expect_exactly(
    recommendations: Vec<ItemId>,
    n: usize,
    user: UserId,
    strategy: &str,
) -> Result<Vec<ItemId>> {
    if recommendations.len() != n {
        return Err(RecommenderError::Invariant(format!(
            "{} recommendation for user {} produced {} items, expected {}",
            strategy,
            user,
            recommendations.len(),
            n
        )));
    }
    Ok(recommendations)
}
