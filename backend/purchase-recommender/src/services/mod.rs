pub mod engine;
pub mod factorization;
pub mod id_index;
pub mod matrix;
pub mod own_items;
pub mod popularity;
pub mod weighting;

pub use engine::{MainRecommender, DEFAULT_RECOMMENDATIONS};
pub use factorization::{AlsModel, AlsTrainer, LatentFactorModel};
pub use id_index::IdIndex;
pub use matrix::{Aggregate, Field, InteractionMatrix, PivotSpec};
pub use own_items::{ItemItemModel, ItemItemTrainer, OwnItemsModel, RecommendOptions};
pub use popularity::PopularityTable;
pub use weighting::{weighting_for, Bm25Weighting, MatrixWeighting, TfIdfWeighting};
