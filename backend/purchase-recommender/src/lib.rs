//! Purchase-history recommendations.
//!
//! Builds a user x item matrix from a purchase log, trains an implicit ALS
//! factor model and an item-item neighbour model on it, and answers two
//! queries:
//!
//! - items similar to what the user bought most
//!   ([`MainRecommender::similar_items_recommendation`])
//! - items bought by users similar to the user
//!   ([`MainRecommender::similar_users_recommendation`])
//!
//! ```rust,no_run
//! use purchase_recommender::{load_interactions, MainRecommender, RecommenderConfig};
//!
//! let records = load_interactions("retail_train.csv").unwrap();
//! let recommender = MainRecommender::new(&records, &RecommenderConfig::default()).unwrap();
//! let items = recommender.similar_items_recommendation(2375, 5).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod services;

pub use config::{Config, RecommenderConfig};
pub use error::{RecommenderError, Result};
pub use loader::{load_interactions, read_interactions};
pub use models::{EngineMetadata, Interaction, ItemId, UserId, UNKNOWN_ITEM_ID};
pub use services::MainRecommender;
