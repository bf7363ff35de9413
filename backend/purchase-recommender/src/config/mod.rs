use crate::error::{RecommenderError, Result};
use crate::services::engine::DEFAULT_RECOMMENDATIONS;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub recommender: RecommenderConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub interactions_path: String,
    /// Number of recommendations requested per query
    pub top_n: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            interactions_path: "./data/retail_train.csv".to_string(),
            top_n: DEFAULT_RECOMMENDATIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Reweight the interaction matrix before training
    pub weighting: bool,
    pub weighting_scheme: WeightingScheme,
    pub bm25: Bm25Config,
    pub als: AlsConfig,
    pub own_items: ItemItemConfig,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            weighting: true,
            weighting_scheme: WeightingScheme::Bm25,
            bm25: Bm25Config::default(),
            als: AlsConfig::default(),
            own_items: ItemItemConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightingScheme {
    Bm25,
    TfIdf,
}

impl FromStr for WeightingScheme {
    type Err = RecommenderError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bm25" => Ok(WeightingScheme::Bm25),
            "tfidf" | "tf-idf" => Ok(WeightingScheme::TfIdf),
            other => Err(RecommenderError::Config(format!(
                "unknown weighting scheme '{}', expected bm25 or tfidf",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Config {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: 100.0, b: 0.8 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlsConfig {
    pub factors: usize,
    pub regularization: f32,
    pub iterations: usize,
    pub use_gpu: bool,
    /// 0 = one worker per core
    pub num_threads: usize,
    pub random_seed: u64,
}

impl Default for AlsConfig {
    fn default() -> Self {
        Self {
            factors: 20,
            regularization: 0.001,
            iterations: 15,
            use_gpu: false,
            num_threads: 0,
            random_seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemItemConfig {
    /// Neighbours kept per item
    pub k: usize,
    pub num_threads: usize,
}

impl Default for ItemItemConfig {
    fn default() -> Self {
        Self {
            k: 1,
            num_threads: 4,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let data_defaults = DataConfig::default();
        let als_defaults = AlsConfig::default();
        let bm25_defaults = Bm25Config::default();
        let own_defaults = ItemItemConfig::default();

        Ok(Config {
            recommender: RecommenderConfig {
                weighting: env_or("RECOMMENDER_WEIGHTING", true)?,
                weighting_scheme: env_or("RECOMMENDER_WEIGHTING_SCHEME", WeightingScheme::Bm25)?,
                bm25: Bm25Config {
                    k1: env_or("BM25_K1", bm25_defaults.k1)?,
                    b: env_or("BM25_B", bm25_defaults.b)?,
                },
                als: AlsConfig {
                    factors: env_or("ALS_FACTORS", als_defaults.factors)?,
                    regularization: env_or("ALS_REGULARIZATION", als_defaults.regularization)?,
                    iterations: env_or("ALS_ITERATIONS", als_defaults.iterations)?,
                    use_gpu: env_or("ALS_USE_GPU", als_defaults.use_gpu)?,
                    num_threads: env_or("ALS_NUM_THREADS", als_defaults.num_threads)?,
                    random_seed: env_or("ALS_RANDOM_SEED", als_defaults.random_seed)?,
                },
                own_items: ItemItemConfig {
                    k: env_or("OWN_RECOMMENDER_K", own_defaults.k)?,
                    num_threads: env_or("OWN_RECOMMENDER_NUM_THREADS", own_defaults.num_threads)?,
                },
            },
            data: DataConfig {
                interactions_path: env::var("INTERACTIONS_PATH")
                    .unwrap_or(data_defaults.interactions_path),
                top_n: env_or("RECOMMENDATION_TOP_N", data_defaults.top_n)?,
            },
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            RecommenderError::Config(format!("{} has invalid value '{}': {}", key, raw, e))
        }),
        Err(_) => Ok(default),
    }
}
