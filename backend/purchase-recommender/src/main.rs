use anyhow::Context;
use purchase_recommender::{
    load_interactions, Config, MainRecommender, Result as RecommenderResult, UserId,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Serialize)]
struct UserRecommendations {
    user_id: UserId,
    similar_items: Outcome,
    similar_users: Outcome,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Items(Vec<u64>),
    Error(String),
}

impl From<RecommenderResult<Vec<u64>>> for Outcome {
    fn from(result: RecommenderResult<Vec<u64>>) -> Self {
        match result {
            Ok(items) => Outcome::Items(items),
            Err(e) => Outcome::Error(e.to_string()),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("Failed to load config")?;

    let users: Vec<UserId> = std::env::args()
        .skip(1)
        .map(|arg| {
            arg.parse()
                .with_context(|| format!("user id '{}' is not a valid integer", arg))
        })
        .collect::<anyhow::Result<_>>()?;

    if users.is_empty() {
        warn!("No user ids given; pass them as arguments to print recommendations");
    }

    let records = load_interactions(&config.data.interactions_path).with_context(|| {
        format!(
            "Failed to load interactions from {}",
            config.data.interactions_path
        )
    })?;

    let recommender = MainRecommender::new(&records, &config.recommender)
        .context("Failed to train recommender")?;

    let metadata = recommender.metadata();
    info!(
        users = metadata.n_users,
        items = metadata.n_items,
        nnz = metadata.nnz,
        factors = metadata.factors,
        weighted = metadata.weighted,
        "Recommender ready"
    );

    let n = config.data.top_n;
    for user_id in users {
        let output = UserRecommendations {
            user_id,
            similar_items: recommender.similar_items_recommendation(user_id, n).into(),
            similar_users: recommender.similar_users_recommendation(user_id, n).into(),
        };
        println!("{}", serde_json::to_string(&output)?);
    }

    Ok(())
}
