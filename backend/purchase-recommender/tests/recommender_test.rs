use purchase_recommender::config::{AlsConfig, ItemItemConfig, RecommenderConfig, WeightingScheme};
use purchase_recommender::services::{InteractionMatrix, MatrixWeighting};
use purchase_recommender::{Interaction, MainRecommender, RecommenderError, UNKNOWN_ITEM_ID};
use std::collections::HashSet;

fn config(weighting: bool) -> RecommenderConfig {
    RecommenderConfig {
        weighting,
        als: AlsConfig {
            factors: 4,
            regularization: 0.01,
            iterations: 8,
            num_threads: 2,
            ..AlsConfig::default()
        },
        own_items: ItemItemConfig {
            k: 1,
            num_threads: 2,
        },
        ..RecommenderConfig::default()
    }
}

/// Users 1-6 shop mostly in items 101-108, users 7-12 in 201-208.
/// Every user buys six distinct items with uneven repeat counts, plus a few
/// unidentified purchases.
fn purchase_log() -> Vec<Interaction> {
    let mut records = Vec::new();
    for user in 1..=12u64 {
        let base = if user <= 6 { 100 } else { 200 };
        for offset in 0..6u64 {
            let item = base + 1 + (user + offset) % 8;
            let repeats = 1 + (user * 3 + offset) % 4;
            for _ in 0..repeats {
                records.push(Interaction::new(user, item, 1 + (offset % 3) as u32));
            }
        }
        records.push(Interaction::new(user, UNKNOWN_ITEM_ID, 1));
        if user % 4 == 0 {
            records.push(Interaction::new(user, UNKNOWN_ITEM_ID, 2));
        }
    }
    // a single cross-group purchase keeps the graph connected
    records.push(Interaction::new(6, 201, 1));
    records
}

fn known_items(records: &[Interaction]) -> HashSet<u64> {
    records.iter().map(|r| r.item_id).collect()
}

#[test]
fn test_worked_example() {
    let records = vec![
        Interaction::new(1, 1, 3),
        Interaction::new(1, 2, 1),
        Interaction::new(2, 1, 2),
        Interaction::new(2, 3, 5),
    ];
    let recommender = MainRecommender::new(&records, &config(false)).unwrap();

    let index = recommender.id_index();
    assert_eq!(index.item_index_of(1).unwrap(), 0);
    assert_eq!(index.item_index_of(2).unwrap(), 1);
    assert_eq!(index.item_index_of(3).unwrap(), 2);
    assert_eq!(index.user_index_of(1).unwrap(), 0);
    assert_eq!(index.user_index_of(2).unwrap(), 1);
    assert_eq!(recommender.popularity().top_n(1, 1), vec![1]);

    let items = recommender.similar_items_recommendation(1, 1).unwrap();
    assert_eq!(items.len(), 1);
    assert_ne!(items[0], 1);
    assert!([2, 3].contains(&items[0]));
}

#[test]
fn test_similar_items_recommendation() {
    let records = purchase_log();
    let recommender = MainRecommender::new(&records, &config(true)).unwrap();
    let items = known_items(&records);

    for user in 1..=12 {
        let recommended = recommender.similar_items_recommendation(user, 5).unwrap();
        assert_eq!(recommended.len(), 5);
        assert!(recommended.iter().all(|item| items.contains(item)));
    }
}

#[test]
fn test_similar_items_insufficient_history() {
    let records = purchase_log();
    let recommender = MainRecommender::new(&records, &config(true)).unwrap();

    // six distinct identified items per user (user 6 has seven)
    assert!(matches!(
        recommender.similar_items_recommendation(3, 7),
        Err(RecommenderError::Invariant(_))
    ));
}

#[test]
fn test_similar_users_recommendation() {
    let records = purchase_log();
    let recommender = MainRecommender::new(&records, &config(false)).unwrap();
    let items = known_items(&records);

    for user in [1, 5, 9, 12] {
        let recommended = recommender.similar_users_recommendation(user, 5).unwrap();
        assert_eq!(recommended.len(), 5);
        assert!(recommended.iter().all(|item| items.contains(item)));
    }
}

#[test]
fn test_similar_users_pool_too_small() {
    let records = purchase_log();
    let recommender = MainRecommender::new(&records, &config(false)).unwrap();

    // only 11 other users exist
    assert!(matches!(
        recommender.similar_users_recommendation(1, 12),
        Err(RecommenderError::Invariant(_))
    ));
}

#[test]
fn test_unknown_user() {
    let records = purchase_log();
    let recommender = MainRecommender::new(&records, &config(true)).unwrap();

    assert!(matches!(
        recommender.similar_items_recommendation(404, 5),
        Err(RecommenderError::UnknownUser(_))
    ));
    assert!(matches!(
        recommender.similar_users_recommendation(404, 5),
        Err(RecommenderError::UnknownUser(_))
    ));
}

#[test]
fn test_weighting_keeps_id_index_aligned() {
    let records = purchase_log();
    let plain = MainRecommender::new(&records, &config(false)).unwrap();
    let tfidf = RecommenderConfig {
        weighting_scheme: WeightingScheme::TfIdf,
        ..config(true)
    };
    let weighted = MainRecommender::new(&records, &tfidf).unwrap();

    assert_eq!(plain.matrix().row_labels(), weighted.matrix().row_labels());
    assert_eq!(plain.matrix().col_labels(), weighted.matrix().col_labels());
    assert_eq!(plain.matrix().nnz(), weighted.matrix().nnz());
    assert!(weighted.metadata().weighted);
    assert!(!plain.metadata().weighted);

    let index = weighted.id_index();
    for dense in 0..index.n_items() {
        let item = index.item_id_of(dense).unwrap();
        assert_eq!(weighted.matrix().col_labels()[dense], item);
    }
}

/// Log-scaled quantities
struct LogWeighting;

impl MatrixWeighting for LogWeighting {
    fn transform(&self, matrix: &InteractionMatrix) -> InteractionMatrix {
        matrix.map_values(|_, _, value| value.ln_1p())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[test]
fn test_custom_weighting() {
    let records = purchase_log();
    let recommender =
        MainRecommender::with_weighting(&records, &config(false), &LogWeighting).unwrap();

    let plain = MainRecommender::new(&records, &config(false)).unwrap();

    assert!(recommender.metadata().weighted);
    for (raw, weighted) in plain.matrix().values().iter().zip(recommender.matrix().values()) {
        assert!((raw.ln_1p() - weighted).abs() < 1e-6);
    }
    assert_eq!(recommender.similar_items_recommendation(4, 5).unwrap().len(), 5);
}

#[test]
fn test_training_is_reproducible() {
    let records = purchase_log();
    let first = MainRecommender::new(&records, &config(true)).unwrap();
    let second = MainRecommender::new(&records, &config(true)).unwrap();

    for user in [2, 8] {
        assert_eq!(
            first.similar_items_recommendation(user, 3).unwrap(),
            second.similar_items_recommendation(user, 3).unwrap()
        );
        assert_eq!(
            first.similar_users_recommendation(user, 3).unwrap(),
            second.similar_users_recommendation(user, 3).unwrap()
        );
    }
}

#[test]
fn test_empty_log_fails_training() {
    assert!(matches!(
        MainRecommender::new(&[], &config(false)),
        Err(RecommenderError::Training(_))
    ));
}

#[test]
fn test_queries_from_many_threads() {
    let records = purchase_log();
    let recommender = MainRecommender::new(&records, &config(false)).unwrap();

    std::thread::scope(|scope| {
        for user in 1..=4u64 {
            let recommender = &recommender;
            scope.spawn(move || {
                assert_eq!(recommender.similar_items_recommendation(user, 3).unwrap().len(), 3);
            });
        }
    });
}
