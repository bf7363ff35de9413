use crate::models::{Interaction, ItemId, UserId, UNKNOWN_ITEM_ID};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Per-user purchase ranking.
///
/// Counts records per (user, item), drops the unknown-item sentinel and sorts
/// each user's items by count descending, ties by ascending item id. Built
/// once; queries only read it.
#[derive(Debug, Clone, Default)]
pub struct PopularityTable {
    by_user: HashMap<UserId, Vec<(ItemId, u64)>>,
}

impl PopularityTable {
    pub fn build(records: &[Interaction]) -> Self {
        let mut counts: HashMap<(UserId, ItemId), u64> = HashMap::new();
        for record in records {
            *counts.entry((record.user_id, record.item_id)).or_insert(0) += 1;
        }

        let mut by_user: HashMap<UserId, Vec<(ItemId, u64)>> = HashMap::new();
        for (&(user, item), &count) in &counts {
            if item == UNKNOWN_ITEM_ID {
                continue;
            }
            by_user.entry(user).or_default().push((item, count));
        }

        for items in by_user.values_mut() {
            items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        }

        let mut unidentified: Vec<UserId> = counts
            .keys()
            .map(|&(user, _)| user)
            .filter(|user| !by_user.contains_key(user))
            .collect();
        unidentified.sort_unstable();
        unidentified.dedup();
        for user in unidentified {
            warn!(user, "User has only unidentified purchases; no popular items");
        }

        debug!(users = by_user.len(), "Popularity table built");

        Self { by_user }
    }

    /// Up to `n` most purchased items; shorter when the user bought fewer
    pub fn top_n(&self, user: UserId, n: usize) -> Vec<ItemId> {
        self.purchases(user)
            .iter()
            .take(n)
            .map(|&(item, _)| item)
            .collect()
    }

    pub fn purchases(&self, user: UserId) -> &[(ItemId, u64)] {
        self.by_user.get(&user).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn n_users(&self) -> usize {
        self.by_user.len()
    }
}
