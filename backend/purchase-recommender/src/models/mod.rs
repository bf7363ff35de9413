use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type ItemId = u64;

/// Placeholder item code used by the transaction log for unidentified purchases.
pub const UNKNOWN_ITEM_ID: ItemId = 999_999;

/// One row of the purchase log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub quantity: u32,
    #[serde(default)]
    pub basket_id: Option<u64>,
    #[serde(default)]
    pub sales_value: Option<f64>,
}

impl Interaction {
    pub fn new(user_id: UserId, item_id: ItemId, quantity: u32) -> Self {
        Self {
            user_id,
            item_id,
            quantity,
            basket_id: None,
            sales_value: None,
        }
    }

    pub fn with_basket(mut self, basket_id: u64) -> Self {
        self.basket_id = Some(basket_id);
        self
    }

    pub fn with_sales_value(mut self, sales_value: f64) -> Self {
        self.sales_value = Some(sales_value);
        self
    }
}

/// Summary of a trained recommender
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineMetadata {
    pub n_users: usize,
    pub n_items: usize,
    pub nnz: usize,
    pub factors: usize,
    pub weighted: bool,
}
