use serde::{Deserialize, Serialize};

/// A bank account.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    /// Name of the account holder.
    pub owner_name: String,
    pub status: AccountStatus,
    pub balance: f64,
    pub opened_on: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountId(pub u64);

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Open,
    Frozen,
    Closed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub account_id: AccountId,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: u32,
}

/// One page of results.
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Deserialize)]
pub struct Paging {
    pub page: u32,
    pub size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct Zebra {
    pub stripes: u32,
}

#[derive(Debug, Serialize)]
pub struct Midway {
    pub zebra: Zebra,
    pub account: Account,
}
