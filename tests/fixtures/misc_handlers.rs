use crate::models::{Account, Midway, Order};

#[get("/midway")]
pub async fn midway() -> Json<Midway> {
    todo!()
}

#[post("/transfers")]
pub async fn transfer(Json(from): Json<Account>, #[body] to: Account) -> StatusCode {
    todo!()
}

#[get("/search")]
pub async fn search(#[query] ids: Vec<u64>, #[header("X-Tenant")] tenant: String) -> Json<Vec<Order>> {
    todo!()
}
