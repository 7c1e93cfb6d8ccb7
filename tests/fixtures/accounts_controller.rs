use crate::models::{Account, Page, Paging};

/// Account management.
#[scope("/accounts")]
pub struct AccountController;

impl AccountController {
    /// List accounts.
    #[get("/")]
    pub async fn list(&self, Query(paging): Query<Paging>) -> Json<Page<Account>> {
        todo!()
    }

    /// Fetch one account.
    #[get("/{id}")]
    pub async fn get_by_id(&self, Path(id): Path<u64>) -> Result<Json<Account>, ApiError> {
        todo!()
    }

    #[post("/")]
    pub async fn create(&self, Json(account): Json<Account>) -> (StatusCode, Json<Account>) {
        todo!()
    }

    #[delete("/{id}")]
    pub async fn close(&self, Path(id): Path<u64>) -> StatusCode {
        todo!()
    }

    fn audit(&self) {}
}
