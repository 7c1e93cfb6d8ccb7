use crate::models::Page;

pub trait CrudApi<T> {
    #[get("/")]
    fn list(&self, #[query] page: u32) -> Json<Page<T>>;

    #[get("/{id}")]
    fn find(&self, id: u64) -> Json<T>;
}
