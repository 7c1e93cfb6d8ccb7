use crate::api::CrudApi;
use crate::models::Order;

#[scope("/orders")]
#[tag("Orders")]
pub struct OrderController;

impl CrudApi<Order> for OrderController {}
