use serde::Serialize;
use utoipa::ToSchema;

use crate::{dto::orders::OrderWithItems, models::Product};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_products: i64,
    pub total_orders: i64,
    pub total_revenue: f64,
    pub low_stock_products: Vec<Product>,
    pub recent_orders: Vec<OrderWithItems>,
}
