//! Port to the order service and its adapters.

mod file;
mod http;
mod memory;

use async_trait::async_trait;

pub use file::FileOrderStore;
pub use http::HttpOrderStore;
pub use memory::MemoryOrderStore;

use crate::error::StoreError;
use crate::order::{Order, OrderId, OrderStatus, SchedulePatch};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Case-insensitive match against the order id or product.
    pub query: Option<String>,
}

impl OrderFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, order: &Order) -> bool {
        if let Some(status) = self.status
            && order.status != status
        {
            return false;
        }

        if let Some(query) = self.query.as_ref() {
            let q = query.to_ascii_lowercase();
            if !order.id.as_str().to_ascii_lowercase().contains(&q)
                && !order.product.to_ascii_lowercase().contains(&q)
            {
                return false;
            }
        }

        true
    }
}

/// Remote order collection.
///
/// `update_order` is a partial update: fields absent from the patch are
/// left alone, explicit `Some(None)` clears them.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    async fn update_order(&self, id: &OrderId, patch: &SchedulePatch) -> Result<(), StoreError>;
}
