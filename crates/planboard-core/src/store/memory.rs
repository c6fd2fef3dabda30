use async_trait::async_trait;
use parking_lot::Mutex;
use planboard_shared::OrderUpdateArgs;
use tracing::{debug, warn};

use super::{OrderFilter, OrderStore};
use crate::convert::{patch_from_wire, patch_to_wire};
use crate::error::StoreError;
use crate::order::{Order, OrderId, SchedulePatch};

#[derive(Debug, Default)]
struct MemoryState {
    orders: Vec<Order>,
    failing_updates: usize,
    failing_lists: usize,
    received: Vec<OrderUpdateArgs>,
    list_calls: usize,
}

/// In-process order service. Patches go through the wire representation so
/// the null/absent distinction is exercised the same way as over HTTP.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    state: Mutex<MemoryState>,
}

impl MemoryOrderStore {
    pub fn new(orders: Vec<Order>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                orders,
                ..MemoryState::default()
            }),
        }
    }

    /// The next `count` update requests fail without touching any order.
    pub fn fail_next_updates(&self, count: usize) {
        self.state.lock().failing_updates = count;
    }

    pub fn fail_next_list(&self) {
        self.state.lock().failing_lists += 1;
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state.lock().orders.clone()
    }

    /// Replaces the authoritative collection, as another client would.
    pub fn replace_orders(&self, orders: Vec<Order>) {
        self.state.lock().orders = orders;
    }

    pub fn received_updates(&self) -> Vec<OrderUpdateArgs> {
        self.state.lock().received.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let mut state = self.state.lock();
        state.list_calls += 1;

        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            warn!("memory store rejecting list request");
            return Err(StoreError::Unavailable("list request refused".to_string()));
        }

        Ok(state
            .orders
            .iter()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect())
    }

    async fn update_order(&self, id: &OrderId, patch: &SchedulePatch) -> Result<(), StoreError> {
        let wire = patch_to_wire(patch);
        let mut state = self.state.lock();
        state.received.push(OrderUpdateArgs {
            id: id.to_string(),
            patch: wire.clone(),
        });

        if state.failing_updates > 0 {
            state.failing_updates -= 1;
            warn!(order_id = %id, "memory store rejecting update request");
            return Err(StoreError::Unavailable("update request refused".to_string()));
        }

        let patch = patch_from_wire(&wire).map_err(|err| StoreError::Decode(format!("{err:#}")))?;
        let order = state
            .orders
            .iter_mut()
            .find(|order| &order.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        order.apply_patch(&patch);

        debug!(order_id = %id, "memory store applied patch");
        Ok(())
    }
}
