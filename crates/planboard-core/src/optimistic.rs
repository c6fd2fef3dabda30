//! Mutate-then-confirm synchronisation with the order store.
//!
//! A patch lands in the local [`OrderCache`] before the remote request is
//! even sent. Success needs no follow-up; failure throws the local state
//! away and replaces it with a fresh fetch. There is no retry and no partial
//! rollback.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ScheduleError;
use crate::order::{Order, OrderId, SchedulePatch};
use crate::store::{OrderFilter, OrderStore};

/// Local copy of the order collection shared with background sync tasks.
#[derive(Debug, Clone, Default)]
pub struct OrderCache {
    orders: Arc<Mutex<Vec<Order>>>,
}

impl OrderCache {
    pub fn snapshot(&self) -> Vec<Order> {
        self.orders.lock().clone()
    }

    pub fn with<R>(&self, read: impl FnOnce(&[Order]) -> R) -> R {
        read(&self.orders.lock())
    }

    pub fn get(&self, id: &OrderId) -> Option<Order> {
        self.orders.lock().iter().find(|order| &order.id == id).cloned()
    }

    pub fn replace_all(&self, orders: Vec<Order>) {
        *self.orders.lock() = orders;
    }

    /// Returns `false` when the order is not cached.
    pub fn apply_patch(&self, id: &OrderId, patch: &SchedulePatch) -> bool {
        let mut orders = self.orders.lock();
        match orders.iter_mut().find(|order| &order.id == id) {
            Some(order) => {
                order.apply_patch(patch);
                true
            }
            None => false,
        }
    }
}

/// Outcome of background synchronisation, reported to whoever hosts the
/// board.
#[derive(Debug)]
pub enum SyncEvent {
    PatchConfirmed { order_id: OrderId },
    PatchFailed(ScheduleError),
    Reloaded { count: usize },
    ReloadFailed(ScheduleError),
}

pub struct OptimisticPolicy<S: OrderStore + 'static> {
    store: Arc<S>,
    cache: OrderCache,
    filter: OrderFilter,
    runtime: Handle,
    events_tx: UnboundedSender<SyncEvent>,
    events_rx: UnboundedReceiver<SyncEvent>,
    in_flight: Vec<JoinHandle<()>>,
}

impl<S: OrderStore + 'static> OptimisticPolicy<S> {
    pub fn new(store: Arc<S>, filter: OrderFilter, runtime: Handle) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            store,
            cache: OrderCache::default(),
            filter,
            runtime,
            events_tx,
            events_rx,
            in_flight: Vec::new(),
        }
    }

    pub fn cache(&self) -> &OrderCache {
        &self.cache
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.iter().filter(|task| !task.is_finished()).count()
    }

    /// Applies `patch` locally right away and sends it to the store in the
    /// background. Returns `false`, without contacting the store, when the
    /// order is not cached.
    pub fn apply(&mut self, order_id: OrderId, patch: SchedulePatch) -> bool {
        if !self.cache.apply_patch(&order_id, &patch) {
            warn!(order_id = %order_id, "optimistic patch skipped for uncached order");
            return false;
        }
        debug!(order_id = %order_id, ?patch, "optimistic patch applied locally");

        self.in_flight.retain(|task| !task.is_finished());

        let store = Arc::clone(&self.store);
        let cache = self.cache.clone();
        let filter = self.filter.clone();
        let events = self.events_tx.clone();
        let task = self.runtime.spawn(async move {
            match store.update_order(&order_id, &patch).await {
                Ok(()) => {
                    debug!(order_id = %order_id, "order store confirmed patch");
                    let _ = events.send(SyncEvent::PatchConfirmed { order_id });
                }
                Err(source) => {
                    warn!(
                        order_id = %order_id,
                        error = %source,
                        "order store rejected patch; reloading orders"
                    );
                    let _ = events.send(SyncEvent::PatchFailed(ScheduleError::RemoteUpdate {
                        order_id,
                        source,
                    }));
                    let event = match fetch_into(store.as_ref(), &cache, &filter).await {
                        Ok(count) => SyncEvent::Reloaded { count },
                        Err(err) => SyncEvent::ReloadFailed(err),
                    };
                    let _ = events.send(event);
                }
            }
        });
        self.in_flight.push(task);
        true
    }

    /// Fetches the full collection and replaces the cache with it. On
    /// failure the cache keeps its previous content.
    pub async fn reload(&self) -> Result<usize, ScheduleError> {
        fetch_into(self.store.as_ref(), &self.cache, &self.filter).await
    }

    pub fn report(&self, event: SyncEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Waits for every remote call issued so far, reconciliation included.
    pub async fn settle(&mut self) {
        for task in std::mem::take(&mut self.in_flight) {
            if let Err(err) = task.await {
                warn!(error = %err, "order sync task did not complete");
            }
        }
    }

    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

async fn fetch_into<S: OrderStore + ?Sized>(
    store: &S,
    cache: &OrderCache,
    filter: &OrderFilter,
) -> Result<usize, ScheduleError> {
    match store.list_orders(filter).await {
        Ok(orders) => {
            let count = orders.len();
            cache.replace_all(orders);
            info!(count, "order cache replaced from store");
            Ok(count)
        }
        Err(source) => {
            warn!(error = %source, "fetching orders failed; keeping last known state");
            Err(ScheduleError::RemoteFetch(source))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use tokio::runtime::Handle;

    use super::{OptimisticPolicy, SyncEvent};
    use crate::order::{Order, OrderId, OrderStatus, SchedulePatch};
    use crate::store::{MemoryOrderStore, OrderFilter};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
    }

    #[tokio::test]
    async fn patches_for_uncached_orders_never_reach_the_store() {
        let store = Arc::new(MemoryOrderStore::new(vec![Order::new(
            "O1",
            OrderStatus::AwaitingAssignment,
            "frames",
        )]));
        let mut policy =
            OptimisticPolicy::new(Arc::clone(&store), OrderFilter::all(), Handle::current());
        policy.reload().await.expect("initial load");

        // another client removed the order and a reload picked that up
        store.replace_orders(Vec::new());
        policy.reload().await.expect("reload");

        assert!(!policy.apply(OrderId::from("O1"), SchedulePatch::single_day(day(10))));
        assert_eq!(policy.in_flight(), 0);
        policy.settle().await;
        assert!(store.received_updates().is_empty());
        assert!(policy.drain_events().is_empty());
    }

    #[tokio::test]
    async fn confirmed_patches_are_reported() {
        let store = Arc::new(MemoryOrderStore::new(vec![Order::new(
            "O1",
            OrderStatus::AwaitingAssignment,
            "frames",
        )]));
        let mut policy =
            OptimisticPolicy::new(Arc::clone(&store), OrderFilter::all(), Handle::current());
        policy.reload().await.expect("initial load");

        assert!(policy.apply(OrderId::from("O1"), SchedulePatch::single_day(day(10))));
        let cached = policy.cache().get(&OrderId::from("O1")).expect("cached order");
        assert_eq!(cached.scheduled_start, Some(day(10)));

        policy.settle().await;
        assert!(matches!(
            policy.drain_events().as_slice(),
            [SyncEvent::PatchConfirmed { order_id }] if order_id.as_str() == "O1"
        ));
    }
}
