use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::instrument;

use super::{OrderFilter, OrderStore};
use crate::datastore::DataStore;
use crate::error::StoreError;
use crate::order::{Order, OrderId, SchedulePatch};

/// Order store backed by the local JSON-lines datastore.
#[derive(Debug, Clone)]
pub struct FileOrderStore {
    store: Arc<Mutex<DataStore>>,
}

impl FileOrderStore {
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(DataStore::open(data_dir)?))
    }

    pub fn new(store: DataStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn import(&self, orders: Vec<Order>) -> anyhow::Result<(usize, usize)> {
        self.store.lock().upsert_orders(orders)
    }

    async fn blocking<T, F>(&self, job: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&DataStore) -> anyhow::Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let guard = store.lock();
            job(&guard)
        })
        .await
        .map_err(|err| StoreError::Backend(format!("datastore task failed: {err}")))?
        .map_err(StoreError::backend)
    }
}

#[async_trait]
impl OrderStore for FileOrderStore {
    #[instrument(skip(self))]
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let filter = filter.clone();
        let orders = self.blocking(|store| store.load_orders()).await?;
        Ok(orders
            .into_iter()
            .filter(|order| filter.matches(order))
            .collect())
    }

    #[instrument(skip(self, patch), fields(order_id = %id))]
    async fn update_order(&self, id: &OrderId, patch: &SchedulePatch) -> Result<(), StoreError> {
        let target = id.clone();
        let patch = patch.clone();
        let updated = self
            .blocking(move |store| store.patch_order(&target, &patch))
            .await?;

        match updated {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id.clone())),
        }
    }
}
