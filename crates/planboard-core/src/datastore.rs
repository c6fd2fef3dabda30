use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::order::{Order, OrderId, SchedulePatch};

/// Local order collection kept as JSON lines, one order per line.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub orders_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let orders_path = data_dir.join("orders.data");
        if !orders_path.exists() {
            fs::write(&orders_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            orders = %orders_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            orders_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_orders(&self) -> anyhow::Result<Vec<Order>> {
        load_jsonl(&self.orders_path).context("failed to load orders.data")
    }

    #[tracing::instrument(skip(self, orders))]
    pub fn save_orders(&self, orders: &[Order]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.orders_path, orders).context("failed to save orders.data")
    }

    #[tracing::instrument(skip(self, patch), fields(order_id = %id))]
    pub fn patch_order(
        &self,
        id: &OrderId,
        patch: &SchedulePatch,
    ) -> anyhow::Result<Option<Order>> {
        let mut orders = self.load_orders()?;
        let Some(order) = orders.iter_mut().find(|order| &order.id == id) else {
            return Ok(None);
        };

        order.apply_patch(patch);
        let updated = order.clone();
        self.save_orders(&orders)?;

        debug!(
            start = ?updated.scheduled_start,
            end = ?updated.scheduled_end,
            "order schedule patched"
        );
        Ok(Some(updated))
    }

    /// Inserts or replaces orders by id. Returns `(added, replaced)`.
    #[tracing::instrument(skip(self, incoming), fields(count = incoming.len()))]
    pub fn upsert_orders(&self, incoming: Vec<Order>) -> anyhow::Result<(usize, usize)> {
        let mut orders = self.load_orders()?;
        let mut added = 0;
        let mut replaced = 0;

        for order in incoming {
            if let Some(existing) = orders.iter_mut().find(|existing| existing.id == order.id) {
                *existing = order;
                replaced += 1;
            } else {
                orders.push(order);
                added += 1;
            }
        }

        orders.sort_by(|a, b| a.id.cmp(&b.id));
        self.save_orders(&orders)?;

        info!(added, replaced, total = orders.len(), "imported orders");
        Ok((added, replaced))
    }
}

/// Accepts either a JSON array of orders or one order per line.
pub fn parse_import_items(raw: &str) -> anyhow::Result<Vec<Order>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(vec![]);
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("failed parsing order array");
    }

    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line.trim())
                .with_context(|| format!("failed parsing import line {}", idx + 1))
        })
        .collect()
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Order>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let order: Order = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(order);
    }

    debug!(count = out.len(), "loaded orders from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, orders))]
fn save_jsonl_atomic(path: &Path, orders: &[Order]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = orders.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for order in orders {
        let serialized = serde_json::to_string(order)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
