use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OrderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AwaitingAssignment,
    InProgress,
    Paused,
    Finished,
    Cancelled,
}

impl OrderStatus {
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::AwaitingAssignment => "awaiting assignment",
            OrderStatus::InProgress => "in progress",
            OrderStatus::Paused => "paused",
            OrderStatus::Finished => "finished",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "awaiting_assignment" | "awaiting" => Some(OrderStatus::AwaitingAssignment),
            "in_progress" | "active" => Some(OrderStatus::InProgress),
            "paused" => Some(OrderStatus::Paused),
            "finished" | "done" => Some(OrderStatus::Finished),
            "cancelled" | "canceled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// A production order as cached from the order service.
///
/// Only `scheduled_start` and `scheduled_end` are ever written by this
/// crate; everything else is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: OrderId,

    pub status: OrderStatus,

    #[serde(default)]
    pub scheduled_start: Option<NaiveDate>,

    #[serde(default)]
    pub scheduled_end: Option<NaiveDate>,

    #[serde(default)]
    pub product: String,

    #[serde(default)]
    pub planned_quantity: Option<f64>,

    #[serde(default)]
    pub unit: Option<String>,

    #[serde(default)]
    pub related_sale_order_number: Option<String>,

    #[serde(default)]
    pub sales_priority: Option<String>,

    #[serde(default)]
    pub estimated_sale_date: Option<NaiveDate>,

    #[serde(default)]
    pub supervisor: Option<String>,

    #[serde(default)]
    pub sales_rep: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Order {
    pub fn new(id: impl Into<OrderId>, status: OrderStatus, product: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status,
            scheduled_start: None,
            scheduled_end: None,
            product: product.into(),
            planned_quantity: None,
            unit: None,
            related_sale_order_number: None,
            sales_priority: None,
            estimated_sale_date: None,
            supervisor: None,
            sales_rep: None,
            extra: BTreeMap::new(),
        }
    }

    /// Last day the order occupies on the calendar.
    ///
    /// Legacy single-date orders have no end: the end falls back to the
    /// start, or to today for orders already running.
    pub fn effective_end(&self, today: NaiveDate) -> Option<NaiveDate> {
        let start = self.scheduled_start?;
        if let Some(end) = self.scheduled_end {
            return Some(end);
        }
        if self.status == OrderStatus::InProgress {
            Some(start.max(today))
        } else {
            Some(start)
        }
    }

    pub fn scheduled_range(&self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.scheduled_start?;
        let end = self.effective_end(today)?;
        Some((start, end))
    }

    pub fn occupies(&self, day: NaiveDate, today: NaiveDate) -> bool {
        self.scheduled_range(today)
            .is_some_and(|(start, end)| start <= day && day <= end)
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_start.is_some()
    }

    pub fn is_draggable(&self) -> bool {
        self.status == OrderStatus::AwaitingAssignment
    }

    pub fn in_unscheduled_pool(&self) -> bool {
        self.status == OrderStatus::AwaitingAssignment && self.scheduled_start.is_none()
    }

    pub fn apply_patch(&mut self, patch: &SchedulePatch) {
        if let Some(start) = patch.scheduled_start {
            self.scheduled_start = start;
        }
        if let Some(end) = patch.scheduled_end {
            self.scheduled_end = end;
        }
    }
}

/// Field-level schedule update. `None` leaves a field alone, `Some(None)`
/// clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulePatch {
    pub scheduled_start: Option<Option<NaiveDate>>,
    pub scheduled_end: Option<Option<NaiveDate>>,
}

impl SchedulePatch {
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            scheduled_start: Some(Some(day)),
            scheduled_end: Some(Some(day)),
        }
    }

    pub fn extend_to(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            scheduled_start: Some(Some(start)),
            scheduled_end: Some(Some(end)),
        }
    }

    pub fn clear() -> Self {
        Self {
            scheduled_start: Some(None),
            scheduled_end: Some(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled_start.is_none() && self.scheduled_end.is_none()
    }
}

pub fn find_order<'a>(orders: &'a [Order], id: &OrderId) -> Option<&'a Order> {
    orders.iter().find(|order| &order.id == id)
}

pub fn unscheduled_pool(orders: &[Order]) -> Vec<&Order> {
    orders
        .iter()
        .filter(|order| order.in_unscheduled_pool())
        .collect()
}
