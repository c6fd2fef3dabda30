use chrono::NaiveDate;

use crate::order::{Order, OrderId, OrderStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayDetailEntry {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub start: NaiveDate,
    /// Effective end, after the single-date fallback.
    pub end: NaiveDate,
    pub product: String,
}

/// Read-only listing of the orders running on one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayDetail {
    pub day: NaiveDate,
    pub entries: Vec<DayDetailEntry>,
}

impl DayDetail {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.entries.iter().any(|entry| &entry.order_id == id)
    }
}

pub fn build_day_detail(day: NaiveDate, orders: &[Order], today: NaiveDate) -> DayDetail {
    let entries = orders
        .iter()
        .filter_map(|order| {
            let (start, end) = order.scheduled_range(today)?;
            if start > day || day > end {
                return None;
            }
            Some(DayDetailEntry {
                order_id: order.id.clone(),
                status: order.status,
                start,
                end,
                product: order.product.clone(),
            })
        })
        .collect();

    DayDetail { day, entries }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::build_day_detail;
    use crate::order::{Order, OrderId, OrderStatus};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
    }

    #[test]
    fn lists_orders_whose_range_covers_the_day() {
        let mut ranged = Order::new("O1", OrderStatus::AwaitingAssignment, "frames");
        ranged.scheduled_start = Some(day(10));
        ranged.scheduled_end = Some(day(13));

        let mut running = Order::new("O2", OrderStatus::InProgress, "panels");
        running.scheduled_start = Some(day(5));

        let pool = Order::new("O3", OrderStatus::AwaitingAssignment, "hinges");

        let orders = vec![ranged, running, pool];
        let today = day(12);

        let detail = build_day_detail(day(11), &orders, today);
        assert_eq!(detail.entries.len(), 2);
        assert_eq!(detail.entries[0].order_id, OrderId::from("O1"));
        assert_eq!(detail.entries[0].end, day(13));
        assert_eq!(detail.entries[1].order_id, OrderId::from("O2"));
        assert_eq!(detail.entries[1].end, today);

        let before = build_day_detail(day(8), &orders, today);
        assert!(!before.contains(&OrderId::from("O1")));
        assert!(before.contains(&OrderId::from("O2")));

        assert!(build_day_detail(day(20), &orders, today).is_empty());
    }
}
