//! Month grid construction.
//!
//! The grid is always 6 weeks of 7 days starting on Monday. Cells outside
//! the displayed month carry no date and are rendered as disabled filler.

use chrono::{Days, NaiveDate};

use crate::datetime::{MonthRef, start_of_week};
use crate::order::{Order, OrderId};

pub const WEEK_LENGTH: usize = 7;
pub const GRID_ROWS: usize = 6;
pub const GRID_CELLS: usize = WEEK_LENGTH * GRID_ROWS;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GridCell {
    pub date: Option<NaiveDate>,
    pub orders: Vec<OrderId>,
}

impl GridCell {
    fn filler() -> Self {
        Self::default()
    }

    pub fn is_filler(&self) -> bool {
        self.date.is_none()
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.orders.iter().any(|order| order == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub month: MonthRef,
    pub cells: Vec<GridCell>,
}

impl MonthGrid {
    pub fn weeks(&self) -> impl Iterator<Item = &[GridCell]> {
        self.cells.chunks(WEEK_LENGTH)
    }

    pub fn cell_for(&self, day: NaiveDate) -> Option<&GridCell> {
        self.cells.iter().find(|cell| cell.date == Some(day))
    }

    pub fn dated_cells(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.iter().filter(|cell| !cell.is_filler())
    }
}

pub fn weekday_labels() -> [&'static str; WEEK_LENGTH] {
    ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
}

/// Builds the 42-cell grid for `month`, listing per day every order whose
/// scheduled range covers it. `today` feeds the end-date fallback of
/// running orders without an explicit end.
pub fn build_month_grid(month: MonthRef, orders: &[Order], today: NaiveDate) -> MonthGrid {
    let origin = start_of_week(month.first_day());

    let ranges: Vec<(&OrderId, NaiveDate, NaiveDate)> = orders
        .iter()
        .filter_map(|order| {
            order
                .scheduled_range(today)
                .map(|(start, end)| (&order.id, start, end))
        })
        .collect();

    let mut cells = Vec::with_capacity(GRID_CELLS);
    for index in 0..GRID_CELLS {
        let Some(date) = origin
            .checked_add_days(Days::new(index as u64))
            .filter(|date| month.contains(*date))
        else {
            cells.push(GridCell::filler());
            continue;
        };

        let members = ranges
            .iter()
            .filter(|(_, start, end)| *start <= date && date <= *end)
            .map(|(id, _, _)| (*id).clone())
            .collect();

        cells.push(GridCell {
            date: Some(date),
            orders: members,
        });
    }

    tracing::trace!(
        month = %month,
        origin = %origin,
        scheduled = ranges.len(),
        "built month grid"
    );

    MonthGrid { month, cells }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{GRID_CELLS, build_month_grid};
    use crate::datetime::MonthRef;
    use crate::order::{Order, OrderStatus};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn march() -> MonthRef {
        MonthRef::new(2025, 3).expect("valid month")
    }

    #[test]
    fn grid_has_leading_and_trailing_filler() {
        let grid = build_month_grid(march(), &[], day(2025, 3, 1));

        assert_eq!(grid.cells.len(), GRID_CELLS);
        // March 2025 starts on a Saturday
        assert!(grid.cells[..5].iter().all(|cell| cell.is_filler()));
        assert_eq!(grid.cells[5].date, Some(day(2025, 3, 1)));
        assert_eq!(grid.cells[35].date, Some(day(2025, 3, 31)));
        assert!(grid.cells[36..].iter().all(|cell| cell.is_filler()));
        assert_eq!(grid.dated_cells().count(), 31);
        assert_eq!(grid.weeks().count(), 6);
    }

    #[test]
    fn month_starting_on_monday_has_no_leading_filler() {
        let september = MonthRef::new(2025, 9).expect("valid month");
        let grid = build_month_grid(september, &[], day(2025, 9, 1));
        assert_eq!(grid.cells[0].date, Some(day(2025, 9, 1)));
    }

    #[test]
    fn orders_appear_on_every_day_of_their_range() {
        let mut spanning = Order::new("O1", OrderStatus::AwaitingAssignment, "frames");
        spanning.scheduled_start = Some(day(2025, 3, 10));
        spanning.scheduled_end = Some(day(2025, 3, 13));

        let mut legacy = Order::new("O2", OrderStatus::Paused, "hinges");
        legacy.scheduled_start = Some(day(2025, 3, 12));

        let pool = Order::new("O3", OrderStatus::AwaitingAssignment, "bolts");

        let orders = vec![spanning, legacy, pool];
        let grid = build_month_grid(march(), &orders, day(2025, 3, 20));

        let ids = |d: u32| -> Vec<String> {
            grid.cell_for(day(2025, 3, d))
                .expect("dated cell")
                .orders
                .iter()
                .map(|id| id.to_string())
                .collect()
        };

        assert!(ids(9).is_empty());
        assert_eq!(ids(10), vec!["O1"]);
        assert_eq!(ids(12), vec!["O1", "O2"]);
        assert_eq!(ids(13), vec!["O1"]);
        assert!(ids(14).is_empty());
    }

    #[test]
    fn ranges_crossing_month_edges_are_clipped_to_the_grid() {
        let mut order = Order::new("O4", OrderStatus::InProgress, "panels");
        order.scheduled_start = Some(day(2025, 2, 26));
        order.scheduled_end = Some(day(2025, 3, 2));

        let grid = build_month_grid(march(), &[order], day(2025, 3, 2));
        let occupied: Vec<NaiveDate> = grid
            .dated_cells()
            .filter(|cell| !cell.orders.is_empty())
            .filter_map(|cell| cell.date)
            .collect();
        assert_eq!(occupied, vec![day(2025, 3, 1), day(2025, 3, 2)]);
    }
}
