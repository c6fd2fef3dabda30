use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::board::{BoardEvent, OrderCard};
use crate::calendar::{MonthGrid, weekday_labels};
use crate::config::Config;
use crate::datetime::format_day;
use crate::detail::DayDetail;
use crate::optimistic::SyncEvent;
use crate::order::Order;
use crate::range::RangeState;

const CELL_WIDTH: usize = 9;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.display.color,
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, grid, range))]
    pub fn print_month(
        &self,
        grid: &MonthGrid,
        range: &RangeState,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_month(&mut out, grid, range, today)
    }

    pub fn write_month<W: Write>(
        &self,
        mut out: W,
        grid: &MonthGrid,
        range: &RangeState,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", grid.month.title())?;

        for label in weekday_labels() {
            write!(out, "{label:<width$}", width = CELL_WIDTH)?;
        }
        writeln!(out)?;

        let pending = range.pending_order();
        for week in grid.weeks() {
            for cell in week {
                let Some(day) = cell.date else {
                    write!(out, "{:<width$}", " .", width = CELL_WIDTH)?;
                    continue;
                };

                let mut text = format!("{:>2}", day.day());
                if !cell.orders.is_empty() {
                    text.push_str(&format!(" ({})", cell.orders.len()));
                }
                let marked = pending.is_some_and(|id| cell.contains(id));
                if marked {
                    text.push('*');
                }

                let painted = if marked {
                    self.paint(&text, "33")
                } else if day == today {
                    self.paint(&text, "1;4")
                } else {
                    text
                };
                write!(out, "{}", pad_visible(&painted, CELL_WIDTH))?;
            }
            writeln!(out)?;
        }

        if let RangeState::AwaitingEnd { order_id, start } = range {
            writeln!(
                out,
                "pending: {order_id} from {} (click an end day or cancel)",
                format_day(*start)
            )?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, orders))]
    pub fn print_pool(&self, orders: &[Order]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_pool(&mut out, orders)
    }

    pub fn write_pool<W: Write>(&self, mut out: W, orders: &[Order]) -> anyhow::Result<()> {
        if orders.is_empty() {
            writeln!(out, "No unscheduled orders.")?;
            return Ok(());
        }

        writeln!(out, "Unscheduled ({})", orders.len())?;
        let headers = vec!["ID".to_string(), "Product".to_string(), "Quantity".to_string()];
        let rows = orders
            .iter()
            .map(|order| {
                vec![
                    self.paint(order.id.as_str(), "33"),
                    order.product.clone(),
                    quantity(order.planned_quantity, order.unit.as_deref()),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, orders, today))]
    pub fn print_order_table(&self, orders: &[Order], today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_order_table(&mut out, orders, today)
    }

    pub fn write_order_table<W: Write>(
        &self,
        out: W,
        orders: &[Order],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Status".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Product".to_string(),
        ];

        let rows = orders
            .iter()
            .map(|order| {
                vec![
                    self.paint(order.id.as_str(), "33"),
                    order.status.label().to_string(),
                    optional_day(order.scheduled_start),
                    optional_day(order.effective_end(today)),
                    order.product.clone(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, detail))]
    pub fn print_day_detail(&self, detail: &DayDetail) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_day_detail(&mut out, detail)
    }

    pub fn write_day_detail<W: Write>(&self, mut out: W, detail: &DayDetail) -> anyhow::Result<()> {
        writeln!(out, "{}", detail.day.format("%A %d %B %Y"))?;
        if detail.is_empty() {
            writeln!(out, "No orders on this day.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Status".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Product".to_string(),
        ];
        let rows = detail
            .entries
            .iter()
            .map(|entry| {
                vec![
                    self.paint(entry.order_id.as_str(), "33"),
                    entry.status.label().to_string(),
                    format_day(entry.start),
                    format_day(entry.end),
                    entry.product.clone(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, card))]
    pub fn print_card(&self, card: &OrderCard) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_card(&mut out, card)
    }

    pub fn write_card<W: Write>(&self, mut out: W, card: &OrderCard) -> anyhow::Result<()> {
        writeln!(out, "id          {}", self.paint(card.id.as_str(), "33"))?;
        writeln!(out, "status      {}", card.status.label())?;
        writeln!(out, "product     {}", card.product)?;
        writeln!(
            out,
            "quantity    {}",
            quantity(card.planned_quantity, card.unit.as_deref())
        )?;
        writeln!(out, "start       {}", optional_day(card.start))?;
        writeln!(out, "end         {}", optional_day(card.end))?;

        if let Some(number) = card.related_sale_order_number.as_deref() {
            writeln!(out, "sale order  {number}")?;
        }
        if let Some(priority) = card.sales_priority.as_deref() {
            writeln!(out, "priority    {priority}")?;
        }
        if let Some(day) = card.estimated_sale_date {
            writeln!(out, "sale date   {}", format_day(day))?;
        }
        if let Some(supervisor) = card.supervisor.as_deref() {
            writeln!(out, "supervisor  {supervisor}")?;
        }
        if let Some(rep) = card.sales_rep.as_deref() {
            writeln!(out, "sales rep   {rep}")?;
        }

        Ok(())
    }

    pub fn print_event(&self, event: &BoardEvent) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let text = describe_event(event);
        let line = match event {
            BoardEvent::Rejected(_) => self.paint(&text, "31"),
            BoardEvent::Ignored(_) => self.paint(&text, "2"),
            _ => text,
        };
        writeln!(out, "{line}")?;
        Ok(())
    }

    pub fn print_sync_event(&self, event: &SyncEvent) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let line = match event {
            SyncEvent::PatchConfirmed { order_id } => format!("saved {order_id}"),
            SyncEvent::Reloaded { count } => format!("reloaded {count} orders"),
            SyncEvent::PatchFailed(err) | SyncEvent::ReloadFailed(err) => {
                self.paint(&format!("sync failed: {err}"), "31")
            }
        };
        writeln!(out, "{line}")?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn describe_event(event: &BoardEvent) -> String {
    match event {
        BoardEvent::DragStarted(order_id) => format!("dragging {order_id}"),
        BoardEvent::DragAborted => "drag aborted".to_string(),
        BoardEvent::RangeStarted { order_id, day } => {
            format!("{order_id} placed on {}; pick an end day", format_day(*day))
        }
        BoardEvent::RangeCommitted {
            order_id,
            start,
            end,
        } => format!(
            "{order_id} scheduled {} .. {}",
            format_day(*start),
            format_day(*end)
        ),
        BoardEvent::RangeCancelled { order_id } => {
            format!("range extension of {order_id} cancelled")
        }
        BoardEvent::Unscheduled { order_id } => format!("{order_id} returned to the pool"),
        BoardEvent::DayDetailOpened(day) => format!("showing {}", format_day(*day)),
        BoardEvent::Rejected(err) => format!("rejected: {err}"),
        BoardEvent::Ignored(reason) => format!("ignored: {reason}"),
    }
}

fn optional_day(day: Option<NaiveDate>) -> String {
    day.map(format_day).unwrap_or_else(|| "-".to_string())
}

fn quantity(amount: Option<f64>, unit: Option<&str>) -> String {
    match (amount, unit) {
        (Some(amount), Some(unit)) => format!("{amount} {unit}"),
        (Some(amount), None) => amount.to_string(),
        (None, _) => "-".to_string(),
    }
}

fn pad_visible(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(strip_ansi(text).as_str());
    format!("{text}{}", " ".repeat(width.saturating_sub(visible)))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ", width = *width)?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            write!(writer, "{} ", pad_visible(cell, *width))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Renderer, describe_event, strip_ansi, write_table};
    use crate::board::BoardEvent;
    use crate::calendar::build_month_grid;
    use crate::datetime::MonthRef;
    use crate::error::ScheduleError;
    use crate::order::{Order, OrderId, OrderStatus};
    use crate::range::RangeState;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
    }

    #[test]
    fn month_marks_the_pending_order() {
        let mut order = Order::new("O1", OrderStatus::AwaitingAssignment, "frames");
        order.scheduled_start = Some(day(10));
        order.scheduled_end = Some(day(10));
        let month = MonthRef::new(2025, 3).expect("valid month");
        let grid = build_month_grid(month, &[order], day(1));
        let pending = RangeState::AwaitingEnd {
            order_id: OrderId::from("O1"),
            start: day(10),
        };

        let mut buf = Vec::new();
        Renderer::plain()
            .write_month(&mut buf, &grid, &pending, day(1))
            .expect("render month");
        let text = String::from_utf8(buf).expect("utf8 output");

        assert!(text.starts_with("March 2025\n"));
        assert!(text.contains("10 (1)*"));
        assert!(text.contains("pending: O1 from 2025-03-10"));
        // header plus six weeks plus the pending line
        assert_eq!(text.lines().count(), 9);
    }

    #[test]
    fn tables_align_on_visible_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".to_string(), "Product".to_string()],
            vec![
                vec!["\x1b[33mO1\x1b[0m".to_string(), "frames".to_string()],
                vec!["O100".to_string(), "panels".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(buf).expect("utf8 output");
        let lines: Vec<String> = text.lines().map(strip_ansi).collect();
        assert_eq!(lines[0], "ID   Product ");
        assert_eq!(lines[2], "O1   frames  ");
        assert_eq!(lines[3], "O100 panels  ");
    }

    #[test]
    fn events_read_as_sentences() {
        let rejected = BoardEvent::Rejected(ScheduleError::InvalidRange {
            start: day(10),
            end: day(9),
        });
        assert_eq!(
            describe_event(&rejected),
            "rejected: end day 2025-03-09 is before start day 2025-03-10"
        );
        assert_eq!(
            describe_event(&BoardEvent::RangeCommitted {
                order_id: OrderId::from("O1"),
                start: day(10),
                end: day(13),
            }),
            "O1 scheduled 2025-03-10 .. 2025-03-13"
        );
    }
}
