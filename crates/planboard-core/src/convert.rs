//! Mapping between domain types and the wire DTOs of `planboard_shared`.

use std::collections::BTreeMap;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use planboard_shared::{OrderDto, OrderPatch, OrderStatus as WireStatus, OrdersListArgs};

use crate::order::{Order, OrderStatus, SchedulePatch};
use crate::store::OrderFilter;

const WIRE_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn status_to_wire(status: OrderStatus) -> WireStatus {
    match status {
        OrderStatus::AwaitingAssignment => WireStatus::AwaitingAssignment,
        OrderStatus::InProgress => WireStatus::InProgress,
        OrderStatus::Paused => WireStatus::Paused,
        OrderStatus::Finished => WireStatus::Finished,
        OrderStatus::Cancelled => WireStatus::Cancelled,
    }
}

pub fn status_from_wire(status: WireStatus) -> OrderStatus {
    match status {
        WireStatus::AwaitingAssignment => OrderStatus::AwaitingAssignment,
        WireStatus::InProgress => OrderStatus::InProgress,
        WireStatus::Paused => OrderStatus::Paused,
        WireStatus::Finished => OrderStatus::Finished,
        WireStatus::Cancelled => OrderStatus::Cancelled,
    }
}

pub fn format_wire_date(day: NaiveDate) -> String {
    day.format(WIRE_DATE_FORMAT).to_string()
}

pub fn parse_wire_date(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), WIRE_DATE_FORMAT)
        .with_context(|| format!("invalid wire date: {raw:?}"))
}

fn parse_optional_date(raw: Option<&str>) -> anyhow::Result<Option<NaiveDate>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_wire_date(value).map(Some),
    }
}

pub fn order_to_dto(order: &Order) -> OrderDto {
    OrderDto {
        id: order.id.to_string(),
        status: status_to_wire(order.status),
        scheduled_start: order.scheduled_start.map(format_wire_date),
        scheduled_end: order.scheduled_end.map(format_wire_date),
        product: order.product.clone(),
        planned_quantity: order.planned_quantity,
        unit: order.unit.clone(),
        related_sale_order_number: order.related_sale_order_number.clone(),
        sales_priority: order.sales_priority.clone(),
        estimated_sale_date: order.estimated_sale_date.map(format_wire_date),
        supervisor: order.supervisor.clone(),
        sales_rep: order.sales_rep.clone(),
    }
}

pub fn order_from_dto(dto: OrderDto) -> anyhow::Result<Order> {
    if dto.id.trim().is_empty() {
        return Err(anyhow!("order without id"));
    }

    let scheduled_start = parse_optional_date(dto.scheduled_start.as_deref())
        .with_context(|| format!("order {} scheduled_start", dto.id))?;
    let scheduled_end = parse_optional_date(dto.scheduled_end.as_deref())
        .with_context(|| format!("order {} scheduled_end", dto.id))?;
    let estimated_sale_date = parse_optional_date(dto.estimated_sale_date.as_deref())
        .with_context(|| format!("order {} estimated_sale_date", dto.id))?;

    Ok(Order {
        id: dto.id.into(),
        status: status_from_wire(dto.status),
        scheduled_start,
        scheduled_end,
        product: dto.product,
        planned_quantity: dto.planned_quantity,
        unit: dto.unit,
        related_sale_order_number: dto.related_sale_order_number,
        sales_priority: dto.sales_priority,
        estimated_sale_date,
        supervisor: dto.supervisor,
        sales_rep: dto.sales_rep,
        extra: BTreeMap::new(),
    })
}

pub fn patch_to_wire(patch: &SchedulePatch) -> OrderPatch {
    OrderPatch {
        scheduled_start: patch.scheduled_start.map(|day| day.map(format_wire_date)),
        scheduled_end: patch.scheduled_end.map(|day| day.map(format_wire_date)),
    }
}

pub fn patch_from_wire(patch: &OrderPatch) -> anyhow::Result<SchedulePatch> {
    let convert = |field: &Option<Option<String>>| -> anyhow::Result<Option<Option<NaiveDate>>> {
        match field {
            None => Ok(None),
            Some(None) => Ok(Some(None)),
            Some(Some(raw)) => parse_wire_date(raw).map(|day| Some(Some(day))),
        }
    };

    Ok(SchedulePatch {
        scheduled_start: convert(&patch.scheduled_start).context("scheduled_start")?,
        scheduled_end: convert(&patch.scheduled_end).context("scheduled_end")?,
    })
}

pub fn filter_to_wire(filter: &OrderFilter) -> OrdersListArgs {
    OrdersListArgs {
        status: filter.status.map(status_to_wire),
        query: filter.query.clone(),
    }
}
