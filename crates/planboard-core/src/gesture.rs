//! Translation of raw pointer gestures into scheduling intents.
//!
//! Drag-and-drop and the click sequence both end up as the same
//! [`Intent`] values, which are then fed to [`crate::range::reduce`].

use std::fmt;

use chrono::NaiveDate;
use tracing::debug;

use crate::order::{Order, OrderId, find_order};
use crate::range::RangeState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gesture {
    DragStart(OrderId),
    /// The drag ended without a drop target.
    DragEnd,
    /// Drop on a grid cell; filler cells carry no date.
    Drop(Option<NaiveDate>),
    Click(Option<NaiveDate>),
    Cancel,
    Unschedule(OrderId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    BeginRange { order_id: OrderId, day: NaiveDate },
    EndRange { day: NaiveDate },
    Cancel,
    Unschedule { order_id: OrderId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Restricted,
    UnknownOrder,
    NotAssignable,
    PendingRange,
    NoDragSession,
    FillerCell,
    NothingPending,
    NotScheduled,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IgnoreReason::Restricted => "your role may not change the schedule",
            IgnoreReason::UnknownOrder => "order is not on the board",
            IgnoreReason::NotAssignable => "order is not awaiting assignment",
            IgnoreReason::PendingRange => "another range is waiting for its end date",
            IgnoreReason::NoDragSession => "nothing is being dragged",
            IgnoreReason::FillerCell => "cell is outside the displayed month",
            IgnoreReason::NothingPending => "no range is waiting for an end date",
            IgnoreReason::NotScheduled => "order has no scheduled date",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureOutcome {
    DragStarted(OrderId),
    DragAborted,
    Intent(Intent),
    OpenDayDetail(NaiveDate),
    Ignored(IgnoreReason),
}

pub struct GestureContext<'a> {
    pub can_schedule: bool,
    pub range: &'a RangeState,
    pub orders: &'a [Order],
}

/// Holds the order currently being dragged, if any.
#[derive(Debug, Default, Clone)]
pub struct GestureController {
    dragging: Option<OrderId>,
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dragging(&self) -> Option<&OrderId> {
        self.dragging.as_ref()
    }

    pub fn interpret(&mut self, gesture: Gesture, ctx: &GestureContext<'_>) -> GestureOutcome {
        let outcome = match gesture {
            Gesture::DragStart(order_id) => self.drag_start(order_id, ctx),
            Gesture::DragEnd => {
                if self.dragging.take().is_some() {
                    GestureOutcome::DragAborted
                } else {
                    GestureOutcome::Ignored(IgnoreReason::NoDragSession)
                }
            }
            Gesture::Drop(cell) => self.drop_on(cell, ctx),
            Gesture::Click(None) => GestureOutcome::Ignored(IgnoreReason::FillerCell),
            Gesture::Click(Some(day)) => match ctx.range {
                RangeState::AwaitingEnd { .. } => GestureOutcome::Intent(Intent::EndRange { day }),
                RangeState::Idle => GestureOutcome::OpenDayDetail(day),
            },
            Gesture::Cancel => match ctx.range {
                RangeState::AwaitingEnd { .. } => GestureOutcome::Intent(Intent::Cancel),
                RangeState::Idle => GestureOutcome::Ignored(IgnoreReason::NothingPending),
            },
            Gesture::Unschedule(order_id) => {
                if ctx.can_schedule {
                    GestureOutcome::Intent(Intent::Unschedule { order_id })
                } else {
                    GestureOutcome::Ignored(IgnoreReason::Restricted)
                }
            }
        };

        debug!(?outcome, dragging = ?self.dragging, "interpreted gesture");
        outcome
    }

    fn drag_start(&mut self, order_id: OrderId, ctx: &GestureContext<'_>) -> GestureOutcome {
        if !ctx.can_schedule {
            return GestureOutcome::Ignored(IgnoreReason::Restricted);
        }
        if !ctx.range.is_idle() {
            return GestureOutcome::Ignored(IgnoreReason::PendingRange);
        }

        let Some(order) = find_order(ctx.orders, &order_id) else {
            return GestureOutcome::Ignored(IgnoreReason::UnknownOrder);
        };
        if !order.is_draggable() {
            return GestureOutcome::Ignored(IgnoreReason::NotAssignable);
        }

        self.dragging = Some(order_id.clone());
        GestureOutcome::DragStarted(order_id)
    }

    fn drop_on(&mut self, cell: Option<NaiveDate>, ctx: &GestureContext<'_>) -> GestureOutcome {
        let Some(order_id) = self.dragging.take() else {
            return GestureOutcome::Ignored(IgnoreReason::NoDragSession);
        };
        let Some(day) = cell else {
            return GestureOutcome::Ignored(IgnoreReason::FillerCell);
        };
        if !ctx.range.is_idle() {
            return GestureOutcome::Ignored(IgnoreReason::PendingRange);
        }

        GestureOutcome::Intent(Intent::BeginRange { order_id, day })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Gesture, GestureContext, GestureController, GestureOutcome, IgnoreReason, Intent};
    use crate::order::{Order, OrderId, OrderStatus};
    use crate::range::RangeState;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
    }

    fn orders() -> Vec<Order> {
        vec![
            Order::new("O1", OrderStatus::AwaitingAssignment, "frames"),
            Order::new("O2", OrderStatus::InProgress, "panels"),
        ]
    }

    #[test]
    fn drag_and_drop_emits_begin_range() {
        let orders = orders();
        let idle = RangeState::Idle;
        let ctx = GestureContext {
            can_schedule: true,
            range: &idle,
            orders: &orders,
        };
        let mut controller = GestureController::new();

        assert_eq!(
            controller.interpret(Gesture::DragStart(OrderId::from("O1")), &ctx),
            GestureOutcome::DragStarted(OrderId::from("O1"))
        );
        assert_eq!(
            controller.interpret(Gesture::Drop(Some(day(10))), &ctx),
            GestureOutcome::Intent(Intent::BeginRange {
                order_id: OrderId::from("O1"),
                day: day(10),
            })
        );
        assert!(controller.dragging().is_none());
    }

    #[test]
    fn restricted_roles_never_start_a_drag() {
        let orders = orders();
        let idle = RangeState::Idle;
        let ctx = GestureContext {
            can_schedule: false,
            range: &idle,
            orders: &orders,
        };
        let mut controller = GestureController::new();

        assert_eq!(
            controller.interpret(Gesture::DragStart(OrderId::from("O1")), &ctx),
            GestureOutcome::Ignored(IgnoreReason::Restricted)
        );
        assert_eq!(
            controller.interpret(Gesture::Drop(Some(day(10))), &ctx),
            GestureOutcome::Ignored(IgnoreReason::NoDragSession)
        );
        assert_eq!(
            controller.interpret(Gesture::Unschedule(OrderId::from("O1")), &ctx),
            GestureOutcome::Ignored(IgnoreReason::Restricted)
        );
    }

    #[test]
    fn only_awaiting_orders_can_be_dragged() {
        let orders = orders();
        let idle = RangeState::Idle;
        let ctx = GestureContext {
            can_schedule: true,
            range: &idle,
            orders: &orders,
        };
        let mut controller = GestureController::new();

        assert_eq!(
            controller.interpret(Gesture::DragStart(OrderId::from("O2")), &ctx),
            GestureOutcome::Ignored(IgnoreReason::NotAssignable)
        );
        assert_eq!(
            controller.interpret(Gesture::DragStart(OrderId::from("missing")), &ctx),
            GestureOutcome::Ignored(IgnoreReason::UnknownOrder)
        );
    }

    #[test]
    fn dropping_on_filler_abandons_the_drag() {
        let orders = orders();
        let idle = RangeState::Idle;
        let ctx = GestureContext {
            can_schedule: true,
            range: &idle,
            orders: &orders,
        };
        let mut controller = GestureController::new();

        controller.interpret(Gesture::DragStart(OrderId::from("O1")), &ctx);
        assert_eq!(
            controller.interpret(Gesture::Drop(None), &ctx),
            GestureOutcome::Ignored(IgnoreReason::FillerCell)
        );
        assert!(controller.dragging().is_none());
    }

    #[test]
    fn clicks_depend_on_the_pending_range() {
        let orders = orders();
        let mut controller = GestureController::new();

        let idle = RangeState::Idle;
        let ctx = GestureContext {
            can_schedule: true,
            range: &idle,
            orders: &orders,
        };
        assert_eq!(
            controller.interpret(Gesture::Click(Some(day(8))), &ctx),
            GestureOutcome::OpenDayDetail(day(8))
        );
        assert_eq!(
            controller.interpret(Gesture::Cancel, &ctx),
            GestureOutcome::Ignored(IgnoreReason::NothingPending)
        );

        let pending = RangeState::AwaitingEnd {
            order_id: OrderId::from("O1"),
            start: day(10),
        };
        let ctx = GestureContext {
            can_schedule: true,
            range: &pending,
            orders: &orders,
        };
        assert_eq!(
            controller.interpret(Gesture::Click(Some(day(13))), &ctx),
            GestureOutcome::Intent(Intent::EndRange { day: day(13) })
        );
        assert_eq!(
            controller.interpret(Gesture::DragStart(OrderId::from("O1")), &ctx),
            GestureOutcome::Ignored(IgnoreReason::PendingRange)
        );
    }
}
