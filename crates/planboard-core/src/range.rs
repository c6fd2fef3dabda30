//! Two-step range assignment.
//!
//! `BeginRange` places the order on a single day right away and opens the
//! pending slot; `EndRange` stretches it to the chosen end day. There is one
//! pending slot per board, never one per order.

use chrono::NaiveDate;

use crate::error::ScheduleError;
use crate::gesture::{IgnoreReason, Intent};
use crate::order::{Order, OrderId, SchedulePatch, find_order};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RangeState {
    #[default]
    Idle,
    AwaitingEnd {
        order_id: OrderId,
        start: NaiveDate,
    },
}

impl RangeState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RangeState::Idle)
    }

    pub fn pending_order(&self) -> Option<&OrderId> {
        match self {
            RangeState::Idle => None,
            RangeState::AwaitingEnd { order_id, .. } => Some(order_id),
        }
    }

    pub fn pending_start(&self) -> Option<NaiveDate> {
        match self {
            RangeState::Idle => None,
            RangeState::AwaitingEnd { start, .. } => Some(*start),
        }
    }
}

#[derive(Debug)]
pub enum Effect {
    Patch {
        order_id: OrderId,
        patch: SchedulePatch,
    },
    Reject(ScheduleError),
    Ignore(IgnoreReason),
    Nothing,
}

#[derive(Debug)]
pub struct Transition {
    pub next: RangeState,
    pub effect: Effect,
}

impl Transition {
    fn stay(state: &RangeState, effect: Effect) -> Self {
        Self {
            next: state.clone(),
            effect,
        }
    }
}

/// Pure transition function of the range state machine.
///
/// Role checks happen before an intent gets here; order status checks and
/// the chronological check happen here.
pub fn reduce(state: &RangeState, intent: Intent, orders: &[Order]) -> Transition {
    match (state, intent) {
        (RangeState::Idle, Intent::BeginRange { order_id, day }) => {
            let Some(order) = find_order(orders, &order_id) else {
                return Transition::stay(state, Effect::Ignore(IgnoreReason::UnknownOrder));
            };
            if !order.is_draggable() {
                return Transition::stay(state, Effect::Ignore(IgnoreReason::NotAssignable));
            }

            Transition {
                next: RangeState::AwaitingEnd {
                    order_id: order_id.clone(),
                    start: day,
                },
                effect: Effect::Patch {
                    order_id,
                    patch: SchedulePatch::single_day(day),
                },
            }
        }
        (RangeState::AwaitingEnd { .. }, Intent::BeginRange { .. }) => {
            Transition::stay(state, Effect::Ignore(IgnoreReason::PendingRange))
        }

        (RangeState::AwaitingEnd { order_id, start }, Intent::EndRange { day }) => {
            if day < *start {
                return Transition::stay(
                    state,
                    Effect::Reject(ScheduleError::InvalidRange {
                        start: *start,
                        end: day,
                    }),
                );
            }
            let Some(order) = find_order(orders, order_id) else {
                return Transition {
                    next: RangeState::Idle,
                    effect: Effect::Ignore(IgnoreReason::UnknownOrder),
                };
            };
            // A reload may have moved the order on while the end was pending.
            if !order.is_draggable() {
                return Transition {
                    next: RangeState::Idle,
                    effect: Effect::Ignore(IgnoreReason::NotAssignable),
                };
            }

            Transition {
                next: RangeState::Idle,
                effect: Effect::Patch {
                    order_id: order_id.clone(),
                    patch: SchedulePatch::extend_to(*start, day),
                },
            }
        }
        (RangeState::Idle, Intent::EndRange { .. }) | (RangeState::Idle, Intent::Cancel) => {
            Transition::stay(state, Effect::Ignore(IgnoreReason::NothingPending))
        }

        // The single-day placement made on BeginRange stays in place.
        (RangeState::AwaitingEnd { .. }, Intent::Cancel) => Transition {
            next: RangeState::Idle,
            effect: Effect::Nothing,
        },

        (_, Intent::Unschedule { order_id }) => {
            let Some(order) = find_order(orders, &order_id) else {
                return Transition::stay(state, Effect::Ignore(IgnoreReason::UnknownOrder));
            };
            if !order.is_draggable() {
                return Transition::stay(state, Effect::Ignore(IgnoreReason::NotAssignable));
            }
            if !order.is_scheduled() {
                return Transition::stay(state, Effect::Ignore(IgnoreReason::NotScheduled));
            }

            let next = if state.pending_order() == Some(&order_id) {
                RangeState::Idle
            } else {
                state.clone()
            };
            Transition {
                next,
                effect: Effect::Patch {
                    order_id,
                    patch: SchedulePatch::clear(),
                },
            }
        }
    }
}
