//! The mountable month board.
//!
//! A [`Board`] owns one scheduling session: the drag in progress, the
//! pending range slot and the open day detail all live here, so two boards
//! never share interaction state.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::calendar::{MonthGrid, build_month_grid};
use crate::capability::Viewer;
use crate::datetime::MonthRef;
use crate::detail::{DayDetail, build_day_detail};
use crate::error::ScheduleError;
use crate::gesture::{
    Gesture, GestureContext, GestureController, GestureOutcome, IgnoreReason, Intent,
};
use crate::optimistic::{OptimisticPolicy, SyncEvent};
use crate::order::{Order, OrderId, OrderStatus, unscheduled_pool};
use crate::range::{Effect, RangeState, reduce};
use crate::store::{OrderFilter, OrderStore};

/// What a gesture did to the board.
#[derive(Debug)]
pub enum BoardEvent {
    DragStarted(OrderId),
    DragAborted,
    RangeStarted {
        order_id: OrderId,
        day: NaiveDate,
    },
    RangeCommitted {
        order_id: OrderId,
        start: NaiveDate,
        end: NaiveDate,
    },
    RangeCancelled {
        order_id: OrderId,
    },
    Unscheduled {
        order_id: OrderId,
    },
    DayDetailOpened(NaiveDate),
    Rejected(ScheduleError),
    Ignored(IgnoreReason),
}

/// Descriptive fields shown on an order's card.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCard {
    pub id: OrderId,
    pub status: OrderStatus,
    pub product: String,
    pub planned_quantity: Option<f64>,
    pub unit: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub related_sale_order_number: Option<String>,
    pub sales_priority: Option<String>,
    pub estimated_sale_date: Option<NaiveDate>,
    pub supervisor: Option<String>,
    pub sales_rep: Option<String>,
}

impl OrderCard {
    pub fn from_order(order: &Order, today: NaiveDate) -> Self {
        Self {
            id: order.id.clone(),
            status: order.status,
            product: order.product.clone(),
            planned_quantity: order.planned_quantity,
            unit: order.unit.clone(),
            start: order.scheduled_start,
            end: order.effective_end(today),
            related_sale_order_number: order.related_sale_order_number.clone(),
            sales_priority: order.sales_priority.clone(),
            estimated_sale_date: order.estimated_sale_date,
            supervisor: order.supervisor.clone(),
            sales_rep: order.sales_rep.clone(),
        }
    }
}

/// Host hook that opens an order's full detail view.
pub trait OrderNavigator {
    fn open_order(&self, card: &OrderCard);
}

pub struct Board<S: OrderStore + 'static> {
    viewer: Viewer,
    month: MonthRef,
    today: NaiveDate,
    controller: GestureController,
    range: RangeState,
    detail_day: Option<NaiveDate>,
    policy: OptimisticPolicy<S>,
}

impl<S: OrderStore + 'static> Board<S> {
    pub async fn mount(store: Arc<S>, viewer: Viewer, month: MonthRef, today: NaiveDate) -> Self {
        Self::mount_filtered(store, OrderFilter::all(), viewer, month, today).await
    }

    /// Mounts a board and performs the initial load. Background patches run
    /// on the runtime that awaits this call.
    pub async fn mount_filtered(
        store: Arc<S>,
        filter: OrderFilter,
        viewer: Viewer,
        month: MonthRef,
        today: NaiveDate,
    ) -> Self {
        let policy = OptimisticPolicy::new(store, filter, Handle::current());
        match policy.reload().await {
            Ok(count) => info!(count, %month, role = %viewer.role, "board mounted"),
            Err(err) => {
                warn!(error = %err, %month, "initial order fetch failed; board starts empty");
                policy.report(SyncEvent::ReloadFailed(err));
            }
        }

        Self {
            viewer,
            month,
            today,
            controller: GestureController::new(),
            range: RangeState::Idle,
            detail_day: None,
            policy,
        }
    }

    pub fn handle(&mut self, gesture: Gesture) -> BoardEvent {
        let can_schedule = self.viewer.can_schedule();
        let range = &self.range;
        let controller = &mut self.controller;
        let outcome = self.policy.cache().with(|orders| {
            controller.interpret(
                gesture,
                &GestureContext {
                    can_schedule,
                    range,
                    orders,
                },
            )
        });

        match outcome {
            GestureOutcome::DragStarted(order_id) => BoardEvent::DragStarted(order_id),
            GestureOutcome::DragAborted => BoardEvent::DragAborted,
            GestureOutcome::OpenDayDetail(day) => {
                self.detail_day = Some(day);
                BoardEvent::DayDetailOpened(day)
            }
            GestureOutcome::Ignored(reason) => BoardEvent::Ignored(reason),
            GestureOutcome::Intent(intent) => self.dispatch(intent),
        }
    }

    fn dispatch(&mut self, intent: Intent) -> BoardEvent {
        if !self.viewer.can_schedule() {
            info!(role = %self.viewer.role, ?intent, "intent refused for restricted role");
            return BoardEvent::Ignored(IgnoreReason::Restricted);
        }

        let previous = self.range.clone();
        let transition = self
            .policy
            .cache()
            .with(|orders| reduce(&previous, intent.clone(), orders));

        // A background reload can drop the order between the reducer's read
        // and the local patch; the state machine then stays where it was.
        if let Effect::Patch { order_id, patch } = &transition.effect
            && !self.policy.apply(order_id.clone(), patch.clone())
        {
            warn!(order_id = %order_id, "order left the cache before the patch applied");
            return BoardEvent::Ignored(IgnoreReason::UnknownOrder);
        }
        self.range = transition.next;

        match (intent, transition.effect) {
            (_, Effect::Reject(err)) => {
                info!(error = %err, "gesture rejected");
                BoardEvent::Rejected(err)
            }
            (_, Effect::Ignore(reason)) => BoardEvent::Ignored(reason),
            (_, Effect::Nothing) => match previous {
                RangeState::AwaitingEnd { order_id, .. } => {
                    info!(order_id = %order_id, "pending range cancelled");
                    BoardEvent::RangeCancelled { order_id }
                }
                RangeState::Idle => BoardEvent::Ignored(IgnoreReason::NothingPending),
            },
            (Intent::BeginRange { day, .. }, Effect::Patch { order_id, .. }) => {
                info!(order_id = %order_id, day = %day, "range started");
                BoardEvent::RangeStarted { order_id, day }
            }
            (Intent::EndRange { day }, Effect::Patch { order_id, .. }) => {
                let start = previous.pending_start().unwrap_or(day);
                info!(order_id = %order_id, start = %start, end = %day, "range committed");
                BoardEvent::RangeCommitted {
                    order_id,
                    start,
                    end: day,
                }
            }
            (_, Effect::Patch { order_id, .. }) => {
                info!(order_id = %order_id, "order unscheduled");
                BoardEvent::Unscheduled { order_id }
            }
        }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn month(&self) -> MonthRef {
        self.month
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn range_state(&self) -> &RangeState {
        &self.range
    }

    pub fn dragging(&self) -> Option<&OrderId> {
        self.controller.dragging()
    }

    pub fn grid(&self) -> MonthGrid {
        self.policy
            .cache()
            .with(|orders| build_month_grid(self.month, orders, self.today))
    }

    pub fn pool(&self) -> Vec<Order> {
        self.policy
            .cache()
            .with(|orders| unscheduled_pool(orders).into_iter().cloned().collect())
    }

    /// The open day detail, rebuilt from the current cache so it follows
    /// reloads.
    pub fn day_detail(&self) -> Option<DayDetail> {
        let day = self.detail_day?;
        Some(
            self.policy
                .cache()
                .with(|orders| build_day_detail(day, orders, self.today)),
        )
    }

    /// Returns `false` when no detail was open.
    pub fn close_day_detail(&mut self) -> bool {
        self.detail_day.take().is_some()
    }

    pub fn next_month(&mut self) -> MonthRef {
        self.show_month(self.month.shift(1))
    }

    pub fn previous_month(&mut self) -> MonthRef {
        self.show_month(self.month.shift(-1))
    }

    /// Switches the displayed month. A pending range survives navigation so
    /// its end can be picked in another month.
    pub fn show_month(&mut self, month: MonthRef) -> MonthRef {
        self.month = month;
        self.detail_day = None;
        month
    }

    pub fn orders(&self) -> Vec<Order> {
        self.policy.cache().snapshot()
    }

    pub fn order(&self, id: &OrderId) -> Option<Order> {
        self.policy.cache().get(id)
    }

    pub fn card(&self, id: &OrderId) -> Option<OrderCard> {
        self.order(id)
            .map(|order| OrderCard::from_order(&order, self.today))
    }

    /// Hands the order's card to the host navigation hook. Open to every
    /// role.
    pub fn open_order(
        &self,
        id: &OrderId,
        navigator: &dyn OrderNavigator,
    ) -> Result<(), ScheduleError> {
        let card = self
            .card(id)
            .ok_or_else(|| ScheduleError::UnknownOrder(id.clone()))?;
        navigator.open_order(&card);
        Ok(())
    }

    pub async fn refresh(&self) -> Result<usize, ScheduleError> {
        self.policy.reload().await
    }

    pub fn in_flight(&self) -> usize {
        self.policy.in_flight()
    }

    pub async fn settle(&mut self) {
        self.policy.settle().await;
    }

    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        self.policy.drain_events()
    }
}
