//! Error types of the scheduling engine.

use chrono::NaiveDate;
use thiserror::Error;

use crate::order::OrderId;

/// Failures reported by an order store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("order not found: {0}")]
    NotFound(OrderId),

    #[error("order store unavailable: {0}")]
    Unavailable(String),

    #[error("order service error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not decode order payload: {0}")]
    Decode(String),

    #[error("order store backend failed: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(err: anyhow::Error) -> Self {
        StoreError::Backend(format!("{err:#}"))
    }
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("end day {end} is before start day {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("unknown order: {0}")]
    UnknownOrder(OrderId),

    #[error("update of order {order_id} failed: {source}")]
    RemoteUpdate {
        order_id: OrderId,
        #[source]
        source: StoreError,
    },

    #[error("fetching orders failed: {0}")]
    RemoteFetch(#[source] StoreError),
}
