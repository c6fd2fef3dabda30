use serde::{
  Deserialize,
  Deserializer,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  AwaitingAssignment,
  InProgress,
  Paused,
  Finished,
  Cancelled
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct OrderDto {
  pub id:                         String,
  pub status:                     OrderStatus,
  #[serde(default)]
  pub scheduled_start:            Option<String>,
  #[serde(default)]
  pub scheduled_end:              Option<String>,
  #[serde(default)]
  pub product:                    String,
  #[serde(default)]
  pub planned_quantity:           Option<f64>,
  #[serde(default)]
  pub unit:                       Option<String>,
  #[serde(default)]
  pub related_sale_order_number:  Option<String>,
  #[serde(default)]
  pub sales_priority:             Option<String>,
  #[serde(default)]
  pub estimated_sale_date:        Option<String>,
  #[serde(default)]
  pub supervisor:                 Option<String>,
  #[serde(default)]
  pub sales_rep:                  Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct OrdersListArgs {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub status: Option<OrderStatus>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub query:  Option<String>
}

/// Partial schedule update. An absent field is left untouched by the
/// receiver, an explicit `null` clears it.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct OrderPatch {
  #[serde(
    default,
    deserialize_with = "present",
    skip_serializing_if = "Option::is_none"
  )]
  pub scheduled_start:
    Option<Option<String>>,
  #[serde(
    default,
    deserialize_with = "present",
    skip_serializing_if = "Option::is_none"
  )]
  pub scheduled_end:
    Option<Option<String>>
}

impl OrderPatch {
  pub fn is_empty(&self) -> bool {
    self.scheduled_start.is_none()
      && self.scheduled_end.is_none()
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct OrderUpdateArgs {
  pub id:    String,
  pub patch: OrderPatch
}

// Any value that reaches the deserializer was present on the wire,
// including `null`.
fn present<'de, D, T>(
  deserializer: D
) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>
{
  Option::<T>::deserialize(deserializer)
    .map(Some)
}

#[cfg(test)]
mod tests {
  use super::{
    OrderPatch,
    OrderStatus,
    OrdersListArgs
  };

  #[test]
  fn patch_keeps_absent_and_null_apart()
  {
    let patch: OrderPatch =
      serde_json::from_str(
        r#"{"scheduled_start":null}"#
      )
      .expect("parse patch");
    assert_eq!(
      patch.scheduled_start,
      Some(None)
    );
    assert_eq!(
      patch.scheduled_end,
      None
    );
  }

  #[test]
  fn patch_serializes_only_present_fields()
  {
    let patch = OrderPatch {
      scheduled_start: None,
      scheduled_end:   Some(Some(
        "2025-03-13".to_string()
      ))
    };
    let json = serde_json::to_string(
      &patch
    )
    .expect("serialize patch");
    assert_eq!(
      json,
      r#"{"scheduled_end":"2025-03-13"}"#
    );

    let cleared = OrderPatch {
      scheduled_start: Some(None),
      scheduled_end:   Some(None)
    };
    let json = serde_json::to_string(
      &cleared
    )
    .expect("serialize clear");
    assert_eq!(
      json,
      r#"{"scheduled_start":null,"scheduled_end":null}"#
    );
  }

  #[test]
  fn status_uses_snake_case() {
    let json = serde_json::to_string(
      &OrderStatus::AwaitingAssignment
    )
    .expect("serialize status");
    assert_eq!(
      json,
      r#""awaiting_assignment""#
    );

    let args = OrdersListArgs::default();
    assert_eq!(
      serde_json::to_string(&args)
        .expect("serialize args"),
      "{}"
    );
  }
}
