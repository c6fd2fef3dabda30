use std::time::Duration;

use async_trait::async_trait;
use planboard_shared::OrderDto;
use reqwest::{Client, Method, StatusCode, Url, header};
use tracing::{debug, instrument, warn};

use super::{OrderFilter, OrderStore};
use crate::convert::{filter_to_wire, order_from_dto, patch_to_wire};
use crate::error::StoreError;
use crate::order::{Order, OrderId, SchedulePatch};

/// Client for a REST order service:
/// `GET {base}/orders` and `PATCH {base}/orders/{id}`.
#[derive(Debug, Clone)]
pub struct HttpOrderStore {
    base_url: Url,
    client: Client,
}

impl HttpOrderStore {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let normalized = format!("{}/", base_url.trim().trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|err| anyhow::anyhow!("invalid order service url {base_url:?}: {err}"))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    pub fn orders_url(&self, filter: &OrderFilter) -> Result<Url, StoreError> {
        let mut url = self.join("orders")?;
        let args = filter_to_wire(filter);
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(status) = args.status {
                let wire = serde_json::to_value(status)
                    .map_err(|err| StoreError::Decode(err.to_string()))?;
                if let Some(value) = wire.as_str() {
                    pairs.append_pair("status", value);
                }
            }
            if let Some(query) = args.query.as_deref() {
                pairs.append_pair("q", query);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    pub fn order_url(&self, id: &OrderId) -> Result<Url, StoreError> {
        let mut url = self.join("orders")?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Decode(format!("cannot extend url {}", self.base_url)))?
            .push(id.as_str());
        Ok(url)
    }

    fn join(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|err| StoreError::Decode(format!("invalid url path {path}: {err}")))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> Result<String, StoreError> {
        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, %url, status = status.as_u16(), "order service responded");
        check_status(status, text)
    }
}

/// Passes a 2xx body through and turns anything else into
/// [`StoreError::Server`].
fn check_status(status: StatusCode, body: String) -> Result<String, StoreError> {
    if status.is_success() {
        return Ok(body);
    }

    warn!(status = status.as_u16(), "order service returned an error");
    Err(StoreError::Server {
        status: status.as_u16(),
        body,
    })
}

fn decode_orders(body: &str) -> Result<Vec<Order>, StoreError> {
    let dtos: Vec<OrderDto> =
        serde_json::from_str(body).map_err(|err| StoreError::Decode(err.to_string()))?;
    dtos.into_iter()
        .map(|dto| order_from_dto(dto).map_err(|err| StoreError::Decode(format!("{err:#}"))))
        .collect()
}

fn update_outcome(id: &OrderId, sent: Result<String, StoreError>) -> Result<(), StoreError> {
    match sent {
        Ok(_) => Ok(()),
        Err(StoreError::Server { status: 404, .. }) => Err(StoreError::NotFound(id.clone())),
        Err(err) => Err(err),
    }
}

#[async_trait]
impl OrderStore for HttpOrderStore {
    #[instrument(skip(self))]
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let url = self.orders_url(filter)?;
        let body = self.send(Method::GET, url, None).await?;
        decode_orders(&body)
    }

    #[instrument(skip(self, patch), fields(order_id = %id))]
    async fn update_order(&self, id: &OrderId, patch: &SchedulePatch) -> Result<(), StoreError> {
        let url = self.order_url(id)?;
        let body = serde_json::to_string(&patch_to_wire(patch))
            .map_err(|err| StoreError::Decode(err.to_string()))?;

        update_outcome(id, self.send(Method::PATCH, url, Some(body)).await)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;

    use super::{HttpOrderStore, check_status, decode_orders, update_outcome};
    use crate::error::StoreError;
    use crate::order::{OrderId, OrderStatus};
    use crate::store::OrderFilter;

    fn store() -> HttpOrderStore {
        HttpOrderStore::new("http://orders.local/api/", Duration::from_secs(5))
            .expect("build http store")
    }

    #[test]
    fn list_url_carries_the_filter() {
        let url = store()
            .orders_url(&OrderFilter {
                status: Some(OrderStatus::AwaitingAssignment),
                query: Some("steel frame".to_string()),
            })
            .expect("build url");
        assert_eq!(
            url.as_str(),
            "http://orders.local/api/orders?status=awaiting_assignment&q=steel+frame"
        );

        let plain = store().orders_url(&OrderFilter::all()).expect("build url");
        assert_eq!(plain.as_str(), "http://orders.local/api/orders");
    }

    #[test]
    fn order_ids_are_escaped_in_paths() {
        let url = store()
            .order_url(&OrderId::from("OP 7/2"))
            .expect("build url");
        assert_eq!(url.as_str(), "http://orders.local/api/orders/OP%207%2F2");
    }

    #[test]
    fn non_success_statuses_become_server_errors() {
        assert_eq!(
            check_status(StatusCode::OK, "[]".to_string()).expect("2xx passes"),
            "[]"
        );
        assert!(check_status(StatusCode::NO_CONTENT, String::new()).is_ok());

        let err = check_status(StatusCode::CONFLICT, "locked".to_string())
            .expect_err("409 is an error");
        assert!(matches!(
            err,
            StoreError::Server { status: 409, ref body } if body == "locked"
        ));
    }

    #[test]
    fn missing_orders_map_to_not_found_on_update() {
        let id = OrderId::from("OP-7");

        let gone = update_outcome(&id, check_status(StatusCode::NOT_FOUND, String::new()));
        assert!(matches!(gone, Err(StoreError::NotFound(ref missing)) if *missing == id));

        let broken = update_outcome(
            &id,
            check_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()),
        );
        assert!(matches!(broken, Err(StoreError::Server { status: 500, .. })));

        assert!(update_outcome(&id, Ok(String::new())).is_ok());
    }

    #[test]
    fn order_lists_are_decoded_or_refused() {
        let orders = decode_orders(
            r#"[{"id":"OP-1","status":"awaiting_assignment","product":"Panels"},
                {"id":"OP-2","status":"in_progress","product":"Frames","scheduled_start":"2025-03-03"}]"#,
        )
        .expect("decode orders");
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].status, OrderStatus::InProgress);

        assert!(matches!(decode_orders("{\"id\":1}"), Err(StoreError::Decode(_))));
        assert!(matches!(
            decode_orders(
                r#"[{"id":"OP-3","status":"paused","product":"Bolts","scheduled_start":"03/03/2025"}]"#
            ),
            Err(StoreError::Decode(_))
        ));
    }
}
