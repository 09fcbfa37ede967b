use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::models::delivery::{DeliveryRecord, DeliveryStatus, GeoPoint};

/// Reordering proposal from the external route oracle. `fallback` marks the
/// identity result produced when the oracle could not be used; callers treat
/// it as a no-op, not an error.
#[derive(Debug, Clone)]
pub struct OptimizationProposal {
    pub ordered_ids: Vec<Uuid>,
    pub estimated_gain: String,
    pub note: String,
    pub fallback: bool,
}

impl OptimizationProposal {
    /// Identity order over the input, zero gain.
    pub fn identity(records: &[DeliveryRecord], note: impl Into<String>) -> Self {
        Self {
            ordered_ids: records.iter().map(|r| r.id).collect(),
            estimated_gain: "0 min".to_string(),
            note: note.into(),
            fallback: true,
        }
    }
}

/// Seam to the external optimizer. One attempt per call, bounded by a fixed
/// timeout, never retried; every failure mode degrades to the identity
/// fallback so route state stays available.
#[async_trait]
pub trait RouteOptimizer: Send + Sync {
    async fn propose(
        &self,
        records: &[DeliveryRecord],
        origin: Option<GeoPoint>,
    ) -> OptimizationProposal;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OptimizeRequest {
    records: Vec<RouteStop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<GeoPoint>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteStop {
    id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pickup_address: Option<String>,
    destination_address: String,
    status: DeliveryStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptimizeResponse {
    ordered_ids: Vec<Uuid>,
    estimated_gain: String,
    note: String,
}

/// HTTP adapter for the oracle. The pickup-before-delivery rule is advisory:
/// it is communicated through the payload shape (a record already picked up
/// contributes only its delivery stop) and not re-validated on the way back.
pub struct HttpRouteOptimizer {
    client: reqwest::Client,
    url: String,
}

impl HttpRouteOptimizer {
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl RouteOptimizer for HttpRouteOptimizer {
    async fn propose(
        &self,
        records: &[DeliveryRecord],
        origin: Option<GeoPoint>,
    ) -> OptimizationProposal {
        if records.len() < 2 {
            return OptimizationProposal::identity(records, "nothing to optimize");
        }

        let request = OptimizeRequest {
            records: records.iter().map(route_stop).collect(),
            origin,
        };

        let response = match self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
        {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "optimizer call failed; falling back to identity order");
                return OptimizationProposal::identity(records, "optimizer unavailable");
            }
        };

        let body: OptimizeResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                error!(error = %err, "optimizer returned an undecodable response; falling back");
                return OptimizationProposal::identity(records, "optimizer response malformed");
            }
        };

        if !covers_input(records, &body.ordered_ids) {
            error!("optimizer response does not cover the requested records; falling back");
            return OptimizationProposal::identity(records, "optimizer response incomplete");
        }

        OptimizationProposal {
            ordered_ids: body.ordered_ids,
            estimated_gain: body.estimated_gain,
            note: body.note,
            fallback: false,
        }
    }
}

fn route_stop(record: &DeliveryRecord) -> RouteStop {
    // A picked-up record has no remaining pickup stop.
    let pickup_address = if record.status == DeliveryStatus::PickedUp {
        None
    } else {
        record.pickup_address.clone()
    };

    RouteStop {
        id: record.id,
        pickup_address,
        destination_address: record.destination_address.clone(),
        status: record.status,
    }
}

fn covers_input(records: &[DeliveryRecord], ordered_ids: &[Uuid]) -> bool {
    if ordered_ids.len() != records.len() {
        return false;
    }
    let expected: HashSet<Uuid> = records.iter().map(|r| r.id).collect();
    let got: HashSet<Uuid> = ordered_ids.iter().copied().collect();
    expected == got
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{OptimizationProposal, covers_input, route_stop};
    use crate::models::delivery::{DeliveryRecord, DeliveryStatus};

    fn record(id_seed: u128, status: DeliveryStatus, pickup: Option<&str>) -> DeliveryRecord {
        let mut r = DeliveryRecord::new(
            "Rua Oscar Freire 200".to_string(),
            pickup.map(str::to_string),
            None,
            1,
        );
        r.id = Uuid::from_u128(id_seed);
        r.status = status;
        r
    }

    #[test]
    fn identity_fallback_preserves_input_order() {
        let records = vec![
            record(1, DeliveryStatus::InRoute, None),
            record(2, DeliveryStatus::InRoute, None),
        ];

        let proposal = OptimizationProposal::identity(&records, "optimizer unavailable");

        assert_eq!(
            proposal.ordered_ids,
            vec![Uuid::from_u128(1), Uuid::from_u128(2)]
        );
        assert_eq!(proposal.estimated_gain, "0 min");
        assert!(proposal.fallback);
    }

    #[test]
    fn picked_up_record_contributes_only_its_delivery_stop() {
        let in_route = record(1, DeliveryStatus::InRoute, Some("Depot A"));
        let picked_up = record(2, DeliveryStatus::PickedUp, Some("Depot A"));

        assert_eq!(route_stop(&in_route).pickup_address.as_deref(), Some("Depot A"));
        assert!(route_stop(&picked_up).pickup_address.is_none());
    }

    #[test]
    fn response_must_cover_the_exact_id_set() {
        let records = vec![
            record(1, DeliveryStatus::InRoute, None),
            record(2, DeliveryStatus::InRoute, None),
        ];

        let complete = [Uuid::from_u128(2), Uuid::from_u128(1)];
        let short = [Uuid::from_u128(1)];
        let foreign = [Uuid::from_u128(1), Uuid::from_u128(9)];
        let duplicated = [Uuid::from_u128(1), Uuid::from_u128(1)];

        assert!(covers_input(&records, &complete));
        assert!(!covers_input(&records, &short));
        assert!(!covers_input(&records, &foreign));
        assert!(!covers_input(&records, &duplicated));
    }
}
