use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::ordering::{self, active_sorted, history_sorted};
use crate::engine::transitions::{TransitionAction, apply_transition, dispatch_pending};
use crate::error::AppError;
use crate::gateway::OptimizationProposal;
use crate::geo::approximate_coordinates;
use crate::models::delivery::{DeliveryRecord, DeliveryStatus, GeoPoint};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery).get(list_deliveries))
        .route("/deliveries/intake", post(intake_addresses))
        .route("/deliveries/active", get(list_active))
        .route(
            "/deliveries/history",
            get(list_history).delete(clear_history),
        )
        .route("/deliveries/dispatch", post(dispatch))
        .route("/deliveries/optimize", post(optimize))
        .route(
            "/deliveries/:id",
            get(get_delivery).patch(update_delivery).delete(delete_delivery),
        )
        .route("/deliveries/:id/pickup", post(confirm_pickup))
        .route("/deliveries/:id/deliver", post(finalize_delivered))
        .route("/deliveries/:id/fail", post(finalize_failed))
        .route("/reports", get(reports))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeliveryRequest {
    pub destination_address: String,
    pub pickup_address: Option<String>,
    pub coordinates: Option<GeoPoint>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRequest {
    pub addresses: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeliveryRequest {
    pub destination_address: Option<String>,
    pub pickup_address: Option<String>,
    pub receiver_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPickupRequest {
    #[serde(default)]
    pub pickup_person_name: String,
    pub pickup_photo_ref: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeDeliveredRequest {
    pub receiver_name: String,
    pub document_number: Option<String>,
    pub proof_photo_ref: Option<String>,
    pub courier_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeFailedRequest {
    pub failure_reason: String,
    pub courier_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub origin: Option<GeoPoint>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeOutcome {
    pub ordered_ids: Vec<Uuid>,
    pub estimated_gain: String,
    pub note: String,
    pub fallback: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub dispatched: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearHistoryOutcome {
    pub removed: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierReport {
    pub courier_name: String,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub total: usize,
    pub pending: usize,
    pub in_route: usize,
    pub picked_up: usize,
    pub delivered: usize,
    pub failed: usize,
    pub completion_rate: f64,
    pub couriers: Vec<CourierReport>,
}

/// Persists the collection and keeps the active-count gauge honest. Every
/// mutation in this module funnels through here.
fn commit(state: &AppState, records: Vec<DeliveryRecord>) -> Result<(), AppError> {
    let active = records.iter().filter(|r| r.is_active()).count();
    state.store.commit(records)?;
    state.metrics.commits_total.inc();
    state.metrics.active_deliveries.set(active as i64);
    Ok(())
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<DeliveryRecord>, AppError> {
    let destination = payload.destination_address.trim().to_string();
    if destination.is_empty() {
        return Err(AppError::Validation(
            "destinationAddress is required".to_string(),
        ));
    }

    let pickup = payload
        .pickup_address
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());

    let mut records = state.store.load();
    let coordinates = payload
        .coordinates
        .or_else(|| approximate_coordinates(&destination));
    let record = DeliveryRecord::new(
        destination,
        pickup,
        coordinates,
        ordering::next_order(&records),
    );

    records.push(record.clone());
    commit(&state, records)?;

    info!(delivery_id = %record.id, order = record.order, "delivery created");
    Ok(Json(record))
}

/// Batch intake for addresses produced by the external OCR step: one pending
/// record per non-blank address, appended in input sequence.
async fn intake_addresses(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IntakeRequest>,
) -> Result<Json<Vec<DeliveryRecord>>, AppError> {
    let mut records = state.store.load();
    let mut created = Vec::new();

    for address in payload.addresses {
        let destination = address.trim().to_string();
        if destination.is_empty() {
            continue;
        }

        let coordinates = approximate_coordinates(&destination);
        let record = DeliveryRecord::new(
            destination,
            None,
            coordinates,
            ordering::next_order(&records),
        );
        records.push(record.clone());
        created.push(record);
    }

    if !created.is_empty() {
        commit(&state, records)?;
        info!(count = created.len(), "deliveries created from intake");
    }
    Ok(Json(created))
}

async fn list_deliveries(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryRecord>> {
    Json(state.store.load())
}

async fn list_active(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryRecord>> {
    Json(active_sorted(&state.store.load()))
}

async fn list_history(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryRecord>> {
    Json(history_sorted(&state.store.load()))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRecord>, AppError> {
    let record = state
        .store
        .load()
        .into_iter()
        .find(|r| r.id == id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

    Ok(Json(record))
}

async fn update_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryRequest>,
) -> Result<Json<DeliveryRecord>, AppError> {
    let mut records = state.store.load();
    let record = records
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

    if let Some(destination) = payload.destination_address {
        let destination = destination.trim().to_string();
        if destination.is_empty() {
            return Err(AppError::Validation(
                "destinationAddress cannot be blank".to_string(),
            ));
        }
        record.destination_address = destination;
    }
    if let Some(pickup) = payload.pickup_address {
        let pickup = pickup.trim().to_string();
        record.pickup_address = (!pickup.is_empty()).then_some(pickup);
    }
    if let Some(receiver) = payload.receiver_name {
        let receiver = receiver.trim().to_string();
        record.receiver_name = (!receiver.is_empty()).then_some(receiver);
    }

    let updated = record.clone();
    commit(&state, records)?;
    Ok(Json(updated))
}

async fn delete_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRecord>, AppError> {
    let mut records = state.store.load();
    let index = records
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

    let removed = records.remove(index);
    commit(&state, records)?;

    info!(delivery_id = %removed.id, "delivery removed");
    Ok(Json(removed))
}

async fn clear_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClearHistoryOutcome>, AppError> {
    let mut records = state.store.load();
    let before = records.len();
    records.retain(|r| r.is_active());
    let removed = before - records.len();

    if removed > 0 {
        commit(&state, records)?;
    }
    Ok(Json(ClearHistoryOutcome { removed }))
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DispatchOutcome>, AppError> {
    let mut records = state.store.load();
    let dispatched = dispatch_pending(&mut records);
    if dispatched == 0 {
        return Err(AppError::Validation(
            "no pending deliveries to dispatch".to_string(),
        ));
    }

    commit(&state, records)?;
    info!(dispatched, "pending deliveries sent in route");
    Ok(Json(DispatchOutcome { dispatched }))
}

async fn confirm_pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmPickupRequest>,
) -> Result<Json<DeliveryRecord>, AppError> {
    let action = TransitionAction::ConfirmPickup {
        pickup_person_name: payload.pickup_person_name,
        pickup_photo_ref: payload.pickup_photo_ref,
    };
    transition(&state, id, action, "courier").await
}

async fn finalize_delivered(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FinalizeDeliveredRequest>,
) -> Result<Json<DeliveryRecord>, AppError> {
    let courier = payload.courier_name.unwrap_or_else(|| "courier".to_string());
    let action = TransitionAction::FinalizeDelivered {
        receiver_name: payload.receiver_name,
        document_number: payload.document_number,
        proof_photo_ref: payload.proof_photo_ref,
    };
    transition(&state, id, action, &courier).await
}

async fn finalize_failed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FinalizeFailedRequest>,
) -> Result<Json<DeliveryRecord>, AppError> {
    let courier = payload.courier_name.unwrap_or_else(|| "courier".to_string());
    let action = TransitionAction::FinalizeFailed {
        failure_reason: payload.failure_reason,
    };
    transition(&state, id, action, &courier).await
}

async fn transition(
    state: &AppState,
    id: Uuid,
    action: TransitionAction,
    courier_name: &str,
) -> Result<Json<DeliveryRecord>, AppError> {
    let action_name = action.name();
    let mut records = state.store.load();
    let index = records
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

    let updated = match apply_transition(&records[index], action, Utc::now(), courier_name) {
        Ok(updated) => updated,
        Err(err) => {
            state
                .metrics
                .transitions_total
                .with_label_values(&[action_name, "rejected"])
                .inc();
            return Err(err.into());
        }
    };

    records[index] = updated.clone();
    commit(state, records)?;
    state
        .metrics
        .transitions_total
        .with_label_values(&[action_name, "success"])
        .inc();

    info!(delivery_id = %id, action = action_name, status = ?updated.status, "transition applied");
    Ok(Json(updated))
}

/// Requests a reordering proposal and reconciles it into the canonical
/// order. A gateway fallback is a successful no-op reorder; only an id-set
/// mismatch from a live oracle response rejects the operation.
async fn optimize(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OptimizeRequest>,
) -> Result<Json<OptimizeOutcome>, AppError> {
    let mut records = state.store.load();
    let active = active_sorted(&records);

    let start = Instant::now();
    let proposal: OptimizationProposal =
        state.optimizer.propose(&active, payload.origin).await;
    let outcome = if proposal.fallback { "fallback" } else { "success" };
    state
        .metrics
        .optimizer_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .optimizer_requests_total
        .with_label_values(&[outcome])
        .inc();

    ordering::reconcile(&mut records, &proposal.ordered_ids)?;
    commit(&state, records)?;

    info!(
        fallback = proposal.fallback,
        estimated_gain = %proposal.estimated_gain,
        "route order reconciled"
    );
    Ok(Json(OptimizeOutcome {
        ordered_ids: proposal.ordered_ids,
        estimated_gain: proposal.estimated_gain,
        note: proposal.note,
        fallback: proposal.fallback,
    }))
}

async fn reports(State(state): State<Arc<AppState>>) -> Json<DeliveryReport> {
    let records = state.store.load();

    let count = |status: DeliveryStatus| records.iter().filter(|r| r.status == status).count();
    let delivered = count(DeliveryStatus::Delivered);
    let failed = count(DeliveryStatus::Failed);
    let finalized = delivered + failed;

    let mut per_courier: HashMap<String, (usize, usize)> = HashMap::new();
    for record in records.iter().filter(|r| r.status.is_terminal()) {
        let name = record
            .courier_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let entry = per_courier.entry(name).or_default();
        if record.status == DeliveryStatus::Delivered {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }
    let mut couriers: Vec<CourierReport> = per_courier
        .into_iter()
        .map(|(courier_name, (delivered, failed))| CourierReport {
            courier_name,
            delivered,
            failed,
        })
        .collect();
    couriers.sort_by(|a, b| a.courier_name.cmp(&b.courier_name));

    Json(DeliveryReport {
        total: records.len(),
        pending: count(DeliveryStatus::Pending),
        in_route: count(DeliveryStatus::InRoute),
        picked_up: count(DeliveryStatus::PickedUp),
        delivered,
        failed,
        completion_rate: if finalized == 0 {
            0.0
        } else {
            delivered as f64 / finalized as f64
        },
        couriers,
    })
}
