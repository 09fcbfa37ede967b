use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    InRoute,
    PickedUp,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    /// Active records participate in route ordering; terminal ones only in
    /// history.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::InRoute | Self::PickedUp)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

/// One delivery task. A record with a `pickup_address` is a two-stage job
/// (collect, then deliver); without one it goes straight to the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub status: DeliveryStatus,
    /// Position in the active route. Unique among active records; retained
    /// but ignored once the record is finalized.
    pub order: i64,
    pub pickup_address: Option<String>,
    pub destination_address: String,
    pub coordinates: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub receiver_name: Option<String>,
    pub document_number: Option<String>,
    pub proof_photo_ref: Option<String>,
    pub pickup_person_name: Option<String>,
    pub pickup_photo_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub courier_name: Option<String>,
}

impl DeliveryRecord {
    pub fn new(
        destination_address: String,
        pickup_address: Option<String>,
        coordinates: Option<GeoPoint>,
        order: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: DeliveryStatus::Pending,
            order,
            pickup_address,
            destination_address,
            coordinates,
            created_at: Utc::now(),
            picked_up_at: None,
            completed_at: None,
            receiver_name: None,
            document_number: None,
            proof_photo_ref: None,
            pickup_person_name: None,
            pickup_photo_ref: None,
            failure_reason: None,
            courier_name: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
