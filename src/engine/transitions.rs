use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::delivery::{DeliveryRecord, DeliveryStatus};

/// Placeholder when the courier skips naming who handed over the parcel.
const UNNAMED_PICKUP_PERSON: &str = "not informed";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("cannot {action} a delivery in status {status:?}")]
    IllegalState {
        action: &'static str,
        status: DeliveryStatus,
    },

    #[error("delivery has no pickup address; the pickup step does not apply")]
    NoPickupStage,
}

#[derive(Debug, Clone)]
pub enum TransitionAction {
    ConfirmPickup {
        pickup_person_name: String,
        pickup_photo_ref: Option<String>,
    },
    FinalizeDelivered {
        receiver_name: String,
        document_number: Option<String>,
        proof_photo_ref: Option<String>,
    },
    FinalizeFailed {
        failure_reason: String,
    },
}

impl TransitionAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConfirmPickup { .. } => "confirm_pickup",
            Self::FinalizeDelivered { .. } => "finalize_delivered",
            Self::FinalizeFailed { .. } => "finalize_failed",
        }
    }
}

/// Validates and applies one courier action on one record. Pure: returns the
/// updated copy on success and leaves the input untouched on rejection, so a
/// failed precondition never half-mutates a record.
pub fn apply_transition(
    record: &DeliveryRecord,
    action: TransitionAction,
    now: DateTime<Utc>,
    courier_name: &str,
) -> Result<DeliveryRecord, TransitionError> {
    match action {
        TransitionAction::ConfirmPickup {
            pickup_person_name,
            pickup_photo_ref,
        } => {
            if record.status != DeliveryStatus::InRoute {
                return Err(TransitionError::IllegalState {
                    action: "confirm pickup for",
                    status: record.status,
                });
            }
            if record.pickup_address.is_none() {
                return Err(TransitionError::NoPickupStage);
            }

            let person = pickup_person_name.trim();
            let mut updated = record.clone();
            updated.status = DeliveryStatus::PickedUp;
            updated.picked_up_at = Some(now);
            updated.pickup_person_name = Some(if person.is_empty() {
                UNNAMED_PICKUP_PERSON.to_string()
            } else {
                person.to_string()
            });
            updated.pickup_photo_ref = pickup_photo_ref;
            Ok(updated)
        }

        TransitionAction::FinalizeDelivered {
            receiver_name,
            document_number,
            proof_photo_ref,
        } => {
            require_en_route_or_picked_up(record, "finalize")?;
            if receiver_name.trim().is_empty() {
                return Err(TransitionError::MissingField {
                    field: "receiverName",
                });
            }

            let mut updated = record.clone();
            updated.status = DeliveryStatus::Delivered;
            updated.completed_at = Some(now);
            updated.receiver_name = Some(receiver_name.trim().to_string());
            updated.document_number = document_number;
            updated.proof_photo_ref = proof_photo_ref;
            updated.courier_name = Some(courier_name.to_string());
            Ok(updated)
        }

        TransitionAction::FinalizeFailed { failure_reason } => {
            require_en_route_or_picked_up(record, "fail")?;
            if failure_reason.trim().is_empty() {
                return Err(TransitionError::MissingField {
                    field: "failureReason",
                });
            }

            let mut updated = record.clone();
            updated.status = DeliveryStatus::Failed;
            updated.completed_at = Some(now);
            updated.failure_reason = Some(failure_reason.trim().to_string());
            updated.courier_name = Some(courier_name.to_string());
            Ok(updated)
        }
    }
}

fn require_en_route_or_picked_up(
    record: &DeliveryRecord,
    action: &'static str,
) -> Result<(), TransitionError> {
    match record.status {
        DeliveryStatus::InRoute | DeliveryStatus::PickedUp => Ok(()),
        status => Err(TransitionError::IllegalState { action, status }),
    }
}

/// The dispatch batch action: every pending record goes in route, nothing
/// else is touched. Returns how many records moved.
pub fn dispatch_pending(records: &mut [DeliveryRecord]) -> usize {
    let mut moved = 0;
    for record in records.iter_mut() {
        if record.status == DeliveryStatus::Pending {
            record.status = DeliveryStatus::InRoute;
            moved += 1;
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{TransitionAction, TransitionError, apply_transition, dispatch_pending};
    use crate::models::delivery::{DeliveryRecord, DeliveryStatus};

    fn record(status: DeliveryStatus, pickup: Option<&str>) -> DeliveryRecord {
        let mut r = DeliveryRecord::new(
            "Rua Augusta 100".to_string(),
            pickup.map(str::to_string),
            None,
            1,
        );
        r.status = status;
        r
    }

    fn deliver_action(receiver: &str) -> TransitionAction {
        TransitionAction::FinalizeDelivered {
            receiver_name: receiver.to_string(),
            document_number: None,
            proof_photo_ref: None,
        }
    }

    #[test]
    fn pickup_requires_in_route_status() {
        let r = record(DeliveryStatus::Pending, Some("Depot A"));
        let err = apply_transition(
            &r,
            TransitionAction::ConfirmPickup {
                pickup_person_name: "Ana".to_string(),
                pickup_photo_ref: None,
            },
            Utc::now(),
            "Caio",
        )
        .unwrap_err();

        assert!(matches!(err, TransitionError::IllegalState { .. }));
    }

    #[test]
    fn pickup_rejected_for_direct_delivery() {
        let r = record(DeliveryStatus::InRoute, None);
        let err = apply_transition(
            &r,
            TransitionAction::ConfirmPickup {
                pickup_person_name: "Ana".to_string(),
                pickup_photo_ref: None,
            },
            Utc::now(),
            "Caio",
        )
        .unwrap_err();

        assert_eq!(err, TransitionError::NoPickupStage);
    }

    #[test]
    fn pickup_stamps_time_and_person() {
        let r = record(DeliveryStatus::InRoute, Some("Depot A"));
        let now = Utc::now();
        let updated = apply_transition(
            &r,
            TransitionAction::ConfirmPickup {
                pickup_person_name: "  Ana  ".to_string(),
                pickup_photo_ref: Some("photo-1".to_string()),
            },
            now,
            "Caio",
        )
        .unwrap();

        assert_eq!(updated.status, DeliveryStatus::PickedUp);
        assert_eq!(updated.picked_up_at, Some(now));
        assert_eq!(updated.pickup_person_name.as_deref(), Some("Ana"));
        assert_eq!(updated.pickup_photo_ref.as_deref(), Some("photo-1"));
    }

    #[test]
    fn blank_pickup_person_gets_placeholder() {
        let r = record(DeliveryStatus::InRoute, Some("Depot A"));
        let updated = apply_transition(
            &r,
            TransitionAction::ConfirmPickup {
                pickup_person_name: "   ".to_string(),
                pickup_photo_ref: None,
            },
            Utc::now(),
            "Caio",
        )
        .unwrap();

        assert_eq!(updated.pickup_person_name.as_deref(), Some("not informed"));
    }

    #[test]
    fn delivered_requires_receiver_name() {
        let r = record(DeliveryStatus::InRoute, None);
        let err = apply_transition(&r, deliver_action("   "), Utc::now(), "Caio").unwrap_err();

        assert_eq!(
            err,
            TransitionError::MissingField {
                field: "receiverName"
            }
        );
    }

    #[test]
    fn direct_delivery_finalizes_from_in_route() {
        let r = record(DeliveryStatus::InRoute, None);
        let now = Utc::now();
        let updated = apply_transition(&r, deliver_action("Marcos"), now, "Caio").unwrap();

        assert_eq!(updated.status, DeliveryStatus::Delivered);
        assert_eq!(updated.completed_at, Some(now));
        assert_eq!(updated.receiver_name.as_deref(), Some("Marcos"));
        assert_eq!(updated.courier_name.as_deref(), Some("Caio"));
        assert!(updated.picked_up_at.is_none());
    }

    #[test]
    fn two_stage_delivery_finalizes_from_picked_up() {
        let r = record(DeliveryStatus::PickedUp, Some("Depot A"));
        let updated = apply_transition(&r, deliver_action("Marcos"), Utc::now(), "Caio").unwrap();

        assert_eq!(updated.status, DeliveryStatus::Delivered);
    }

    #[test]
    fn failed_requires_reason() {
        let r = record(DeliveryStatus::InRoute, None);
        let err = apply_transition(
            &r,
            TransitionAction::FinalizeFailed {
                failure_reason: "".to_string(),
            },
            Utc::now(),
            "Caio",
        )
        .unwrap_err();

        assert_eq!(
            err,
            TransitionError::MissingField {
                field: "failureReason"
            }
        );
    }

    #[test]
    fn terminal_states_reject_every_action() {
        for status in [DeliveryStatus::Delivered, DeliveryStatus::Failed] {
            let r = record(status, Some("Depot A"));
            let err = apply_transition(&r, deliver_action("Marcos"), Utc::now(), "Caio")
                .unwrap_err();
            assert!(matches!(err, TransitionError::IllegalState { .. }));
        }
    }

    #[test]
    fn dispatch_moves_only_pending_records() {
        let mut records = vec![
            record(DeliveryStatus::Pending, None),
            record(DeliveryStatus::Pending, Some("Depot A")),
            record(DeliveryStatus::PickedUp, Some("Depot B")),
            record(DeliveryStatus::Delivered, None),
        ];

        let moved = dispatch_pending(&mut records);

        assert_eq!(moved, 2);
        assert_eq!(records[0].status, DeliveryStatus::InRoute);
        assert_eq!(records[1].status, DeliveryStatus::InRoute);
        assert_eq!(records[2].status, DeliveryStatus::PickedUp);
        assert_eq!(records[3].status, DeliveryStatus::Delivered);
    }
}
