use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::models::delivery::DeliveryRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderingError {
    #[error("proposal covers {got} deliveries but {expected} are active")]
    SizeMismatch { expected: usize, got: usize },

    #[error("proposal references an unknown or duplicate delivery {id}")]
    UnknownId { id: Uuid },
}

/// Order value for the next appended record: one past the highest active
/// order. Existing records are never renumbered on append.
pub fn next_order(records: &[DeliveryRecord]) -> i64 {
    records
        .iter()
        .filter(|r| r.is_active())
        .map(|r| r.order)
        .max()
        .map_or(1, |max| max + 1)
}

/// Applies an optimizer proposal onto the active subset.
///
/// The active records, sorted ascending by `order`, define a list of slots.
/// The proposal is a permutation of the active ids; position `i` of the
/// proposal receives slot `i`. Order values are reused, never invented, so
/// the result cannot collide with finalized records and sparse numbering
/// survives. All-or-nothing: any id-set mismatch rejects the whole proposal
/// with the collection unchanged.
pub fn reconcile(
    records: &mut [DeliveryRecord],
    proposal: &[Uuid],
) -> Result<(), OrderingError> {
    let mut active: Vec<usize> = (0..records.len())
        .filter(|&i| records[i].is_active())
        .collect();
    active.sort_by_key(|&i| records[i].order);

    if proposal.len() != active.len() {
        return Err(OrderingError::SizeMismatch {
            expected: active.len(),
            got: proposal.len(),
        });
    }

    let slots: Vec<i64> = active.iter().map(|&i| records[i].order).collect();
    let mut by_id: HashMap<Uuid, usize> = active.iter().map(|&i| (records[i].id, i)).collect();

    // Resolve every proposed id before touching any record.
    let mut assignments = Vec::with_capacity(proposal.len());
    for (position, id) in proposal.iter().enumerate() {
        let index = by_id
            .remove(id)
            .ok_or(OrderingError::UnknownId { id: *id })?;
        assignments.push((index, slots[position]));
    }

    for (index, order) in assignments {
        records[index].order = order;
    }
    Ok(())
}

/// Active records ascending by route order.
pub fn active_sorted(records: &[DeliveryRecord]) -> Vec<DeliveryRecord> {
    let mut active: Vec<DeliveryRecord> =
        records.iter().filter(|r| r.is_active()).cloned().collect();
    active.sort_by_key(|r| r.order);
    active
}

/// Finalized records, most recently completed first.
pub fn history_sorted(records: &[DeliveryRecord]) -> Vec<DeliveryRecord> {
    let mut history: Vec<DeliveryRecord> = records
        .iter()
        .filter(|r| r.status.is_terminal())
        .cloned()
        .collect();
    history.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    history
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{OrderingError, next_order, reconcile};
    use crate::models::delivery::{DeliveryRecord, DeliveryStatus};

    fn record(id_seed: u128, status: DeliveryStatus, order: i64) -> DeliveryRecord {
        let mut r = DeliveryRecord::new("Av. Paulista 1000".to_string(), None, None, order);
        r.id = Uuid::from_u128(id_seed);
        r.status = status;
        r
    }

    #[test]
    fn next_order_starts_at_one() {
        assert_eq!(next_order(&[]), 1);
    }

    #[test]
    fn next_order_ignores_finalized_records() {
        let records = vec![
            record(1, DeliveryStatus::Pending, 3),
            record(2, DeliveryStatus::Delivered, 9),
        ];
        assert_eq!(next_order(&records), 4);
    }

    #[test]
    fn reconcile_reassigns_slots_in_proposal_sequence() {
        let mut records = vec![
            record(1, DeliveryStatus::InRoute, 1),
            record(2, DeliveryStatus::InRoute, 2),
            record(3, DeliveryStatus::PickedUp, 3),
            record(4, DeliveryStatus::Delivered, 7),
        ];

        // Proposal [C, A, B] over slots [1, 2, 3].
        let proposal = [
            Uuid::from_u128(3),
            Uuid::from_u128(1),
            Uuid::from_u128(2),
        ];
        reconcile(&mut records, &proposal).unwrap();

        assert_eq!(records[2].order, 1);
        assert_eq!(records[0].order, 2);
        assert_eq!(records[1].order, 3);
        // Non-active record keeps its stale order value.
        assert_eq!(records[3].order, 7);
    }

    #[test]
    fn reconcile_preserves_the_multiset_of_order_values() {
        let mut records = vec![
            record(1, DeliveryStatus::InRoute, 2),
            record(2, DeliveryStatus::InRoute, 5),
            record(3, DeliveryStatus::InRoute, 11),
        ];
        let proposal = [
            Uuid::from_u128(2),
            Uuid::from_u128(3),
            Uuid::from_u128(1),
        ];
        reconcile(&mut records, &proposal).unwrap();

        let mut orders: Vec<i64> = records.iter().map(|r| r.order).collect();
        orders.sort_unstable();
        assert_eq!(orders, vec![2, 5, 11]);
        assert_eq!(records[1].order, 2);
        assert_eq!(records[2].order, 5);
        assert_eq!(records[0].order, 11);
    }

    #[test]
    fn reconcile_rejects_short_proposal_without_mutating() {
        let mut records = vec![
            record(1, DeliveryStatus::InRoute, 1),
            record(2, DeliveryStatus::InRoute, 2),
        ];
        let before = records.clone();

        let err = reconcile(&mut records, &[Uuid::from_u128(1)]).unwrap_err();

        assert_eq!(
            err,
            OrderingError::SizeMismatch {
                expected: 2,
                got: 1
            }
        );
        assert_eq!(records, before);
    }

    #[test]
    fn reconcile_rejects_unknown_id_without_mutating() {
        let mut records = vec![
            record(1, DeliveryStatus::InRoute, 1),
            record(2, DeliveryStatus::InRoute, 2),
        ];
        let before = records.clone();

        let proposal = [Uuid::from_u128(1), Uuid::from_u128(99)];
        let err = reconcile(&mut records, &proposal).unwrap_err();

        assert_eq!(
            err,
            OrderingError::UnknownId {
                id: Uuid::from_u128(99)
            }
        );
        assert_eq!(records, before);
    }

    #[test]
    fn reconcile_rejects_duplicate_id() {
        let mut records = vec![
            record(1, DeliveryStatus::InRoute, 1),
            record(2, DeliveryStatus::InRoute, 2),
        ];
        let before = records.clone();

        let proposal = [Uuid::from_u128(1), Uuid::from_u128(1)];
        assert!(reconcile(&mut records, &proposal).is_err());
        assert_eq!(records, before);
    }

    #[test]
    fn identity_proposal_is_a_no_op() {
        let mut records = vec![
            record(1, DeliveryStatus::InRoute, 4),
            record(2, DeliveryStatus::InRoute, 8),
        ];
        let before = records.clone();

        let proposal = [Uuid::from_u128(1), Uuid::from_u128(2)];
        reconcile(&mut records, &proposal).unwrap();

        assert_eq!(records, before);
    }
}
