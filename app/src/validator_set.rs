//! Committee computation.
//!
//! Pure functions over enrollment rows; the store supplies rows, this
//! module decides membership. Two views exist:
//!
//! * [`committee_at`] is the set signing the block at `height`: enrollments
//!   with `enrolled_at < height <= enrolled_at + cycle_length`, live as of
//!   the previous height. This drives header pre-image slots, ballot
//!   eligibility and quorum denominators.
//! * [`enrolled_as_of`] is the set as of a committed ledger height,
//!   including enrollments made in that very block. This is what the
//!   `/validators` endpoints report.

use basilica_types::{Address, Hash, Height};
use itertools::Itertools;

use crate::store::records::EnrollmentRecord;

/// Latest enrollment per stake UTXO satisfying `anchor_ok`, membership
/// window and liveness, in canonical (ascending address) order.
fn select(
    height: Height,
    rows: &[EnrollmentRecord],
    anchor_ok: impl Fn(Height) -> bool,
) -> Vec<EnrollmentRecord> {
    rows.iter()
        .filter(|row| anchor_ok(row.enrolled_at))
        .map(|row| (row.utxo_key, row))
        .into_group_map()
        .into_values()
        .filter_map(|enrollments| {
            enrollments
                .into_iter()
                .max_by_key(|row| row.enrolled_at)
                .cloned()
        })
        .filter(|row| height.as_u64() <= row.enrolled_at.as_u64() + row.cycle_length)
        .filter(|row| is_live(row, height))
        .sorted_by_key(|row| row.address)
        .collect()
}

/// A validator is live at `height` when its pre-image tip has reached at
/// least the previous height; the reveal for `height` itself arrives in
/// that block's header.
fn is_live(row: &EnrollmentRecord, height: Height) -> bool {
    row.tip_height.increment() >= height
}

/// Active validator committee for the block at `height`.
pub fn committee_at(height: Height, rows: &[EnrollmentRecord]) -> Vec<EnrollmentRecord> {
    select(height, rows, |anchor| anchor < height)
}

/// Validators as of the committed ledger height `height` (enrollments in
/// the block at `height` included).
pub fn enrolled_as_of(height: Height, rows: &[EnrollmentRecord]) -> Vec<EnrollmentRecord> {
    select(height, rows, |anchor| anchor <= height)
}

/// Member of `committee` owning `address`, if any.
pub fn member_by_address<'a>(
    committee: &'a [EnrollmentRecord],
    address: &Address,
) -> Option<&'a EnrollmentRecord> {
    committee.iter().find(|row| row.address == *address)
}

/// Enrollment row covering pre-image derivation for `height`: the latest
/// chain anchored at or before it.
pub fn chain_covering<'a>(
    rows: &'a [EnrollmentRecord],
    address: &Address,
    height: Height,
) -> Option<&'a EnrollmentRecord> {
    rows.iter()
        .filter(|row| row.address == *address && row.enrolled_at <= height)
        .max_by_key(|row| row.enrolled_at)
}

/// Pre-image each committee member revealed for `height`, zero-hash for
/// the members whose tip has not reached it.
pub fn committee_preimages(committee: &[EnrollmentRecord], height: Height) -> Vec<Hash> {
    committee
        .iter()
        .map(|row| row.preimage_at(height).unwrap_or(Hash::ZERO))
        .collect()
}

#[cfg(test)]
mod tests {
    use basilica_types::preimage::hash_chain;
    use basilica_types::{hash, Address, Hash};

    use super::*;

    const CYCLE: u64 = 20;

    fn enrollment(seed: u8, enrolled_at: u64, tip_height: u64) -> EnrollmentRecord {
        let chain = hash_chain(hash(&[seed]), CYCLE);
        let offset = (tip_height - enrolled_at) as usize;
        EnrollmentRecord {
            utxo_key: hash(&[seed, 0xee]),
            address: Address::new([seed; 20]),
            commitment: chain[0],
            cycle_length: CYCLE,
            enrolled_at: Height::new(enrolled_at),
            slot_index: 0,
            tip_hash: chain[offset],
            tip_height: Height::new(tip_height),
        }
    }

    #[test]
    fn test_membership_window_is_half_open() {
        let rows = vec![enrollment(1, 0, 0)];

        assert!(committee_at(Height::new(0), &rows).is_empty());
        assert_eq!(committee_at(Height::new(1), &rows).len(), 1);
        assert_eq!(committee_at(Height::new(CYCLE), &rows).len(), 1);
        assert!(committee_at(Height::new(CYCLE + 1), &rows).is_empty());
    }

    #[test]
    fn test_enrolled_as_of_includes_same_height_enrollment() {
        let rows = vec![enrollment(1, 0, 1), enrollment(2, 1, 1)];

        // The block-1 enrollment is not active *at* height 1 but reports
        // as enrolled as of ledger height 1.
        assert_eq!(committee_at(Height::new(1), &rows).len(), 1);
        assert_eq!(enrolled_as_of(Height::new(1), &rows).len(), 2);
    }

    #[test]
    fn test_stale_tip_drops_member() {
        // Tip stuck at height 3; live through height 4, gone at 5.
        let rows = vec![enrollment(1, 0, 3)];
        assert_eq!(committee_at(Height::new(4), &rows).len(), 1);
        assert!(committee_at(Height::new(5), &rows).is_empty());
    }

    #[test]
    fn test_reenrollment_takes_latest_anchor() {
        let old = enrollment(1, 0, CYCLE);
        let mut renewed = enrollment(1, CYCLE, CYCLE);
        renewed.utxo_key = old.utxo_key;
        let rows = vec![old.clone(), renewed.clone()];

        // At the boundary the old enrollment still serves.
        let at_boundary = committee_at(Height::new(CYCLE), &rows);
        assert_eq!(at_boundary[0].enrolled_at, old.enrolled_at);

        // One past it, the renewed chain takes over.
        let after = committee_at(Height::new(CYCLE + 1), &rows);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].enrolled_at, renewed.enrolled_at);
    }

    #[test]
    fn test_committee_is_address_ordered() {
        let rows = vec![enrollment(9, 0, 0), enrollment(1, 0, 0), enrollment(5, 0, 0)];
        let committee = committee_at(Height::new(1), &rows);
        let addresses: Vec<_> = committee.iter().map(|m| m.address).collect();
        let mut sorted = addresses.clone();
        sorted.sort();
        assert_eq!(addresses, sorted);
    }

    #[test]
    fn test_committee_preimages_use_zero_sentinel() {
        let revealed = enrollment(1, 0, 5);
        let silent = enrollment(2, 0, 4);
        let committee = committee_at(Height::new(5), &[revealed.clone(), silent]);

        let preimages = committee_preimages(&committee, Height::new(5));
        assert_eq!(preimages.len(), 2);
        assert_eq!(preimages[0], revealed.tip_hash);
        assert_eq!(preimages[1], Hash::ZERO);
    }

    #[test]
    fn test_chain_covering_prefers_latest_anchor() {
        let old = enrollment(1, 0, CYCLE);
        let renewed = enrollment(1, CYCLE, CYCLE);
        let rows = vec![old.clone(), renewed.clone()];
        let address = old.address;

        let covering_15 = chain_covering(&rows, &address, Height::new(15)).unwrap();
        assert_eq!(covering_15.enrolled_at, old.enrolled_at);

        let covering_21 = chain_covering(&rows, &address, Height::new(21)).unwrap();
        assert_eq!(covering_21.enrolled_at, renewed.enrolled_at);
    }
}
