//! Governance as a projection.
//!
//! Nothing here runs on a timer: proposal status is a function of the
//! committed ledger height, ballots are judged at the commit that carries
//! them, and the deferred tally runs at the commit of the block at
//! `vote_end_height + grace_blocks`. The store applies these decisions
//! inside the block's write transaction; this module only decides.

pub mod metadata;

use basilica_types::crypto::{encrypt_key_derive, unseal_answer, VoteChoice};
use basilica_types::payload::BallotPayload;
use basilica_types::{Address, Hash, Height, PublicKey, Signature};
use serde::{Deserialize, Serialize};

use crate::store::records::{BallotRecord, EnrollmentRecord, ProposalRecord};
use crate::validator_set;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Pending,
    Voting,
    CountingVotes,
    Assessing,
    Closed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalResult {
    Pending,
    Passed,
    Rejected,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BallotRejectReason {
    OutOfWindow,
    UnknownProposal,
    BadCardSig,
    BadBallotSig,
    NotValidator,
    StaleSequence,
    UnsealFailed,
}

/// Where a persisted ballot stands. Every ballot is kept for audit;
/// accepted ones decode into `Counted` at the tally.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallotDisposition {
    Accepted,
    Counted(VoteChoice),
    Reject(BallotRejectReason),
}

impl BallotDisposition {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted | Self::Counted(_))
    }
}

/// Human-readable enrichment pulled out-of-band; never consensus-relevant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Status the proposal must hold once the block at `height` is committed.
pub fn status_for_height(
    vote_start: Height,
    vote_end: Height,
    grace_blocks: u64,
    height: Height,
) -> ProposalStatus {
    if height < vote_start {
        ProposalStatus::Pending
    } else if height <= vote_end {
        ProposalStatus::Voting
    } else if height.as_u64() < vote_end.as_u64() + grace_blocks {
        ProposalStatus::CountingVotes
    } else {
        // The tally itself runs within the same commit, so Assessing is
        // only ever observed mid-transaction.
        ProposalStatus::Closed
    }
}

/// Judges one ballot-bearing transaction at commit time.
///
/// Checks run in a fixed order; the first failure stamps the reject
/// reason.
/// The claimed validator address is returned even for rejected ballots so
/// they persist under the claiming key (zero address when the card is too
/// mangled to name one).
pub fn judge_ballot(
    ballot: &BallotPayload,
    proposal: Option<&ProposalRecord>,
    height: Height,
    committee: &[EnrollmentRecord],
    max_accepted_sequence: Option<u32>,
) -> (Address, BallotDisposition) {
    let claimed = PublicKey::from_sec1_bytes(&ballot.voter_card.validator_key)
        .map(|key| Address::from_public_key(&key))
        .unwrap_or_default();

    let Some(proposal) = proposal else {
        return (
            claimed,
            BallotDisposition::Reject(BallotRejectReason::UnknownProposal),
        );
    };

    let vote_start = proposal.payload.vote_start_height;
    let vote_end = proposal.payload.vote_end_height;
    if height < vote_start || height > vote_end {
        return (
            claimed,
            BallotDisposition::Reject(BallotRejectReason::OutOfWindow),
        );
    }

    // Outer signature: the validator key over the delegation record.
    let card_ok = PublicKey::from_sec1_bytes(&ballot.voter_card.validator_key)
        .ok()
        .zip(Signature::from_slice(ballot.voter_card.signature.as_bytes()).ok())
        .is_some_and(|(key, sig)| key.verify(&ballot.voter_card.digest(), &sig));
    if !card_ok {
        return (
            claimed,
            BallotDisposition::Reject(BallotRejectReason::BadCardSig),
        );
    }

    // Inner signature: the delegated temporary key over the ballot body.
    let ballot_ok = PublicKey::from_sec1_bytes(&ballot.voter_card.temporary_key)
        .ok()
        .zip(Signature::from_slice(ballot.signature.as_bytes()).ok())
        .is_some_and(|(key, sig)| key.verify(&ballot.digest(), &sig));
    if !ballot_ok {
        return (
            claimed,
            BallotDisposition::Reject(BallotRejectReason::BadBallotSig),
        );
    }

    if validator_set::member_by_address(committee, &claimed).is_none() {
        return (
            claimed,
            BallotDisposition::Reject(BallotRejectReason::NotValidator),
        );
    }

    // Monotone revote counter: an equal sequence re-vote is allowed (the
    // later block wins), a lower one is stale.
    if max_accepted_sequence.is_some_and(|max| max > ballot.sequence) {
        return (
            claimed,
            BallotDisposition::Reject(BallotRejectReason::StaleSequence),
        );
    }

    (claimed, BallotDisposition::Accepted)
}

/// Winner per validator among accepted ballots: highest sequence, ties
/// broken by the later block.
pub fn select_winners(ballots: &[BallotRecord]) -> Vec<BallotRecord> {
    let mut winners: Vec<BallotRecord> = Vec::new();
    for ballot in ballots {
        if !ballot.disposition.is_accepted() {
            continue;
        }
        match winners.iter_mut().find(|w| w.validator == ballot.validator) {
            None => winners.push(ballot.clone()),
            Some(current) => {
                let newer = (ballot.sequence, ballot.height, ballot.tx_index)
                    > (current.sequence, current.height, current.tx_index);
                if newer {
                    *current = ballot.clone();
                }
            }
        }
    }
    winners
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TallyOutcome {
    pub yes: u64,
    pub no: u64,
    pub blank: u64,
    pub reject: u64,
    pub result: ProposalResult,
    /// Updated dispositions to write back, one per winner ballot.
    pub decoded: Vec<(BallotRecord, BallotDisposition)>,
}

/// Decodes the winner ballots and applies the result rule.
///
/// `sealing_key` maps a validator to the digest its decryption key is
/// derived from (the pre-image at `vote_end_height` folded with the app
/// name); `None` means the chain never revealed that far and the ballot
/// cannot be opened. PASSED requires a strict YES majority among
/// {YES, NO} and at least ceil(N/3) decoded voters of the
/// `committee_size`-strong committee at `vote_start_height`.
pub fn tally(
    proposal_id: &str,
    winners: Vec<BallotRecord>,
    committee_size: u64,
    sealing_key: impl Fn(&Address) -> Option<Hash>,
) -> TallyOutcome {
    let mut outcome = TallyOutcome {
        yes: 0,
        no: 0,
        blank: 0,
        reject: 0,
        result: ProposalResult::Rejected,
        decoded: Vec::with_capacity(winners.len()),
    };

    for ballot in winners {
        let choice = sealing_key(&ballot.validator)
            .map(|first| encrypt_key_derive(&first, proposal_id))
            .and_then(|key| unseal_answer(&key, &ballot.encrypted_answer).ok());

        let disposition = match choice {
            Some(choice) => {
                match choice {
                    VoteChoice::Yes => outcome.yes += 1,
                    VoteChoice::No => outcome.no += 1,
                    VoteChoice::Blank => outcome.blank += 1,
                }
                BallotDisposition::Counted(choice)
            }
            None => {
                outcome.reject += 1;
                BallotDisposition::Reject(BallotRejectReason::UnsealFailed)
            }
        };
        outcome.decoded.push((ballot, disposition));
    }

    let voters = outcome.yes + outcome.no + outcome.blank;
    let quorum = committee_size.div_ceil(3);
    if outcome.yes > outcome.no && voters >= quorum {
        outcome.result = ProposalResult::Passed;
    }

    outcome
}

#[cfg(test)]
mod tests {
    use basilica_types::crypto::seal_answer;
    use basilica_types::{hash, Amount};

    use super::*;

    #[test]
    fn test_status_follows_height() {
        let status =
            |h: u64| status_for_height(Height::new(10), Height::new(15), 7, Height::new(h));

        assert_eq!(status(9), ProposalStatus::Pending);
        assert_eq!(status(10), ProposalStatus::Voting);
        assert_eq!(status(15), ProposalStatus::Voting);
        assert_eq!(status(16), ProposalStatus::CountingVotes);
        assert_eq!(status(21), ProposalStatus::CountingVotes);
        assert_eq!(status(22), ProposalStatus::Closed);
    }

    fn ballot_record(validator: u8, height: u64, sequence: u32, answer: Vec<u8>) -> BallotRecord {
        BallotRecord {
            proposal_id: "p".into(),
            validator: Address::new([validator; 20]),
            height: Height::new(height),
            tx_index: 0,
            tx_hash: hash(&[validator]),
            sequence,
            encrypted_answer: answer,
            disposition: BallotDisposition::Accepted,
        }
    }

    #[test]
    fn test_select_winners_prefers_higher_sequence_then_height() {
        let early = ballot_record(1, 10, 0, vec![]);
        let revote = ballot_record(1, 12, 1, vec![]);
        let mut same_seq_later = ballot_record(1, 13, 1, vec![]);
        same_seq_later.tx_hash = hash(b"later");

        let winners = select_winners(&[early, revote, same_seq_later.clone()]);
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].tx_hash, same_seq_later.tx_hash);
    }

    #[test]
    fn test_select_winners_skips_rejects() {
        let mut rejected = ballot_record(1, 10, 5, vec![]);
        rejected.disposition = BallotDisposition::Reject(BallotRejectReason::OutOfWindow);
        let accepted = ballot_record(1, 11, 0, vec![]);

        let winners = select_winners(&[rejected, accepted.clone()]);
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].sequence, accepted.sequence);
    }

    #[test]
    fn test_tally_majority_and_quorum() {
        let first = hash(b"preimage");
        let key = encrypt_key_derive(&first, "p");
        let sealed = |choice| seal_answer(&key, choice, &[1; 8]);

        let winners = vec![
            ballot_record(1, 10, 0, sealed(VoteChoice::Yes)),
            ballot_record(2, 11, 0, sealed(VoteChoice::No)),
            ballot_record(3, 12, 0, sealed(VoteChoice::Blank)),
            ballot_record(4, 13, 0, sealed(VoteChoice::Yes)),
        ];

        let outcome = tally("p", winners, 6, |_| Some(first));
        assert_eq!((outcome.yes, outcome.no, outcome.blank), (2, 1, 1));
        assert_eq!(outcome.result, ProposalResult::Passed);
    }

    #[test]
    fn test_tally_rejects_on_no_majority() {
        let first = hash(b"preimage");
        let key = encrypt_key_derive(&first, "p");
        let sealed = |choice| seal_answer(&key, choice, &[1; 8]);

        let winners = vec![
            ballot_record(1, 10, 0, sealed(VoteChoice::Yes)),
            ballot_record(2, 11, 0, sealed(VoteChoice::No)),
            ballot_record(3, 12, 0, sealed(VoteChoice::No)),
            ballot_record(4, 13, 0, sealed(VoteChoice::Blank)),
        ];

        let outcome = tally("p", winners, 6, |_| Some(first));
        assert_eq!(outcome.result, ProposalResult::Rejected);
    }

    #[test]
    fn test_tally_needs_quorum() {
        let first = hash(b"preimage");
        let key = encrypt_key_derive(&first, "p");

        // One YES out of a 6-member committee: majority but no quorum.
        let winners = vec![ballot_record(1, 10, 0, seal_answer(&key, VoteChoice::Yes, &[1; 8]))];
        let outcome = tally("p", winners, 6, |_| Some(first));
        assert_eq!(outcome.result, ProposalResult::Rejected);
    }

    #[test]
    fn test_tally_marks_unopenable_ballots() {
        let winners = vec![ballot_record(1, 10, 0, vec![1, 2, 3])];
        let outcome = tally("p", winners, 3, |_| None);
        assert_eq!(outcome.reject, 1);
        assert_eq!(
            outcome.decoded[0].1,
            BallotDisposition::Reject(BallotRejectReason::UnsealFailed)
        );
    }

    // Exercise the full judge path with real keys.
    mod judging {
        use basilica_types::payload::VoterCard;
        use basilica_types::preimage::hash_chain;
        use basilica_types::{PrivateKey, RawSignature};
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        use super::*;

        fn proposal() -> ProposalRecord {
            use basilica_types::payload::{ProposalPayload, ProposalType};
            ProposalRecord {
                payload: ProposalPayload {
                    app_name: "votera".into(),
                    proposal_type: ProposalType::Fund,
                    proposal_id: "p".into(),
                    title: "t".into(),
                    vote_start_height: Height::new(10),
                    vote_end_height: Height::new(15),
                    doc_hash: hash(b"doc"),
                    fund_amount: Amount::new(1),
                    proposal_fee: Amount::new(1),
                    vote_fee: Amount::new(1),
                    fee_tx_hash: hash(b"fee"),
                    proposer_address: Address::default(),
                    fee_destination: Address::default(),
                },
                tx_hash: hash(b"proposal"),
                created_at: Height::new(5),
                status: ProposalStatus::Voting,
                result: ProposalResult::Pending,
                yes_count: 0,
                no_count: 0,
                blank_count: 0,
                reject_count: 0,
                committee_size: 0,
                metadata: None,
            }
        }

        fn signed_ballot(validator: &PrivateKey, temporary: &PrivateKey) -> BallotPayload {
            let mut ballot = BallotPayload {
                app_name: "votera".into(),
                proposal_id: "p".into(),
                encrypted_answer: vec![0; 25],
                voter_card: VoterCard {
                    validator_key: validator.public_key().to_sec1_bytes().to_vec(),
                    temporary_key: temporary.public_key().to_sec1_bytes().to_vec(),
                    expires: "2026-12-31T00:00:00Z".into(),
                    signature: RawSignature::ZERO,
                },
                sequence: 0,
                signature: RawSignature::ZERO,
            };
            ballot.voter_card.signature = validator.sign(&ballot.voter_card.digest()).into();
            ballot.signature = temporary.sign(&ballot.digest()).into();
            ballot
        }

        fn committee_for(validator: &PrivateKey) -> Vec<EnrollmentRecord> {
            let chain = hash_chain(hash(b"seed"), 20);
            vec![EnrollmentRecord {
                utxo_key: hash(b"stake"),
                address: Address::from_public_key(&validator.public_key()),
                commitment: chain[0],
                cycle_length: 20,
                enrolled_at: Height::new(0),
                slot_index: 0,
                tip_hash: chain[12],
                tip_height: Height::new(12),
            }]
        }

        #[test]
        fn test_valid_ballot_is_accepted() {
            let mut rng = StdRng::seed_from_u64(11);
            let validator = PrivateKey::generate(&mut rng);
            let temporary = PrivateKey::generate(&mut rng);
            let ballot = signed_ballot(&validator, &temporary);
            let committee = committee_for(&validator);

            let (address, disposition) =
                judge_ballot(&ballot, Some(&proposal()), Height::new(12), &committee, None);
            assert_eq!(address, committee[0].address);
            assert_eq!(disposition, BallotDisposition::Accepted);
        }

        #[test]
        fn test_window_boundaries() {
            let mut rng = StdRng::seed_from_u64(12);
            let validator = PrivateKey::generate(&mut rng);
            let temporary = PrivateKey::generate(&mut rng);
            let ballot = signed_ballot(&validator, &temporary);
            let committee = committee_for(&validator);

            for (height, accept) in [(9, false), (10, true), (15, true), (16, false)] {
                let (_, disposition) = judge_ballot(
                    &ballot,
                    Some(&proposal()),
                    Height::new(height),
                    &committee,
                    None,
                );
                if accept {
                    assert_eq!(disposition, BallotDisposition::Accepted, "h={height}");
                } else {
                    assert_eq!(
                        disposition,
                        BallotDisposition::Reject(BallotRejectReason::OutOfWindow),
                        "h={height}"
                    );
                }
            }
        }

        #[test]
        fn test_forged_card_rejected() {
            let mut rng = StdRng::seed_from_u64(13);
            let validator = PrivateKey::generate(&mut rng);
            let temporary = PrivateKey::generate(&mut rng);
            let mut ballot = signed_ballot(&validator, &temporary);
            ballot.voter_card.expires = "1970-01-01T00:00:00Z".into();

            let (_, disposition) = judge_ballot(
                &ballot,
                Some(&proposal()),
                Height::new(12),
                &committee_for(&validator),
                None,
            );
            assert_eq!(
                disposition,
                BallotDisposition::Reject(BallotRejectReason::BadCardSig)
            );
        }

        #[test]
        fn test_tampered_ballot_rejected() {
            let mut rng = StdRng::seed_from_u64(14);
            let validator = PrivateKey::generate(&mut rng);
            let temporary = PrivateKey::generate(&mut rng);
            let mut ballot = signed_ballot(&validator, &temporary);
            ballot.encrypted_answer[0] ^= 1;

            let (_, disposition) = judge_ballot(
                &ballot,
                Some(&proposal()),
                Height::new(12),
                &committee_for(&validator),
                None,
            );
            assert_eq!(
                disposition,
                BallotDisposition::Reject(BallotRejectReason::BadBallotSig)
            );
        }

        #[test]
        fn test_non_member_rejected() {
            let mut rng = StdRng::seed_from_u64(15);
            let validator = PrivateKey::generate(&mut rng);
            let temporary = PrivateKey::generate(&mut rng);
            let outsider = PrivateKey::generate(&mut rng);
            let ballot = signed_ballot(&outsider, &temporary);

            let (_, disposition) = judge_ballot(
                &ballot,
                Some(&proposal()),
                Height::new(12),
                &committee_for(&validator),
                None,
            );
            assert_eq!(
                disposition,
                BallotDisposition::Reject(BallotRejectReason::NotValidator)
            );
        }

        #[test]
        fn test_stale_sequence_rejected() {
            let mut rng = StdRng::seed_from_u64(16);
            let validator = PrivateKey::generate(&mut rng);
            let temporary = PrivateKey::generate(&mut rng);
            let ballot = signed_ballot(&validator, &temporary);
            let committee = committee_for(&validator);

            let (_, with_equal) =
                judge_ballot(&ballot, Some(&proposal()), Height::new(12), &committee, Some(0));
            assert_eq!(with_equal, BallotDisposition::Accepted);

            let (_, with_higher) =
                judge_ballot(&ballot, Some(&proposal()), Height::new(12), &committee, Some(1));
            assert_eq!(
                with_higher,
                BallotDisposition::Reject(BallotRejectReason::StaleSequence)
            );
        }

        #[test]
        fn test_unknown_proposal_rejected() {
            let mut rng = StdRng::seed_from_u64(17);
            let validator = PrivateKey::generate(&mut rng);
            let temporary = PrivateKey::generate(&mut rng);
            let ballot = signed_ballot(&validator, &temporary);

            let (_, disposition) = judge_ballot(
                &ballot,
                None,
                Height::new(12),
                &committee_for(&validator),
                None,
            );
            assert_eq!(
                disposition,
                BallotDisposition::Reject(BallotRejectReason::UnknownProposal)
            );
        }
    }
}
