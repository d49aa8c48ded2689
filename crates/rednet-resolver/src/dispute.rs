//! Dispute records and the state machine they move through (spec §4.4).

use rednet_types::wire::{DisputeWinner, Vote, VoteResponse};
use rednet_types::{NodeId, Timestamp};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeStatus {
    Voting,
    Tallying,
    Resolved,
    Expired,
    InsufficientVotes,
}

#[derive(Debug, Clone)]
pub struct Dispute {
    pub id: String,
    pub domain: String,
    pub claimant: NodeId,
    pub claimed: NodeId,
    pub evidence: Value,
    pub created_at: Timestamp,
    pub votes: Vec<VoteResponse>,
    pub status: DisputeStatus,
    pub winner: Option<DisputeWinner>,
}

impl Dispute {
    pub fn new(id: String, domain: String, claimant: NodeId, claimed: NodeId, evidence: Value, created_at: Timestamp) -> Self {
        Self {
            id,
            domain,
            claimant,
            claimed,
            evidence,
            created_at,
            votes: Vec::new(),
            status: DisputeStatus::Voting,
            winner: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, DisputeStatus::Voting | DisputeStatus::Tallying)
    }

    /// Appends `vote` unless the dispute has already left the active
    /// (voting/tallying) window or the voter already voted. A vote arriving
    /// after resolution — late or duplicated — is silently ignored, per the
    /// dispute-monotonicity invariant.
    pub fn record_vote(&mut self, vote: VoteResponse) {
        if !self.is_active() {
            return;
        }
        if !self.votes.iter().any(|v| v.voter == vote.voter) {
            self.votes.push(vote);
        }
    }
}

/// The outcome of tallying a dispute's votes: weighted totals for each side
/// and, if decisive, the winner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tally {
    pub claimant_weight: f64,
    pub claimed_weight: f64,
    pub abstain_weight: f64,
    pub distinct_voters: u32,
    pub winner: Option<DisputeWinner>,
}

/// Weigh each vote by `trust_of` and decide a winner if one side's share of
/// the total exceeds `majority_threshold` (spec §4.4 "Tally").
pub fn tally_votes(
    votes: &[VoteResponse],
    trust_of: impl Fn(NodeId) -> f64,
    majority_threshold: f64,
) -> Tally {
    let mut claimant_weight = 0.0;
    let mut claimed_weight = 0.0;
    let mut abstain_weight = 0.0;

    for vote in votes {
        let weight = trust_of(vote.voter);
        match vote.vote {
            Vote::Claimant => claimant_weight += weight,
            Vote::Claimed => claimed_weight += weight,
            Vote::Abstain => abstain_weight += weight,
        }
    }

    let total = claimant_weight + claimed_weight + abstain_weight;
    let winner = if total > 0.0 && claimant_weight / total > majority_threshold {
        Some(DisputeWinner::Claimant)
    } else if total > 0.0 && claimed_weight / total > majority_threshold {
        Some(DisputeWinner::Claimed)
    } else {
        None
    };

    Tally {
        claimant_weight,
        claimed_weight,
        abstain_weight,
        distinct_voters: votes.len() as u32,
        winner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(voter: NodeId, v: Vote) -> VoteResponse {
        VoteResponse {
            dispute_id: "d1".into(),
            vote: v,
            voter,
        }
    }

    #[test]
    fn claimant_wins_with_supermajority() {
        let votes = vec![vote(1, Vote::Claimant), vote(2, Vote::Claimant), vote(3, Vote::Claimed)];
        let tally = tally_votes(&votes, |_| 1.0, 0.66);
        assert_eq!(tally.winner, Some(DisputeWinner::Claimant));
    }

    #[test]
    fn no_winner_when_under_threshold() {
        let votes = vec![vote(1, Vote::Claimant), vote(2, Vote::Claimed)];
        let tally = tally_votes(&votes, |_| 1.0, 0.66);
        assert_eq!(tally.winner, None);
    }

    #[test]
    fn trust_weighting_can_flip_a_nominal_majority() {
        let votes = vec![vote(1, Vote::Claimant), vote(2, Vote::Claimed)];
        let trust_of = |voter: NodeId| if voter == 1 { 0.1 } else { 0.9 };
        let tally = tally_votes(&votes, trust_of, 0.66);
        assert_eq!(tally.winner, Some(DisputeWinner::Claimed));
    }

    #[test]
    fn votes_after_resolution_are_ignored() {
        let mut dispute = Dispute::new("d1".into(), "news".into(), 1, 2, Value::Null, 0);
        dispute.record_vote(vote(1, Vote::Claimant));
        dispute.status = DisputeStatus::Resolved;

        dispute.record_vote(vote(2, Vote::Claimed));

        assert_eq!(dispute.votes.len(), 1);
        assert_eq!(dispute.votes[0].voter, 1);
    }

    #[test]
    fn votes_after_expiry_or_insufficient_votes_are_also_ignored() {
        for terminal in [DisputeStatus::Expired, DisputeStatus::InsufficientVotes] {
            let mut dispute = Dispute::new("d1".into(), "news".into(), 1, 2, Value::Null, 0);
            dispute.status = terminal;
            dispute.record_vote(vote(3, Vote::Claimant));
            assert!(dispute.votes.is_empty());
        }
    }
}
