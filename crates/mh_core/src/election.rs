//! Commander election: candidate rotation, tally, tie-break, handoff.
//!
//! Candidates are re-chosen every Voting phase by walking the occupied seats
//! starting after the previous commander (or from a random seat when there is
//! none). The tally runs at Voting-phase end over confirmed votes only.

use crate::replication::Replicated;
use crate::types::PlayerId;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Commander plus the current candidate pair, replicated as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElectionRecord {
    pub commander: Option<PlayerId>,
    pub candidate_a: Option<PlayerId>,
    pub candidate_b: Option<PlayerId>,
}

/// Result of grouping confirmed votes by target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyOutcome {
    /// Targets with their counts, sorted descending by count.
    pub counts: Vec<(PlayerId, usize)>,
    /// The unique maximum, or `None` when no votes exist or the top is tied.
    pub top: Option<PlayerId>,
    /// Every target sharing the maximum count.
    pub leaders: Vec<PlayerId>,
}

#[derive(Debug)]
pub struct CommanderElection {
    pub record: Replicated<ElectionRecord>,
}

impl Default for CommanderElection {
    fn default() -> Self {
        Self::new()
    }
}

impl CommanderElection {
    pub fn new() -> Self {
        Self { record: Replicated::server_owned(ElectionRecord::default()) }
    }

    pub fn commander(&self) -> Option<PlayerId> {
        self.record.get().commander
    }

    pub fn candidates(&self) -> (Option<PlayerId>, Option<PlayerId>) {
        let record = self.record.get();
        (record.candidate_a, record.candidate_b)
    }

    /// Pick the candidate pair from the occupied seats (in seat order).
    /// Starts just after the previous commander's seat when they are still
    /// seated, otherwise at a uniformly random seat; the pair is that seat
    /// and the next one, wrapping.
    pub fn choose_candidates<R: Rng>(
        &mut self,
        seats: &[PlayerId],
        rng: &mut R,
    ) -> Option<(PlayerId, PlayerId)> {
        if seats.is_empty() {
            log::warn!("no occupied seats, skipping candidate selection");
            let mut record = *self.record.get();
            record.candidate_a = None;
            record.candidate_b = None;
            self.record.set_server(record);
            return None;
        }
        let n = seats.len();
        let previous = self.record.get().commander;
        let start = match previous.and_then(|c| seats.iter().position(|&p| p == c)) {
            Some(idx) => (idx + 1) % n,
            None => rng.gen_range(0..n),
        };
        let a = seats[start];
        let b = seats[(start + 1) % n];
        let mut record = *self.record.get();
        record.candidate_a = Some(a);
        record.candidate_b = Some(b);
        self.record.set_server(record);
        Some((a, b))
    }

    /// Group confirmed votes by target and sort descending by count. Ties in
    /// count order by target id so the tally itself is deterministic.
    pub fn tally<I: Iterator<Item = PlayerId>>(votes: I) -> TallyOutcome {
        let mut grouped: HashMap<PlayerId, usize> = HashMap::new();
        for target in votes {
            *grouped.entry(target).or_insert(0) += 1;
        }
        let mut counts: Vec<(PlayerId, usize)> = grouped.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let (top, leaders) = match counts.first() {
            None => (None, Vec::new()),
            Some(&(_, max)) => {
                let leaders: Vec<PlayerId> =
                    counts.iter().filter(|&&(_, c)| c == max).map(|&(p, _)| p).collect();
                let top = if leaders.len() == 1 { Some(leaders[0]) } else { None };
                (top, leaders)
            }
        };
        TallyOutcome { counts, top, leaders }
    }

    /// Resolve the tally to a winner:
    /// - no votes → pick between the two candidates by random index,
    /// - unique maximum → that target,
    /// - tie at the maximum → uniform pick among the leaders,
    /// then substitute for liveness: a winner who is no longer connected is
    /// replaced by the other candidate, and if neither candidate is live, by
    /// a uniformly random live player.
    pub fn resolve_winner<R: Rng>(
        &self,
        outcome: &TallyOutcome,
        live: &[PlayerId],
        rng: &mut R,
    ) -> Option<PlayerId> {
        let record = *self.record.get();
        let raw = if outcome.counts.is_empty() {
            // TODO: product call pending on whether a no-vote election should
            // coin-flip; the exclusive upper bound makes this always index 0,
            // i.e. always candidate A.
            let pick = rng.gen_range(0..1);
            if pick == 0 { record.candidate_a } else { record.candidate_b }
        } else if outcome.top.is_some() {
            outcome.top
        } else {
            outcome.leaders.choose(rng).copied()
        };

        match raw {
            Some(winner) if live.contains(&winner) => Some(winner),
            _ => {
                let other = if raw == record.candidate_a {
                    record.candidate_b
                } else {
                    record.candidate_a
                };
                match other {
                    Some(candidate) if live.contains(&candidate) => Some(candidate),
                    _ => {
                        log::warn!("no live candidate, electing a random live player");
                        live.choose(rng).copied()
                    }
                }
            }
        }
    }

    /// Record the new commander. The caller clears the previous commander's
    /// status before this runs.
    pub fn install(&mut self, winner: Option<PlayerId>) -> bool {
        let mut record = *self.record.get();
        record.commander = winner;
        self.record.set_server(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn seats(n: u32) -> Vec<PlayerId> {
        (0..n).map(PlayerId).collect()
    }

    #[test]
    fn test_rotation_continues_after_previous_commander() {
        let mut election = CommanderElection::new();
        election.install(Some(PlayerId(1)));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let pair = election.choose_candidates(&seats(4), &mut rng);
        assert_eq!(pair, Some((PlayerId(2), PlayerId(3))));
    }

    #[test]
    fn test_rotation_wraps_past_last_seat() {
        let mut election = CommanderElection::new();
        election.install(Some(PlayerId(3)));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let pair = election.choose_candidates(&seats(4), &mut rng);
        assert_eq!(pair, Some((PlayerId(0), PlayerId(1))));
    }

    #[test]
    fn test_tied_tally_has_no_top_and_restricted_leaders() {
        let a = PlayerId(10);
        let b = PlayerId(11);
        let c = PlayerId(12);
        let votes = [a, a, a, b, b, b, c];
        let outcome = CommanderElection::tally(votes.iter().copied());
        assert_eq!(outcome.top, None);
        assert_eq!(outcome.leaders, vec![a, b]);

        // Tie-break selection never leaves the leader set.
        let election = CommanderElection::new();
        let live = [a, b, c];
        for seed in 0..32 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let winner = election.resolve_winner(&outcome, &live, &mut rng).unwrap();
            assert!(winner == a || winner == b);
        }
    }

    #[test]
    fn test_unique_maximum_wins() {
        let votes = [PlayerId(1), PlayerId(1), PlayerId(2)];
        let outcome = CommanderElection::tally(votes.iter().copied());
        assert_eq!(outcome.top, Some(PlayerId(1)));
        assert_eq!(outcome.counts[0], (PlayerId(1), 2));
    }

    #[test]
    fn test_no_votes_always_resolves_to_candidate_a() {
        let mut election = CommanderElection::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        election.choose_candidates(&[PlayerId(0), PlayerId(1)], &mut rng);
        let (a, _) = election.candidates();
        let outcome = CommanderElection::tally(std::iter::empty());
        for seed in 0..32 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let winner =
                election.resolve_winner(&outcome, &[PlayerId(0), PlayerId(1)], &mut rng);
            assert_eq!(winner, a);
        }
    }

    #[test]
    fn test_dead_winner_substituted_by_other_candidate() {
        let mut election = CommanderElection::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        election.choose_candidates(&[PlayerId(0), PlayerId(1), PlayerId(2)], &mut rng);
        let (a, b) = election.candidates();
        let winner = a.unwrap();

        let votes = [winner, winner];
        let outcome = CommanderElection::tally(votes.iter().copied());
        // Winner disconnected; only the other candidate and a bystander stay.
        let live = [b.unwrap(), PlayerId(99)];
        let resolved = election.resolve_winner(&outcome, &live, &mut rng);
        assert_eq!(resolved, b);
    }

    #[test]
    fn test_no_live_candidate_falls_back_to_random_live_player() {
        let mut election = CommanderElection::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        election.choose_candidates(&[PlayerId(0), PlayerId(1)], &mut rng);
        let outcome = CommanderElection::tally([PlayerId(0)].iter().copied());
        let live = [PlayerId(7), PlayerId(8)];
        let resolved = election.resolve_winner(&outcome, &live, &mut rng).unwrap();
        assert!(live.contains(&resolved));
    }
}
