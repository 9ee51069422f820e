//! Swiss system pairing.
//!
//! Only the first round is known at start time. Each later round is paired
//! from the current standings once the previous round is fully finalized.

use log::debug;
use std::collections::{HashSet, VecDeque};

use super::{
    GenerationContext, GenerationError, GenerationResult, SessionGenerator, check_common,
    pack_fields, seeded_order,
};
use crate::tournament::{
    MatchNumber, MatchResult, NewSession, ParticipantId, Session, Slot, Stage, TournamentFormat,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwissGenerator;

/// Who has met whom, and who has had a bye, in earlier rounds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingHistory {
    met: HashSet<(ParticipantId, ParticipantId)>,
    byes: HashSet<ParticipantId>,
}

impl PairingHistory {
    /// Collect history from every generated session, finalized or not
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut history = Self::default();
        for session in sessions {
            if session.result == Some(MatchResult::Bye) {
                history.byes.extend(session.participants());
            } else if let Some((a, b)) = session.pairing() {
                history.record(a, b);
            }
        }
        history
    }

    pub fn record(&mut self, a: ParticipantId, b: ParticipantId) {
        self.met.insert((a.min(b), a.max(b)));
    }

    pub fn record_bye(&mut self, participant: ParticipantId) {
        self.byes.insert(participant);
    }

    pub fn have_met(&self, a: ParticipantId, b: ParticipantId) -> bool {
        self.met.contains(&(a.min(b), a.max(b)))
    }

    pub fn had_bye(&self, participant: ParticipantId) -> bool {
        self.byes.contains(&participant)
    }
}

/// Pairs for one round plus the participant sitting out, if any
type RoundPairing = (Vec<(ParticipantId, ParticipantId)>, Option<ParticipantId>);

impl SwissGenerator {
    /// Pair the next round from the current standings
    ///
    /// `ranked` lists every participant with their score, best first.
    /// Participants are matched to the closest available score without
    /// repeating a pairing; an odd participant count gives a bye to the
    /// lowest-ranked participant who has not had one.
    pub fn next_round(
        &self,
        ranked: &[(ParticipantId, f64)],
        history: &PairingHistory,
        round: u32,
        first_match_number: MatchNumber,
        ctx: &GenerationContext<'_>,
    ) -> GenerationResult<Vec<NewSession>> {
        if round > ctx.number_of_rounds {
            return Err(GenerationError::RoundLimitReached {
                max: ctx.number_of_rounds,
            });
        }

        let (pairs, bye) = pair_by_score(ranked, history)
            .ok_or(GenerationError::SwissPairingExhausted { round })?;
        debug!("Swiss round {round}: {} pairs, bye {bye:?}", pairs.len());

        Ok(round_sessions(&pairs, bye, round, first_match_number, ctx))
    }
}

impl SessionGenerator for SwissGenerator {
    fn format(&self) -> TournamentFormat {
        TournamentFormat::Swiss
    }

    fn minimum_roster(&self) -> usize {
        2
    }

    fn validate(&self, roster: &[ParticipantId], ctx: &GenerationContext<'_>) -> GenerationResult<()> {
        check_common(self, roster, ctx)?;

        let max_rounds = roster.len() as u32 - 1;
        if ctx.number_of_rounds == 0 || ctx.number_of_rounds > max_rounds {
            return Err(GenerationError::InvalidRoundCount {
                rounds: ctx.number_of_rounds,
                reason: format!("must be between 1 and {max_rounds} for {} participants", roster.len()),
            });
        }
        Ok(())
    }

    /// Round one only: top half of the seeding meets the bottom half
    fn generate(
        &self,
        roster: &[ParticipantId],
        ctx: &GenerationContext<'_>,
    ) -> GenerationResult<Vec<NewSession>> {
        self.validate(roster, ctx)?;

        let mut order = seeded_order(roster, &ctx.config.seeding);
        let bye = if order.len() % 2 == 1 { order.pop() } else { None };
        let half = order.len() / 2;
        let pairs: Vec<(ParticipantId, ParticipantId)> = order[..half]
            .iter()
            .copied()
            .zip(order[half..].iter().copied())
            .collect();

        Ok(round_sessions(&pairs, bye, 1, 1, ctx))
    }
}

fn round_sessions(
    pairs: &[(ParticipantId, ParticipantId)],
    bye: Option<ParticipantId>,
    round: u32,
    first_match_number: MatchNumber,
    ctx: &GenerationContext<'_>,
) -> Vec<NewSession> {
    let mut match_number = first_match_number;
    let mut sessions = Vec::with_capacity(pairs.len() + 1);
    for &(home, away) in pairs {
        sessions.push(NewSession::scheduled(
            match_number,
            round,
            Stage::Swiss,
            vec![Slot::fixed(home), Slot::fixed(away)],
            ctx.venue,
        ));
        match_number += 1;
    }
    pack_fields(&mut sessions, ctx.parallel_fields());

    if let Some(participant) = bye {
        let mut session = NewSession::bye(match_number, round, participant, ctx.venue);
        session.field = 0;
        session.time_slot = 0;
        sessions.push(session);
    }
    sessions
}

fn pair_by_score(ranked: &[(ParticipantId, f64)], history: &PairingHistory) -> Option<RoundPairing> {
    if ranked.len() % 2 == 0 {
        return match_pool(ranked, history).map(|pairs| (pairs, None));
    }

    // Lowest-ranked eligible participant first; move up when the rest cannot pair
    for skip in (0..ranked.len()).rev() {
        let candidate = ranked[skip].0;
        if history.had_bye(candidate) {
            continue;
        }
        let pool: Vec<(ParticipantId, f64)> = ranked
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != skip)
            .map(|(_, &entry)| entry)
            .collect();
        if let Some(pairs) = match_pool(&pool, history) {
            return Some((pairs, Some(candidate)));
        }
    }
    None
}

/// Pair the highest unpaired participant with the nearest score first
///
/// A partner is taken only if everyone left can still be paired without a
/// rematch, which a maximum matching over the unmet pairs decides. The
/// result is the first such choice in standings order.
fn match_pool(
    pool: &[(ParticipantId, f64)],
    history: &PairingHistory,
) -> Option<Vec<(ParticipantId, ParticipantId)>> {
    let graph = UnmetGraph::new(pool, history);
    let mut active = vec![true; pool.len()];
    let mut mate = vec![None; pool.len()];
    if !graph.complete_matching(&active, &mut mate) {
        return None;
    }

    let mut pairs = Vec::with_capacity(pool.len() / 2);
    while let Some(first) = active.iter().position(|&a| a) {
        active[first] = false;
        let (player, score) = pool[first];
        let mut candidates: Vec<usize> = graph.neighbours(first, &active).collect();
        // Stable: equal distance keeps standings order
        candidates.sort_by(|&a, &b| (score - pool[a].1).abs().total_cmp(&(score - pool[b].1).abs()));

        let mut chosen = None;
        for j in candidates {
            active[j] = false;
            let mut trial = mate.clone();
            for v in [first, j] {
                if let Some(m) = trial[v].take() {
                    trial[m] = None;
                }
            }
            if graph.complete_matching(&active, &mut trial) {
                mate = trial;
                chosen = Some(j);
                break;
            }
            active[j] = true;
        }
        pairs.push((player, pool[chosen?].0));
    }
    Some(pairs)
}

/// Pool indices that may still meet, as an adjacency matrix
struct UnmetGraph {
    allowed: Vec<Vec<bool>>,
}

impl UnmetGraph {
    fn new(pool: &[(ParticipantId, f64)], history: &PairingHistory) -> Self {
        let allowed = pool
            .iter()
            .enumerate()
            .map(|(i, &(a, _))| {
                pool.iter()
                    .enumerate()
                    .map(|(j, &(b, _))| i != j && !history.have_met(a, b))
                    .collect()
            })
            .collect();
        Self { allowed }
    }

    fn len(&self) -> usize {
        self.allowed.len()
    }

    fn neighbours<'a>(&'a self, v: usize, active: &'a [bool]) -> impl Iterator<Item = usize> + 'a {
        (0..self.len()).filter(move |&u| active[u] && self.allowed[v][u])
    }

    /// Grow `mate` into a perfect matching of the active vertices
    ///
    /// Returns false as soon as some vertex has no augmenting path, since it
    /// then stays unmatched in every maximum matching.
    fn complete_matching(&self, active: &[bool], mate: &mut [Option<usize>]) -> bool {
        (0..self.len())
            .filter(|&root| active[root])
            .all(|root| mate[root].is_some() || BlossomSearch::new(self, active).augment(root, mate))
    }
}

/// One augmenting-path search of Edmonds' blossom algorithm
struct BlossomSearch<'a> {
    graph: &'a UnmetGraph,
    active: &'a [bool],
    base: Vec<usize>,
    parent: Vec<Option<usize>>,
    in_tree: Vec<bool>,
    queue: VecDeque<usize>,
}

impl<'a> BlossomSearch<'a> {
    fn new(graph: &'a UnmetGraph, active: &'a [bool]) -> Self {
        let n = graph.len();
        Self {
            graph,
            active,
            base: (0..n).collect(),
            parent: vec![None; n],
            in_tree: vec![false; n],
            queue: VecDeque::new(),
        }
    }

    /// Match `root` by flipping an augmenting path; false if none exists
    fn augment(mut self, root: usize, mate: &mut [Option<usize>]) -> bool {
        self.in_tree[root] = true;
        self.queue.push_back(root);

        while let Some(v) = self.queue.pop_front() {
            let neighbours: Vec<usize> = self.graph.neighbours(v, self.active).collect();
            for to in neighbours {
                if self.base[v] == self.base[to] || mate[v] == Some(to) {
                    continue;
                }
                let even = to == root || mate[to].is_some_and(|m| self.parent[m].is_some());
                if even {
                    self.contract(v, to, mate);
                } else if self.parent[to].is_none() {
                    self.parent[to] = Some(v);
                    match mate[to] {
                        None => {
                            self.flip(to, mate);
                            return true;
                        }
                        Some(next) => {
                            self.in_tree[next] = true;
                            self.queue.push_back(next);
                        }
                    }
                }
            }
        }
        false
    }

    fn contract(&mut self, v: usize, to: usize, mate: &[Option<usize>]) {
        let lca = self.common_base(v, to, mate);
        let mut in_blossom = vec![false; self.graph.len()];
        self.mark_path(v, lca, to, mate, &mut in_blossom);
        self.mark_path(to, lca, v, mate, &mut in_blossom);
        for i in 0..self.graph.len() {
            if in_blossom[self.base[i]] {
                self.base[i] = lca;
                if !self.in_tree[i] {
                    self.in_tree[i] = true;
                    self.queue.push_back(i);
                }
            }
        }
    }

    fn common_base(&self, mut a: usize, mut b: usize, mate: &[Option<usize>]) -> usize {
        let mut seen = vec![false; self.graph.len()];
        loop {
            a = self.base[a];
            seen[a] = true;
            match mate[a].and_then(|m| self.parent[m]) {
                Some(up) => a = up,
                None => break,
            }
        }
        loop {
            b = self.base[b];
            if seen[b] {
                return b;
            }
            match mate[b].and_then(|m| self.parent[m]) {
                Some(up) => b = up,
                None => return b,
            }
        }
    }

    fn mark_path(
        &mut self,
        mut v: usize,
        lca: usize,
        mut child: usize,
        mate: &[Option<usize>],
        in_blossom: &mut [bool],
    ) {
        while self.base[v] != lca {
            let Some(m) = mate[v] else { break };
            in_blossom[self.base[v]] = true;
            in_blossom[self.base[m]] = true;
            self.parent[v] = Some(child);
            child = m;
            match self.parent[m] {
                Some(up) => v = up,
                None => break,
            }
        }
    }

    fn flip(&self, end: usize, mate: &mut [Option<usize>]) {
        let mut v = Some(end);
        while let Some(x) = v {
            let Some(up) = self.parent[x] else { break };
            v = mate[up];
            mate[x] = Some(up);
            mate[up] = Some(x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::{FormatConfig, ScoringMode};

    fn ctx(config: &FormatConfig, rounds: u32) -> GenerationContext<'_> {
        GenerationContext {
            scoring_mode: ScoringMode::HeadToHead,
            number_of_rounds: rounds,
            config,
            venue: "TBD",
            default_parallel_fields: 1,
        }
    }

    fn pairs_of(sessions: &[NewSession]) -> Vec<Vec<i64>> {
        sessions.iter().map(|s| s.participants().collect()).collect()
    }

    #[test]
    fn test_first_round_top_half_meets_bottom_half() {
        let config = FormatConfig::default();
        let sessions = SwissGenerator
            .generate(&[1, 2, 3, 4, 5, 6], &ctx(&config, 3))
            .expect("valid swiss");
        assert_eq!(pairs_of(&sessions), vec![vec![1, 4], vec![2, 5], vec![3, 6]]);
    }

    #[test]
    fn test_first_round_bye_for_last_seed() {
        let config = FormatConfig::default();
        let sessions = SwissGenerator
            .generate(&[1, 2, 3, 4, 5], &ctx(&config, 2))
            .expect("valid swiss");
        let bye = sessions.last().expect("bye session");
        assert_eq!(bye.result, Some(MatchResult::Bye));
        assert_eq!(bye.participants().collect::<Vec<_>>(), vec![5]);
        assert_eq!(sessions.len(), 3);
    }

    #[test]
    fn test_round_count_validation() {
        let config = FormatConfig::default();
        for rounds in [0, 4] {
            assert!(matches!(
                SwissGenerator.validate(&[1, 2, 3, 4], &ctx(&config, rounds)),
                Err(GenerationError::InvalidRoundCount { .. })
            ));
        }
        assert!(SwissGenerator.validate(&[1, 2, 3, 4], &ctx(&config, 3)).is_ok());
    }

    #[test]
    fn test_nearest_score_without_rematch() {
        let config = FormatConfig::default();
        let mut history = PairingHistory::default();
        history.record(1, 4);
        history.record(2, 3);

        let ranked = [(1, 1.0), (2, 1.0), (3, 0.0), (4, 0.0)];
        let sessions = SwissGenerator
            .next_round(&ranked, &history, 2, 3, &ctx(&config, 3))
            .expect("pairable");
        assert_eq!(pairs_of(&sessions), vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(sessions[0].match_number, 3);
    }

    #[test]
    fn test_avoids_forced_rematch() {
        let config = FormatConfig::default();
        let mut history = PairingHistory::default();
        // Greedy 1-2 would leave 3-4, which already happened
        history.record(3, 4);

        let ranked = [(1, 2.0), (2, 2.0), (3, 1.0), (4, 1.0)];
        let sessions = SwissGenerator
            .next_round(&ranked, &history, 2, 1, &ctx(&config, 3))
            .expect("pairable");
        for pair in pairs_of(&sessions) {
            assert!(!history.have_met(pair[0], pair[1]));
        }
        assert_eq!(pairs_of(&sessions), vec![vec![1, 3], vec![2, 4]]);
    }

    #[test]
    fn test_bye_skips_previous_recipient() {
        let config = FormatConfig::default();
        let mut history = PairingHistory::default();
        history.record_bye(5);

        let ranked = [(1, 1.0), (2, 1.0), (3, 1.0), (4, 0.0), (5, 1.0)];
        let sessions = SwissGenerator
            .next_round(&ranked, &history, 2, 1, &ctx(&config, 4))
            .expect("pairable");
        let bye = sessions.iter().find(|s| s.result == Some(MatchResult::Bye)).expect("bye");
        assert_eq!(bye.participants().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_exhausted_pairing_is_refused() {
        let config = FormatConfig::default();
        let mut history = PairingHistory::default();
        history.record(1, 2);

        let result = SwissGenerator.next_round(&[(1, 1.0), (2, 0.0)], &history, 2, 2, &ctx(&config, 3));
        assert_eq!(result, Err(GenerationError::SwissPairingExhausted { round: 2 }));
    }

    #[test]
    fn test_round_limit() {
        let config = FormatConfig::default();
        let result = SwissGenerator.next_round(
            &[(1, 0.0), (2, 0.0)],
            &PairingHistory::default(),
            3,
            1,
            &ctx(&config, 2),
        );
        assert_eq!(result, Err(GenerationError::RoundLimitReached { max: 2 }));
    }

    /// Everyone in the top group has met everyone in the bottom group
    fn split_history(top: std::ops::Range<i64>, bottom: std::ops::Range<i64>) -> PairingHistory {
        let mut history = PairingHistory::default();
        for a in top {
            for b in bottom.clone() {
                history.record(a, b);
            }
        }
        history
    }

    #[test]
    fn test_exhaustion_is_found_quickly_on_large_pools() {
        let config = FormatConfig::default();
        // Two odd groups that may only meet inside themselves cannot all pair
        for (n, split) in [(32_i64, 15_i64), (48, 23), (64, 31)] {
            let history = split_history(1..split + 1, split + 1..n + 1);
            let ranked: Vec<(i64, f64)> = (1..=n).map(|p| (p, (n - p) as f64)).collect();

            let started = std::time::Instant::now();
            let result = SwissGenerator.next_round(&ranked, &history, 2, 1, &ctx(&config, n as u32 - 1));
            assert_eq!(result, Err(GenerationError::SwissPairingExhausted { round: 2 }));
            assert!(started.elapsed() < std::time::Duration::from_secs(1), "n = {n}");
        }
    }

    #[test]
    fn test_odd_pool_with_blocked_groups_still_pairs() {
        let config = FormatConfig::default();
        // 33 players: the bye must come from the odd group of 15
        let history = split_history(1..16, 16..34);
        let ranked: Vec<(i64, f64)> = (1..=33).map(|p| (p, 0.0)).collect();

        let sessions = SwissGenerator
            .next_round(&ranked, &history, 2, 1, &ctx(&config, 32))
            .expect("pairable");
        let bye = sessions.iter().find(|s| s.result == Some(MatchResult::Bye)).expect("bye");
        assert_eq!(bye.participants().collect::<Vec<_>>(), vec![15]);
        for pair in pairs_of(&sessions).iter().filter(|p| p.len() == 2) {
            assert!(!history.have_met(pair[0], pair[1]));
        }
        assert_eq!(sessions.len(), 17);
    }

    #[test]
    fn test_nearest_partner_skipped_when_rest_cannot_pair() {
        let config = FormatConfig::default();
        // Unmet pairs left: 1-2, 1-3, 2-4, 5-6. Taking 1-2 strands 3 and 4
        let mut history = PairingHistory::default();
        for a in 1..=6 {
            for b in a + 1..=6 {
                if ![(1, 2), (1, 3), (2, 4), (5, 6)].contains(&(a, b)) {
                    history.record(a, b);
                }
            }
        }
        let ranked = [(1, 5.0), (2, 4.0), (3, 3.0), (4, 2.0), (5, 1.0), (6, 0.0)];
        let sessions = SwissGenerator
            .next_round(&ranked, &history, 2, 1, &ctx(&config, 5))
            .expect("pairable");
        assert_eq!(pairs_of(&sessions), vec![vec![1, 3], vec![2, 4], vec![5, 6]]);
    }
}
