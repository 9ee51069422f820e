//! Round-robin league.

use super::{GenerationContext, GenerationResult, SessionGenerator, check_common, pack_fields, seeded_order};
use crate::tournament::{NewSession, ParticipantId, Slot, Stage, TournamentFormat};

/// Everyone plays everyone once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeagueGenerator;

impl SessionGenerator for LeagueGenerator {
    fn format(&self) -> TournamentFormat {
        TournamentFormat::League
    }

    fn minimum_roster(&self) -> usize {
        2
    }

    fn validate(&self, roster: &[ParticipantId], ctx: &GenerationContext<'_>) -> GenerationResult<()> {
        check_common(self, roster, ctx)
    }

    fn generate(
        &self,
        roster: &[ParticipantId],
        ctx: &GenerationContext<'_>,
    ) -> GenerationResult<Vec<NewSession>> {
        self.validate(roster, ctx)?;

        let order = seeded_order(roster, &ctx.config.seeding);
        let mut sessions = Vec::new();
        let mut match_number = 1;
        for (round, pairs) in round_robin_rounds(&order).into_iter().enumerate() {
            for (home, away) in pairs {
                sessions.push(NewSession::scheduled(
                    match_number,
                    round as u32 + 1,
                    Stage::League,
                    vec![Slot::fixed(home), Slot::fixed(away)],
                    ctx.venue,
                ));
                match_number += 1;
            }
        }

        pack_fields(&mut sessions, ctx.parallel_fields());
        Ok(sessions)
    }
}

/// Circle-method round-robin
///
/// Returns one list of `(home, away)` pairs per round. The first participant
/// stays fixed while the rest rotate; an odd roster gets a phantom entry whose
/// opponent sits the round out. The fixed participant alternates home and away.
pub fn round_robin_rounds(participants: &[ParticipantId]) -> Vec<Vec<(ParticipantId, ParticipantId)>> {
    let mut ring: Vec<Option<ParticipantId>> = participants.iter().copied().map(Some).collect();
    if ring.len() % 2 == 1 {
        ring.push(None);
    }
    let n = ring.len();
    if n < 2 {
        return Vec::new();
    }

    let mut rounds = Vec::with_capacity(n - 1);
    for round in 0..n - 1 {
        let mut pairs = Vec::with_capacity(n / 2);
        for i in 0..n / 2 {
            if let (Some(a), Some(b)) = (ring[i], ring[n - 1 - i]) {
                let swap = if i == 0 { round % 2 == 1 } else { i % 2 == 1 };
                pairs.push(if swap { (b, a) } else { (a, b) });
            }
        }
        rounds.push(pairs);
        ring[1..].rotate_right(1);
    }
    rounds
}
