//! Individual ranking: one solo attempt per participant per round.

use super::{
    GenerationContext, GenerationError, GenerationResult, SessionGenerator, check_common,
    pack_fields, seeded_order,
};
use crate::tournament::{NewSession, ParticipantId, Slot, Stage, TournamentFormat};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndividualRankingGenerator;

impl SessionGenerator for IndividualRankingGenerator {
    fn format(&self) -> TournamentFormat {
        TournamentFormat::IndividualRanking
    }

    fn minimum_roster(&self) -> usize {
        1
    }

    fn validate(&self, roster: &[ParticipantId], ctx: &GenerationContext<'_>) -> GenerationResult<()> {
        check_common(self, roster, ctx)?;
        if ctx.number_of_rounds == 0 {
            return Err(GenerationError::InvalidRoundCount {
                rounds: 0,
                reason: "at least one round is required".to_string(),
            });
        }
        Ok(())
    }

    fn generate(
        &self,
        roster: &[ParticipantId],
        ctx: &GenerationContext<'_>,
    ) -> GenerationResult<Vec<NewSession>> {
        self.validate(roster, ctx)?;

        let order = seeded_order(roster, &ctx.config.seeding);
        let mut sessions = Vec::with_capacity(order.len() * ctx.number_of_rounds as usize);
        let mut match_number = 1;
        for round in 1..=ctx.number_of_rounds {
            for &participant in &order {
                sessions.push(NewSession::scheduled(
                    match_number,
                    round,
                    Stage::Individual,
                    vec![Slot::fixed(participant)],
                    ctx.venue,
                ));
                match_number += 1;
            }
        }

        pack_fields(&mut sessions, ctx.parallel_fields());
        Ok(sessions)
    }
}
