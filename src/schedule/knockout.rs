//! Single-elimination knockout.

use super::bracket::{self, BracketPlan};
use super::{GenerationContext, GenerationResult, SessionGenerator, check_common, pack_fields, seeded_order};
use crate::tournament::{NewSession, ParticipantId, SlotSource, TournamentFormat};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KnockoutGenerator;

impl SessionGenerator for KnockoutGenerator {
    fn format(&self) -> TournamentFormat {
        TournamentFormat::Knockout
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

        let entrants: Vec<SlotSource> = seeded_order(roster, &ctx.config.seeding)
            .into_iter()
            .map(|id| SlotSource::Participant { id })
            .collect();
        let plan = BracketPlan {
            first_match_number: 1,
            first_round: 1,
            third_place: ctx.config.third_place_match,
            venue: ctx.venue,
        };

        let mut sessions = bracket::build(&entrants, &plan);
        pack_fields(&mut sessions, ctx.parallel_fields());
        Ok(sessions)
    }
}
