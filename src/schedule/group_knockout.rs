//! Group stage feeding a knockout bracket.
//!
//! Groups play a round-robin; the top finishers of every group enter a bracket
//! whose first-round slots are `GroupPlacement` sources, resolved once each
//! group completes. Inside the bracket only head-to-head scoring applies.

use super::bracket::{self, BracketPlan};
use super::league::round_robin_rounds;
use super::{
    GenerationContext, GenerationError, GenerationResult, SessionGenerator, check_common,
    pack_fields, seeded_order,
};
use crate::tournament::{
    GroupIndex, NewSession, ParticipantId, Slot, SlotSource, Stage, TournamentFormat,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupKnockoutGenerator;

impl SessionGenerator for GroupKnockoutGenerator {
    fn format(&self) -> TournamentFormat {
        TournamentFormat::GroupKnockout
    }

    fn minimum_roster(&self) -> usize {
        2
    }

    fn validate(&self, roster: &[ParticipantId], ctx: &GenerationContext<'_>) -> GenerationResult<()> {
        check_common(self, roster, ctx)?;

        let distribution = &ctx.config.group_distribution;
        let invalid = |reason: &str| GenerationError::InvalidGroupDistribution {
            distribution: distribution.clone(),
            roster: roster.len(),
            reason: reason.to_string(),
        };
        if distribution.is_empty() {
            return Err(invalid("no groups configured"));
        }
        if distribution.iter().sum::<usize>() != roster.len() {
            return Err(invalid("group sizes must add up to the roster size"));
        }
        let Some(&smallest) = distribution.iter().min() else {
            return Err(invalid("no groups configured"));
        };
        if smallest < 2 {
            return Err(invalid("every group needs at least 2 participants"));
        }

        let qualifiers = ctx.config.qualifiers_per_group;
        if qualifiers == 0 || qualifiers > smallest {
            return Err(GenerationError::InvalidQualifiers {
                qualifiers,
                reason: format!("must be between 1 and the smallest group size ({smallest})"),
            });
        }
        if qualifiers * distribution.len() < 2 {
            return Err(GenerationError::InvalidQualifiers {
                qualifiers,
                reason: "the bracket needs at least 2 entrants".to_string(),
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
        let groups = assign_groups(&order, &ctx.config.group_distribution);
        let schedules: Vec<_> = groups.iter().map(|members| round_robin_rounds(members)).collect();
        let group_rounds = schedules.iter().map(Vec::len).max().unwrap_or(0);

        // Number round by round across groups so each round packs together
        let mut sessions = Vec::new();
        let mut match_number = 1;
        for round in 0..group_rounds {
            for (group, schedule) in schedules.iter().enumerate() {
                for &(home, away) in schedule.get(round).into_iter().flatten() {
                    sessions.push(NewSession::scheduled(
                        match_number,
                        round as u32 + 1,
                        Stage::Group(group as GroupIndex),
                        vec![Slot::fixed(home), Slot::fixed(away)],
                        ctx.venue,
                    ));
                    match_number += 1;
                }
            }
        }

        let qualifiers = ctx.config.qualifiers_per_group as u32;
        let entrants: Vec<SlotSource> = (1..=qualifiers)
            .flat_map(|place| {
                (0..groups.len() as GroupIndex)
                    .map(move |group| SlotSource::GroupPlacement { group, place })
            })
            .collect();
        let plan = BracketPlan {
            first_match_number: match_number,
            first_round: group_rounds as u32 + 1,
            third_place: ctx.config.third_place_match,
            venue: ctx.venue,
        };
        sessions.extend(bracket::build(&entrants, &plan));

        pack_fields(&mut sessions, ctx.parallel_fields());
        Ok(sessions)
    }
}

/// Serpentine group assignment honouring each group's size
///
/// Seeds fill groups left to right, then right to left, skipping full groups:
/// with sizes `[4, 3]` seeds 1..7 land as A = 1, 4, 5, 7 and B = 2, 3, 6.
pub fn assign_groups(order: &[ParticipantId], sizes: &[usize]) -> Vec<Vec<ParticipantId>> {
    let mut groups: Vec<Vec<ParticipantId>> = sizes.iter().map(|&n| Vec::with_capacity(n)).collect();
    let capacity: usize = sizes.iter().sum();
    let mut seeds = order.iter().copied().take(capacity).peekable();
    let mut forward = true;

    while seeds.peek().is_some() {
        let lanes: Vec<usize> = if forward {
            (0..groups.len()).collect()
        } else {
            (0..groups.len()).rev().collect()
        };
        for g in lanes {
            if groups[g].len() < sizes[g] {
                if let Some(participant) = seeds.next() {
                    groups[g].push(participant);
                }
            }
        }
        forward = !forward;
    }
    groups
}
