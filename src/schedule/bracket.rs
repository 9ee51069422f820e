//! Single-elimination bracket construction and slot resolution.
//!
//! A bracket is generated in full at start time. First-round slots hold known
//! entrants (or group placements); later slots reference upstream matches and
//! are filled in by [`resolve_slots`] as those matches finalize.

use log::warn;
use std::collections::HashMap;

use crate::tournament::{
    GroupIndex, MatchNumber, NewSession, ParticipantId, Session, SessionId, Slot, SlotSource,
    Stage,
};

/// Where a bracket sits inside the tournament's numbering
#[derive(Debug, Clone, Copy)]
pub struct BracketPlan<'a> {
    pub first_match_number: MatchNumber,
    pub first_round: u32,
    pub third_place: bool,
    pub venue: &'a str,
}

/// Smallest power of two holding every entrant
pub fn bracket_size(entrants: usize) -> usize {
    entrants.max(1).next_power_of_two()
}

/// Seed numbers in bracket line order for a power-of-two size
///
/// Adjacent pairs meet in round one: 8 gives `[1, 8, 4, 5, 2, 7, 3, 6]`, so
/// the top two seeds can only meet in the final.
pub fn seed_positions(size: usize) -> Vec<usize> {
    let mut positions = vec![1];
    while positions.len() < size {
        let next = positions.len() * 2 + 1;
        positions = positions
            .iter()
            .flat_map(|&seed| [seed, next - seed])
            .collect();
    }
    positions
}

/// Build every bracket session for entrants given in seed order
///
/// Seeds beyond the entrant count are byes: the opposing entrant advances
/// without a session. The third-place match is only created when both
/// semifinals are real matches.
pub fn build(entrants: &[SlotSource], plan: &BracketPlan<'_>) -> Vec<NewSession> {
    let size = bracket_size(entrants.len());
    let mut sessions = Vec::with_capacity(size);
    let mut match_number = plan.first_match_number;

    let mut advancing: Vec<SlotSource> = Vec::with_capacity(size / 2);
    for line in seed_positions(size).chunks(2) {
        let top = entrants.get(line[0] - 1).copied();
        let bottom = line.get(1).and_then(|&seed| entrants.get(seed - 1)).copied();
        match (top, bottom) {
            (Some(a), Some(b)) => {
                sessions.push(NewSession::scheduled(
                    match_number,
                    plan.first_round,
                    Stage::Knockout,
                    vec![Slot::from_source(a), Slot::from_source(b)],
                    plan.venue,
                ));
                advancing.push(SlotSource::WinnerOf { match_number });
                match_number += 1;
            }
            (Some(entrant), None) | (None, Some(entrant)) => advancing.push(entrant),
            // A line of two byes cannot occur while entrants > size / 2
            (None, None) => {}
        }
    }

    let mut round = plan.first_round;
    while advancing.len() > 1 {
        round += 1;
        if advancing.len() == 2 && plan.third_place {
            match (advancing[0], advancing[1]) {
                (
                    SlotSource::WinnerOf { match_number: first },
                    SlotSource::WinnerOf { match_number: second },
                ) => {
                    sessions.push(NewSession::scheduled(
                        match_number,
                        round,
                        Stage::ThirdPlace,
                        vec![
                            Slot::from_source(SlotSource::LoserOf { match_number: first }),
                            Slot::from_source(SlotSource::LoserOf { match_number: second }),
                        ],
                        plan.venue,
                    ));
                    match_number += 1;
                }
                _ => warn!("Skipping third-place match: a semifinal slot is fed by a bye"),
            }
        }

        let mut next = Vec::with_capacity(advancing.len() / 2);
        for pair in advancing.chunks(2) {
            if let [a, b] = pair {
                sessions.push(NewSession::scheduled(
                    match_number,
                    round,
                    Stage::Knockout,
                    vec![Slot::from_source(*a), Slot::from_source(*b)],
                    plan.venue,
                ));
                next.push(SlotSource::WinnerOf { match_number });
                match_number += 1;
            }
        }
        advancing = next;
    }

    sessions
}

/// New slot contents for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotUpdate {
    pub session_id: SessionId,
    pub slots: Vec<Slot>,
}

impl SlotUpdate {
    /// Combine with the stored slots, never clearing a participant already set
    ///
    /// Two finalizes racing on sibling matches each resolve only part of the
    /// downstream session; merging lets both writes land.
    pub fn merged_with(&self, current: &[Slot]) -> Vec<Slot> {
        if current.len() != self.slots.len() {
            return self.slots.clone();
        }
        current
            .iter()
            .zip(&self.slots)
            .map(|(stored, update)| if stored.is_resolved() { *stored } else { *update })
            .collect()
    }
}

/// Fill unresolved slots whose upstream sessions have finalized
///
/// `group_table` returns a completed group's final order (best first), or
/// `None` while the group is still running.
pub fn resolve_slots<F>(sessions: &[Session], mut group_table: F) -> Vec<SlotUpdate>
where
    F: FnMut(GroupIndex) -> Option<Vec<ParticipantId>>,
{
    let by_number: HashMap<MatchNumber, &Session> =
        sessions.iter().map(|s| (s.match_number, s)).collect();
    let mut tables: HashMap<GroupIndex, Option<Vec<ParticipantId>>> = HashMap::new();

    let mut updates = Vec::new();
    for session in sessions.iter().filter(|s| !s.is_finalized() && !s.is_ready()) {
        let mut slots = session.slots.clone();
        let mut changed = false;

        for slot in slots.iter_mut().filter(|slot| !slot.is_resolved()) {
            let resolved = match slot.source {
                SlotSource::Participant { id } => Some(id),
                SlotSource::WinnerOf { match_number } => by_number
                    .get(&match_number)
                    .and_then(|upstream| upstream.outcome())
                    .and_then(|outcome| outcome.winner),
                SlotSource::LoserOf { match_number } => by_number
                    .get(&match_number)
                    .and_then(|upstream| upstream.outcome())
                    .and_then(|outcome| outcome.loser),
                SlotSource::GroupPlacement { group, place } => tables
                    .entry(group)
                    .or_insert_with(|| group_table(group))
                    .as_ref()
                    .and_then(|table| table.get(place.saturating_sub(1) as usize).copied()),
            };

            if resolved.is_some() {
                slot.participant = resolved;
                changed = true;
            }
        }

        if changed {
            updates.push(SlotUpdate {
                session_id: session.id,
                slots,
            });
        }
    }
    updates
}

/// Apply slot updates to an in-memory session list
pub fn apply_updates(sessions: &mut [Session], updates: &[SlotUpdate]) {
    for update in updates {
        if let Some(session) = sessions.iter_mut().find(|s| s.id == update.session_id) {
            session.slots = update.merged_with(&session.slots);
        }
    }
}
