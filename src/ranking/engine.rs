//! Standings computation.
//!
//! Standings are always derived from scratch from the finalized sessions; the
//! stored table is a cache of this function's output.

use log::warn;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::models::{
    Aggregation, PointsSystem, PrimaryMetric, RankingRules, SortDirection, StandingEntry,
    Tiebreaker,
};
use crate::tournament::{
    GroupIndex, MatchResult, ParticipantId, ScoringMode, Session, Stage, Tournament,
    TournamentFormat, TournamentId,
};

/// Inputs that decide how a set of sessions is ranked
#[derive(Debug, Clone, Copy)]
pub struct RankingContext<'a> {
    pub tournament_id: TournamentId,
    pub format: TournamentFormat,
    pub scoring_mode: ScoringMode,
    pub rules: &'a RankingRules,
}

impl<'a> RankingContext<'a> {
    pub fn for_tournament(tournament: &'a Tournament) -> Self {
        Self {
            tournament_id: tournament.id,
            format: tournament.format,
            scoring_mode: tournament.scoring_mode,
            rules: &tournament.ranking_rules,
        }
    }
}

/// Compute ranked standings for every roster participant
///
/// Only finalized sessions count. Participants without results still get an
/// entry; entries equal on every configured key share a rank.
pub fn compute_standings(
    ctx: &RankingContext<'_>,
    roster: &[ParticipantId],
    sessions: &[Session],
) -> Vec<StandingEntry> {
    let mut entries: Vec<StandingEntry> = roster
        .iter()
        .map(|&participant| StandingEntry::new(ctx.tournament_id, participant))
        .collect();
    let index: HashMap<ParticipantId, usize> = roster
        .iter()
        .enumerate()
        .map(|(i, &participant)| (participant, i))
        .collect();
    let mut attempts: Vec<Vec<f64>> = vec![Vec::new(); roster.len()];
    let mut opponents: Vec<Vec<usize>> = vec![Vec::new(); roster.len()];
    let points = &ctx.rules.points;

    for session in sessions.iter().filter(|s| s.is_finalized()) {
        let Some(result) = session.result else {
            continue;
        };

        match result {
            MatchResult::Bye => {
                for i in session.participants().filter_map(|p| index.get(&p).copied()) {
                    let entry = &mut entries[i];
                    entry.played += 1;
                    entry.wins += 1;
                    entry.score += points.bye_points();
                }
            }
            MatchResult::Attempt { value } => {
                for i in session.participants().filter_map(|p| index.get(&p).copied()) {
                    attempts[i].push(value);
                }
            }
            MatchResult::HeadToHead {
                home_score,
                away_score,
                ..
            } => {
                let Some((home, away)) = session.pairing() else {
                    warn!("Session {} finalized without both participants", session.id);
                    continue;
                };
                let (Some(&h), Some(&a)) = (index.get(&home), index.get(&away)) else {
                    warn!("Session {} references a participant outside the roster", session.id);
                    continue;
                };

                let winner = session.outcome().and_then(|outcome| outcome.winner);
                record_match(&mut entries[h], home_score, away_score, winner.map(|w| w == home), points);
                record_match(&mut entries[a], away_score, home_score, winner.map(|w| w == away), points);
                opponents[h].push(a);
                opponents[a].push(h);

                if let Some(w) = winner {
                    let (wi, li) = if w == home { (h, a) } else { (a, h) };
                    let round = f64::from(session.round);
                    match session.stage {
                        Stage::Knockout => {
                            raise(&mut entries[wi].stage_progress, round + 1.0);
                            raise(&mut entries[li].stage_progress, round);
                        }
                        Stage::ThirdPlace => {
                            raise(&mut entries[wi].stage_progress, round - 0.5);
                            raise(&mut entries[li].stage_progress, round - 1.0);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    if ctx.scoring_mode == ScoringMode::Individual {
        let direction = ctx.rules.measurement.direction();
        for (entry, values) in entries.iter_mut().zip(&attempts) {
            entry.attempts = values.len() as u32;
            entry.played = entry.attempts;
            entry.best_attempt = values.iter().copied().reduce(|a, b| direction.best(a, b));
            entry.score = aggregate(values, ctx.rules.aggregation, direction);
        }
    } else {
        let scores: Vec<f64> = entries.iter().map(|e| e.score).collect();
        for (entry, faced) in entries.iter_mut().zip(&opponents) {
            entry.buchholz = faced.iter().map(|&j| scores[j]).sum();
        }
    }

    rank(ctx, entries)
}

fn record_match(
    entry: &mut StandingEntry,
    scored: u32,
    conceded: u32,
    won: Option<bool>,
    points: &PointsSystem,
) {
    entry.played += 1;
    entry.goals_for += scored;
    entry.goals_against += conceded;
    match won {
        Some(true) => {
            entry.wins += 1;
            entry.score += points.win;
        }
        Some(false) => {
            entry.losses += 1;
            entry.score += points.loss;
        }
        None => {
            entry.draws += 1;
            entry.score += points.draw;
        }
    }
}

fn raise(progress: &mut f64, reached: f64) {
    if reached > *progress {
        *progress = reached;
    }
}

fn aggregate(values: &[f64], aggregation: Aggregation, direction: SortDirection) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    match aggregation {
        Aggregation::Sum => values.iter().sum(),
        Aggregation::Best => values
            .iter()
            .copied()
            .reduce(|a, b| direction.best(a, b))
            .unwrap_or(0.0),
        Aggregation::Average => values.iter().sum::<f64>() / values.len() as f64,
    }
}

fn rank(ctx: &RankingContext<'_>, entries: Vec<StandingEntry>) -> Vec<StandingEntry> {
    let mut ordered = entries;
    // Stable: complete ties keep roster order
    ordered.sort_by(|a, b| compare_entries(ctx, a, b));

    let mut ranked: Vec<StandingEntry> = Vec::with_capacity(ordered.len());
    for (position, mut entry) in ordered.into_iter().enumerate() {
        entry.rank = match ranked.last() {
            Some(prev) if compare_entries(ctx, prev, &entry) == Ordering::Equal => prev.rank,
            _ => position as u32 + 1,
        };
        ranked.push(entry);
    }
    ranked
}

/// Ordering of two entries under the context's rules; `Less` ranks first
pub fn compare_entries(ctx: &RankingContext<'_>, a: &StandingEntry, b: &StandingEntry) -> Ordering {
    let progress = if ctx.format.is_bracket() {
        b.stage_progress.total_cmp(&a.stage_progress)
    } else {
        Ordering::Equal
    };

    progress
        .then_with(|| compare_primary(ctx.rules, a, b))
        .then_with(|| {
            ctx.rules
                .tiebreakers
                .iter()
                .fold(Ordering::Equal, |acc, &tiebreaker| {
                    acc.then_with(|| compare_tiebreaker(ctx.rules, tiebreaker, a, b))
                })
        })
}

fn compare_primary(rules: &RankingRules, a: &StandingEntry, b: &StandingEntry) -> Ordering {
    match rules.primary {
        PrimaryMetric::Points => SortDirection::Descending.compare(a.score, b.score),
        // No attempts at all ranks below any recorded aggregate
        PrimaryMetric::Aggregate => (b.attempts > 0)
            .cmp(&(a.attempts > 0))
            .then_with(|| rules.measurement.direction().compare(a.score, b.score)),
    }
}

fn compare_tiebreaker(
    rules: &RankingRules,
    tiebreaker: Tiebreaker,
    a: &StandingEntry,
    b: &StandingEntry,
) -> Ordering {
    match tiebreaker {
        Tiebreaker::GoalDifference => b.goal_difference().cmp(&a.goal_difference()),
        Tiebreaker::GoalsFor => b.goals_for.cmp(&a.goals_for),
        Tiebreaker::GoalsAgainst => a.goals_against.cmp(&b.goals_against),
        Tiebreaker::Wins => b.wins.cmp(&a.wins),
        Tiebreaker::Buchholz => b.buchholz.total_cmp(&a.buchholz),
        Tiebreaker::BestAttempt => match (a.best_attempt, b.best_attempt) {
            (Some(x), Some(y)) => rules.measurement.direction().compare(x, y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        Tiebreaker::ParticipantId => a.participant_id.cmp(&b.participant_id),
    }
}

/// Final table of one group, best first, once all its sessions are finalized
///
/// Members are taken from the group's sessions; the outer format's bracket
/// ordering does not apply inside a group.
pub fn group_table(
    ctx: &RankingContext<'_>,
    group: GroupIndex,
    sessions: &[Session],
) -> Option<Vec<ParticipantId>> {
    let group_sessions: Vec<Session> = sessions
        .iter()
        .filter(|s| s.stage == Stage::Group(group))
        .cloned()
        .collect();
    if group_sessions.is_empty() || !group_sessions.iter().all(Session::is_finalized) {
        return None;
    }

    let mut members: Vec<ParticipantId> = Vec::new();
    for participant in group_sessions.iter().flat_map(|s| s.participants()) {
        if !members.contains(&participant) {
            members.push(participant);
        }
    }

    let group_ctx = RankingContext {
        format: TournamentFormat::League,
        ..*ctx
    };
    let table = compute_standings(&group_ctx, &members, &group_sessions);
    Some(table.into_iter().map(|entry| entry.participant_id).collect())
}
