//! Ranking rules and standing entries.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

use crate::tournament::{ParticipantId, ScoringMode, TournamentId};

/// What standings are primarily ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryMetric {
    /// Points from wins, draws, losses and byes
    Points,
    /// Aggregated attempt measurements
    Aggregate,
}

/// Unit of an attempt measurement; decides the sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementType {
    Score,
    Distance,
    Rounds,
    Time,
    Placement,
}

impl MeasurementType {
    pub fn direction(self) -> SortDirection {
        match self {
            MeasurementType::Score | MeasurementType::Distance | MeasurementType::Rounds => {
                SortDirection::Descending
            }
            MeasurementType::Time | MeasurementType::Placement => SortDirection::Ascending,
        }
    }
}

/// Whether lower or higher values rank first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Ordering that puts the better value first
    pub fn compare(self, a: f64, b: f64) -> Ordering {
        match self {
            SortDirection::Ascending => a.total_cmp(&b),
            SortDirection::Descending => b.total_cmp(&a),
        }
    }

    /// The better of two values
    pub fn best(self, a: f64, b: f64) -> f64 {
        if self.compare(a, b) == Ordering::Greater {
            b
        } else {
            a
        }
    }
}

/// How per-round attempts combine into one aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Sum,
    Best,
    Average,
}

/// Points awarded per head-to-head outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointsSystem {
    pub win: f64,
    pub draw: f64,
    pub loss: f64,
    /// Points for a Swiss bye; a win when unset
    #[serde(default)]
    pub bye: Option<f64>,
}

impl PointsSystem {
    /// Football-style 3/1/0
    pub fn standard() -> Self {
        Self {
            win: 3.0,
            draw: 1.0,
            loss: 0.0,
            bye: None,
        }
    }

    /// Chess-style 1/0.5/0
    pub fn chess() -> Self {
        Self {
            win: 1.0,
            draw: 0.5,
            loss: 0.0,
            bye: None,
        }
    }

    pub fn bye_points(&self) -> f64 {
        self.bye.unwrap_or(self.win)
    }

    fn values(&self) -> [f64; 4] {
        [self.win, self.draw, self.loss, self.bye_points()]
    }
}

impl Default for PointsSystem {
    fn default() -> Self {
        Self::standard()
    }
}

/// A key used to separate entries level on the primary metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tiebreaker {
    /// Goals for minus goals against, higher first
    GoalDifference,
    /// Goals scored, higher first
    GoalsFor,
    /// Goals conceded, lower first
    GoalsAgainst,
    /// Matches won, higher first
    Wins,
    /// Sum of opponents' points, higher first
    Buchholz,
    /// Single best attempt in the measurement's direction
    BestAttempt,
    /// Lower id first; always decisive
    ParticipantId,
}

impl Tiebreaker {
    /// Whether the key carries information under the scoring mode
    pub fn applies_to(self, mode: ScoringMode) -> bool {
        match self {
            Tiebreaker::GoalDifference
            | Tiebreaker::GoalsFor
            | Tiebreaker::GoalsAgainst
            | Tiebreaker::Wins
            | Tiebreaker::Buchholz => mode == ScoringMode::HeadToHead,
            Tiebreaker::BestAttempt => mode == ScoringMode::Individual,
            Tiebreaker::ParticipantId => true,
        }
    }
}

impl fmt::Display for Tiebreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tiebreaker::GoalDifference => "goal_difference",
            Tiebreaker::GoalsFor => "goals_for",
            Tiebreaker::GoalsAgainst => "goals_against",
            Tiebreaker::Wins => "wins",
            Tiebreaker::Buchholz => "buchholz",
            Tiebreaker::BestAttempt => "best_attempt",
            Tiebreaker::ParticipantId => "participant_id",
        };
        f.write_str(name)
    }
}

/// Malformed ranking configuration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RankingRulesError {
    #[error("primary metric {metric:?} does not fit scoring mode {mode}")]
    PrimaryMetricMismatch {
        metric: PrimaryMetric,
        mode: ScoringMode,
    },

    #[error("tiebreaker {tiebreaker} does not apply to scoring mode {mode}")]
    InapplicableTiebreaker {
        tiebreaker: Tiebreaker,
        mode: ScoringMode,
    },

    #[error("tiebreaker {0} listed more than once")]
    DuplicateTiebreaker(Tiebreaker),

    #[error("tiebreaker {0} can never apply after participant_id")]
    UnreachableTiebreaker(Tiebreaker),

    #[error("points values must be finite")]
    NonFinitePoints,
}

/// Configuration of how standings are ordered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRules {
    pub primary: PrimaryMetric,
    /// Only meaningful for aggregate rankings
    #[serde(default = "default_measurement")]
    pub measurement: MeasurementType,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub points: PointsSystem,
    /// Applied left to right after the primary metric
    #[serde(default)]
    pub tiebreakers: Vec<Tiebreaker>,
}

fn default_measurement() -> MeasurementType {
    MeasurementType::Score
}

impl RankingRules {
    /// Points ranking with goal difference, goals for and id as tiebreakers
    pub fn head_to_head() -> Self {
        Self {
            primary: PrimaryMetric::Points,
            measurement: MeasurementType::Score,
            aggregation: Aggregation::Sum,
            points: PointsSystem::standard(),
            tiebreakers: vec![
                Tiebreaker::GoalDifference,
                Tiebreaker::GoalsFor,
                Tiebreaker::ParticipantId,
            ],
        }
    }

    /// Aggregate ranking summing attempts of the given measurement
    pub fn individual(measurement: MeasurementType) -> Self {
        Self {
            primary: PrimaryMetric::Aggregate,
            measurement,
            aggregation: Aggregation::Sum,
            points: PointsSystem::standard(),
            tiebreakers: vec![Tiebreaker::BestAttempt, Tiebreaker::ParticipantId],
        }
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_points(mut self, points: PointsSystem) -> Self {
        self.points = points;
        self
    }

    pub fn with_tiebreakers(mut self, tiebreakers: Vec<Tiebreaker>) -> Self {
        self.tiebreakers = tiebreakers;
        self
    }

    /// Direction of the primary metric
    pub fn primary_direction(&self) -> SortDirection {
        match self.primary {
            PrimaryMetric::Points => SortDirection::Descending,
            PrimaryMetric::Aggregate => self.measurement.direction(),
        }
    }

    /// Check the rules against the tournament's scoring mode
    pub fn validate(&self, mode: ScoringMode) -> Result<(), RankingRulesError> {
        let expected = match mode {
            ScoringMode::HeadToHead => PrimaryMetric::Points,
            ScoringMode::Individual => PrimaryMetric::Aggregate,
        };
        if self.primary != expected {
            return Err(RankingRulesError::PrimaryMetricMismatch {
                metric: self.primary,
                mode,
            });
        }

        if self.points.values().iter().any(|v| !v.is_finite()) {
            return Err(RankingRulesError::NonFinitePoints);
        }

        let mut seen = Vec::with_capacity(self.tiebreakers.len());
        for &tiebreaker in &self.tiebreakers {
            if !tiebreaker.applies_to(mode) {
                return Err(RankingRulesError::InapplicableTiebreaker { tiebreaker, mode });
            }
            if seen.contains(&tiebreaker) {
                return Err(RankingRulesError::DuplicateTiebreaker(tiebreaker));
            }
            if seen.contains(&Tiebreaker::ParticipantId) {
                return Err(RankingRulesError::UnreachableTiebreaker(tiebreaker));
            }
            seen.push(tiebreaker);
        }

        Ok(())
    }
}

/// Derived standing of one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingEntry {
    pub tournament_id: TournamentId,
    pub participant_id: ParticipantId,
    /// 1-based; tied entries share a rank
    pub rank: u32,
    /// Points or aggregate, per the primary metric
    pub score: f64,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub best_attempt: Option<f64>,
    pub attempts: u32,
    pub buchholz: f64,
    /// Furthest bracket round reached; 0 outside brackets
    pub stage_progress: f64,
}

impl StandingEntry {
    pub fn new(tournament_id: TournamentId, participant_id: ParticipantId) -> Self {
        Self {
            tournament_id,
            participant_id,
            rank: 0,
            score: 0.0,
            played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            goals_for: 0,
            goals_against: 0,
            best_attempt: None,
            attempts: 0,
            buchholz: 0.0,
            stage_progress: 0.0,
        }
    }

    pub fn goal_difference(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_directions() {
        assert_eq!(MeasurementType::Score.direction(), SortDirection::Descending);
        assert_eq!(MeasurementType::Distance.direction(), SortDirection::Descending);
        assert_eq!(MeasurementType::Rounds.direction(), SortDirection::Descending);
        assert_eq!(MeasurementType::Time.direction(), SortDirection::Ascending);
        assert_eq!(MeasurementType::Placement.direction(), SortDirection::Ascending);
    }

    #[test]
    fn test_best_value() {
        assert_eq!(SortDirection::Ascending.best(11.9, 12.4), 11.9);
        assert_eq!(SortDirection::Descending.best(11.9, 12.4), 12.4);
    }

    #[test]
    fn test_defaults_validate() {
        assert!(RankingRules::head_to_head()
            .validate(ScoringMode::HeadToHead)
            .is_ok());
        assert!(RankingRules::individual(MeasurementType::Time)
            .validate(ScoringMode::Individual)
            .is_ok());
    }

    #[test]
    fn test_primary_metric_must_match_mode() {
        let result = RankingRules::head_to_head().validate(ScoringMode::Individual);
        assert!(matches!(
            result,
            Err(RankingRulesError::PrimaryMetricMismatch { .. })
        ));
    }

    #[test]
    fn test_inapplicable_tiebreaker_rejected() {
        let rules = RankingRules::individual(MeasurementType::Time)
            .with_tiebreakers(vec![Tiebreaker::GoalDifference]);
        assert_eq!(
            rules.validate(ScoringMode::Individual),
            Err(RankingRulesError::InapplicableTiebreaker {
                tiebreaker: Tiebreaker::GoalDifference,
                mode: ScoringMode::Individual,
            })
        );
    }

    #[test]
    fn test_duplicate_tiebreaker_rejected() {
        let rules = RankingRules::head_to_head()
            .with_tiebreakers(vec![Tiebreaker::Wins, Tiebreaker::Wins]);
        assert_eq!(
            rules.validate(ScoringMode::HeadToHead),
            Err(RankingRulesError::DuplicateTiebreaker(Tiebreaker::Wins))
        );
    }

    #[test]
    fn test_nothing_after_participant_id() {
        let rules = RankingRules::head_to_head()
            .with_tiebreakers(vec![Tiebreaker::ParticipantId, Tiebreaker::GoalsFor]);
        assert_eq!(
            rules.validate(ScoringMode::HeadToHead),
            Err(RankingRulesError::UnreachableTiebreaker(Tiebreaker::GoalsFor))
        );
    }

    #[test]
    fn test_non_finite_points_rejected() {
        let rules = RankingRules::head_to_head().with_points(PointsSystem {
            win: f64::NAN,
            ..PointsSystem::standard()
        });
        assert_eq!(
            rules.validate(ScoringMode::HeadToHead),
            Err(RankingRulesError::NonFinitePoints)
        );
    }

    #[test]
    fn test_bye_defaults_to_win() {
        assert_eq!(PointsSystem::chess().bye_points(), 1.0);
        let custom = PointsSystem {
            bye: Some(0.5),
            ..PointsSystem::chess()
        };
        assert_eq!(custom.bye_points(), 0.5);
    }

    #[test]
    fn test_rules_deserialize_with_defaults() {
        let rules: RankingRules =
            serde_json::from_str(r#"{"primary":"points"}"#).expect("valid rules json");
        assert_eq!(rules.points, PointsSystem::standard());
        assert!(rules.tiebreakers.is_empty());
    }
}
