//! Ranking engine: configurable primary metric plus an ordered tiebreaker chain.

pub mod engine;
pub mod models;

pub use engine::{RankingContext, compare_entries, compute_standings, group_table};
pub use models::{
    Aggregation, MeasurementType, PointsSystem, PrimaryMetric, RankingRules, RankingRulesError,
    SortDirection, StandingEntry, Tiebreaker,
};
