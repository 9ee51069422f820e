//! # Academy Tournaments
//!
//! A tournament format engine for a training academy: schedule generation,
//! standings, a lifecycle state machine and idempotent reward distribution.
//!
//! Schedule generation is a strategy per format, dispatched through
//! `enum_dispatch`; the lifecycle is a pure finite state machine whose
//! transitions are persisted with compare-and-set writes.
//!
//! ## Architecture
//!
//! A tournament moves through seven states:
//!
//! - **Draft**: Created, not yet staffed
//! - **InstructorAssigned**: Lead instructor accepted
//! - **ReadyForEnrollment**: Assistant instructor accepted
//! - **EnrollmentOpen**: Participants enroll
//! - **InProgress**: Roster frozen, sessions generated, results arriving
//! - **Completed**: Rewards distributed
//! - **Cancelled**: Abandoned; rewards suppressed
//!
//! ## Core Modules
//!
//! - [`schedule`]: League, knockout, swiss, group+knockout and individual generators
//! - [`ranking`]: Standings from finalized sessions with configurable tiebreakers
//! - [`tournament`]: Models, lifecycle state machine and the [`TournamentManager`]
//! - [`rewards`]: Placement bands and the idempotent reward ledger pipeline
//! - [`db`]: Repository traits with PostgreSQL and in-memory stores
//!
//! ## Example
//!
//! ```
//! use academy_tournaments::schedule::{FormatGenerator, GenerationContext, SessionGenerator};
//! use academy_tournaments::{NewTournament, TournamentFormat};
//! use chrono::Utc;
//!
//! let tournament = NewTournament::new("Spring League", TournamentFormat::League)
//!     .into_tournament(1, Utc::now());
//! let ctx = GenerationContext::new(&tournament, "Main Pitch");
//!
//! let sessions = FormatGenerator::from(tournament.format)
//!     .generate(&[1, 2, 3, 4], &ctx)
//!     .expect("valid roster");
//! assert_eq!(sessions.len(), 6);
//! ```

/// Engine configuration from environment variables.
pub mod config;
pub use config::{ConfigError, EngineConfig};

/// Storage: pool, repository traits and their implementations.
pub mod db;

pub mod logging;

/// Standings computation.
pub mod ranking;
pub use ranking::{RankingRules, StandingEntry, Tiebreaker};

/// Reward configuration, ledger and distribution pipeline.
pub mod rewards;
pub use rewards::{DistributionReport, RewardConfig, RewardPipeline};

/// Session generators, one per format.
pub mod schedule;

/// Tournament models, lifecycle and orchestration.
pub mod tournament;
pub use tournament::{
    CompletionReport, ManagerSettings, MatchResult, NewTournament, ResultReport, Session,
    Tournament, TournamentError, TournamentFormat, TournamentManager, TournamentStatus,
};

pub mod venue;
