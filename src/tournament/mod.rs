//! Tournament module: models, lifecycle and orchestration.
//!
//! This module provides tournament management functionality including:
//! - Tournament creation and validation
//! - The lifecycle state machine and its instructor guards
//! - Roster freeze and schedule generation on start
//! - Result entry with standings recomputation
//! - Completion and reward distribution
//!
//! ## Example
//!
//! ```no_run
//! use academy_tournaments::db::MemoryStore;
//! use academy_tournaments::tournament::{NewTournament, TournamentFormat, TournamentManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let manager = TournamentManager::new(store.clone(), store.clone(), store.clone(), store);
//!
//!     let tournament = manager
//!         .create_tournament(NewTournament::new("Summer Cup", TournamentFormat::Knockout))
//!         .await?;
//!     println!("Created tournament: {}", tournament.id);
//!
//!     Ok(())
//! }
//! ```

pub mod external;
pub mod manager;
pub mod models;
pub mod state_machine;

pub use external::{AssignmentDirectory, InstructorAssignment, InstructorRole, RosterSource};
pub use manager::{
    CompletionReport, ManagerSettings, ResultReport, TournamentError, TournamentManager,
    TournamentResult,
};
pub use models::{
    FormatConfig, GroupIndex, MatchNumber, MatchResult, NewSession, NewTournament, Outcome,
    ParticipantId, ScoringMode, Seeding, Session, SessionId, SessionStatus, Slot, SlotSource,
    Stage, Tournament, TournamentFormat, TournamentId, TournamentStatus, group_label,
};
pub use state_machine::{
    GuardContext, LifecycleEffect, LifecycleError, LifecycleEvent, Transition, transition,
};
