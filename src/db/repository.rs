//! Repository trait definitions for testability and dependency injection.
//!
//! The manager and reward pipeline depend only on these traits;
//! [`super::PgStore`] and [`super::MemoryStore`] implement all of them.

use async_trait::async_trait;

use super::errors::StorageResult;
use crate::ranking::StandingEntry;
use crate::rewards::{LedgerInsert, NewLedgerEntry, RewardLedgerEntry};
use crate::schedule::SlotUpdate;
use crate::tournament::{
    MatchResult, NewSession, NewTournament, ParticipantId, Session, SessionId, Tournament,
    TournamentId, TournamentStatus,
};

/// Outcome of finalizing a session
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    /// Result stored; `results_version` is the tournament's new version
    Finalized { session: Session, results_version: i64 },
    /// The session already had a result; nothing changed
    AlreadyFinalized(Session),
    /// The tournament is not in progress; nothing changed
    TournamentNotInProgress(TournamentStatus),
    NotFound,
}

/// Outcome of appending sessions to a running tournament
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// Sessions stored and `results_version` bumped
    Appended(Vec<Session>),
    /// A match number was taken: a concurrent caller stored the round first
    RoundTaken,
    /// The tournament left `InProgress`; nothing changed
    TournamentNotInProgress(TournamentStatus),
    NotFound,
}

/// Trait for tournament and session storage
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    /// Store a new tournament in `Draft`
    async fn create_tournament(&self, tournament: &NewTournament) -> StorageResult<Tournament>;

    /// Find tournament by ID
    async fn find_tournament(&self, id: TournamentId) -> StorageResult<Option<Tournament>>;

    /// Move the status from `expected` to `next`; false if the stored status differs
    ///
    /// Sets `completed_at` when moving to `Completed`.
    async fn compare_and_set_status(
        &self,
        id: TournamentId,
        expected: TournamentStatus,
        next: TournamentStatus,
    ) -> StorageResult<bool>;

    /// Freeze the roster, store every session and move to `InProgress`, atomically
    ///
    /// Returns false, writing nothing, when the stored status is not `expected`.
    async fn start_tournament(
        &self,
        id: TournamentId,
        expected: TournamentStatus,
        roster: &[ParticipantId],
        sessions: &[NewSession],
    ) -> StorageResult<bool>;

    /// Sessions of a tournament ordered by match number
    async fn list_sessions(&self, id: TournamentId) -> StorageResult<Vec<Session>>;

    /// Find session by ID
    async fn find_session(&self, id: SessionId) -> StorageResult<Option<Session>>;

    /// Record a result on a scheduled session and bump `results_version`
    async fn finalize_session(
        &self,
        id: SessionId,
        result: &MatchResult,
    ) -> StorageResult<FinalizeOutcome>;

    /// Fill in resolved bracket slots on scheduled sessions
    ///
    /// Merges with the stored slots; a participant already set is never cleared.
    async fn update_slots(&self, updates: &[SlotUpdate]) -> StorageResult<()>;

    /// Add sessions to a running tournament, all or nothing
    ///
    /// Bumps `results_version`, since sessions finalized on creation (byes)
    /// change the standings. The status check and the insert are atomic, so
    /// nothing lands on a tournament that was completed or cancelled meanwhile.
    async fn append_sessions(
        &self,
        id: TournamentId,
        sessions: &[NewSession],
    ) -> StorageResult<AppendOutcome>;
}

/// Trait for the recomputed standings table
#[async_trait]
pub trait StandingRepository: Send + Sync {
    /// Replace the standings if `results_version` is newer than the stored one
    ///
    /// Returns false when a fresher computation already landed.
    async fn replace_standings(
        &self,
        tournament_id: TournamentId,
        results_version: i64,
        entries: &[StandingEntry],
    ) -> StorageResult<bool>;

    /// Standings ordered by rank
    async fn list_standings(&self, tournament_id: TournamentId) -> StorageResult<Vec<StandingEntry>>;
}

/// Trait for the append-only reward ledger
#[async_trait]
pub trait RewardLedgerRepository: Send + Sync {
    /// Insert a row; a taken idempotency key yields `Duplicate`
    async fn insert_entry(&self, entry: &NewLedgerEntry) -> StorageResult<LedgerInsert>;

    /// Find row by idempotency key
    async fn find_by_key(&self, idempotency_key: &str) -> StorageResult<Option<RewardLedgerEntry>>;

    /// Rows of a tournament ordered by idempotency key
    async fn list_entries(&self, tournament_id: TournamentId) -> StorageResult<Vec<RewardLedgerEntry>>;
}
