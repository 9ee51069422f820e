//! In-process store implementing every repository.
//!
//! Mirrors the constraints of the PostgreSQL schema (unique match numbers
//! per tournament, unique ledger keys, conditional status updates) so the
//! manager behaves the same against either backend. Also plays the roster,
//! assignment and skill directories in tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

use super::errors::StorageResult;
use super::repository::{
    AppendOutcome, FinalizeOutcome, RewardLedgerRepository, StandingRepository, TournamentRepository,
};
use crate::ranking::StandingEntry;
use crate::rewards::{LedgerInsert, NewLedgerEntry, RewardLedgerEntry, SkillDirectory};
use crate::schedule::SlotUpdate;
use crate::tournament::{
    AssignmentDirectory, InstructorAssignment, MatchResult, NewSession, NewTournament,
    ParticipantId, RosterSource, Session, SessionId, SessionStatus, Tournament, TournamentId,
    TournamentStatus,
};

#[derive(Default)]
struct State {
    next_id: i64,
    tournaments: HashMap<TournamentId, Tournament>,
    sessions: BTreeMap<SessionId, Session>,
    standings: HashMap<TournamentId, Vec<StandingEntry>>,
    ledger: BTreeMap<String, RewardLedgerEntry>,
    enrollments: HashMap<TournamentId, Vec<ParticipantId>>,
    assignments: HashMap<TournamentId, Vec<InstructorAssignment>>,
    skills: HashMap<ParticipantId, HashSet<String>>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn match_number_taken(&self, tournament_id: TournamentId, sessions: &[NewSession]) -> bool {
        let mut seen = HashSet::new();
        self.sessions
            .values()
            .filter(|s| s.tournament_id == tournament_id)
            .for_each(|s| {
                seen.insert(s.match_number);
            });
        sessions.iter().any(|s| !seen.insert(s.match_number))
    }

    fn insert_sessions(&mut self, tournament_id: TournamentId, sessions: &[NewSession]) -> Vec<Session> {
        let now = Utc::now();
        let mut stored = Vec::with_capacity(sessions.len());
        for new_session in sessions {
            let id = self.next_id();
            let session = new_session.clone().into_session(id, tournament_id, now);
            self.sessions.insert(id, session.clone());
            stored.push(session);
        }
        stored
    }
}

/// Mutex-guarded in-memory storage
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll a participant in a tournament
    pub async fn enroll(&self, tournament_id: TournamentId, participant_id: ParticipantId) {
        self.state
            .lock()
            .await
            .enrollments
            .entry(tournament_id)
            .or_default()
            .push(participant_id);
    }

    /// Record an instructor assignment
    pub async fn assign_instructor(&self, tournament_id: TournamentId, assignment: InstructorAssignment) {
        self.state
            .lock()
            .await
            .assignments
            .entry(tournament_id)
            .or_default()
            .push(assignment);
    }

    /// Map a participant to a skill they can earn points in
    pub async fn grant_skill(&self, participant_id: ParticipantId, skill: impl Into<String>) {
        self.state
            .lock()
            .await
            .skills
            .entry(participant_id)
            .or_default()
            .insert(skill.into());
    }
}

#[async_trait]
impl TournamentRepository for MemoryStore {
    async fn create_tournament(&self, tournament: &NewTournament) -> StorageResult<Tournament> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let stored = tournament.clone().into_tournament(id, Utc::now());
        state.tournaments.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_tournament(&self, id: TournamentId) -> StorageResult<Option<Tournament>> {
        Ok(self.state.lock().await.tournaments.get(&id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: TournamentId,
        expected: TournamentStatus,
        next: TournamentStatus,
    ) -> StorageResult<bool> {
        let mut state = self.state.lock().await;
        let Some(tournament) = state.tournaments.get_mut(&id) else {
            return Ok(false);
        };
        if tournament.status != expected {
            return Ok(false);
        }
        tournament.status = next;
        if next == TournamentStatus::Completed {
            tournament.completed_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn start_tournament(
        &self,
        id: TournamentId,
        expected: TournamentStatus,
        roster: &[ParticipantId],
        sessions: &[NewSession],
    ) -> StorageResult<bool> {
        let mut state = self.state.lock().await;
        match state.tournaments.get(&id) {
            Some(t) if t.status == expected => {}
            _ => return Ok(false),
        }
        if state.match_number_taken(id, sessions) {
            return Ok(false);
        }
        state.insert_sessions(id, sessions);
        if let Some(tournament) = state.tournaments.get_mut(&id) {
            tournament.roster = roster.to_vec();
            tournament.status = TournamentStatus::InProgress;
            tournament.started_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn list_sessions(&self, id: TournamentId) -> StorageResult<Vec<Session>> {
        let state = self.state.lock().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.tournament_id == id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.match_number);
        Ok(sessions)
    }

    async fn find_session(&self, id: SessionId) -> StorageResult<Option<Session>> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn finalize_session(
        &self,
        id: SessionId,
        result: &MatchResult,
    ) -> StorageResult<FinalizeOutcome> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get(&id).cloned() else {
            return Ok(FinalizeOutcome::NotFound);
        };
        let status = state
            .tournaments
            .get(&session.tournament_id)
            .map(|t| t.status);
        match status {
            None => return Ok(FinalizeOutcome::NotFound),
            Some(TournamentStatus::InProgress) => {}
            Some(other) => return Ok(FinalizeOutcome::TournamentNotInProgress(other)),
        }
        if session.is_finalized() {
            return Ok(FinalizeOutcome::AlreadyFinalized(session));
        }

        let finalized = Session {
            result: Some(*result),
            status: SessionStatus::Finalized,
            finalized_at: Some(Utc::now()),
            ..session
        };
        state.sessions.insert(id, finalized.clone());

        let mut results_version = 0;
        if let Some(tournament) = state.tournaments.get_mut(&finalized.tournament_id) {
            tournament.results_version += 1;
            results_version = tournament.results_version;
        }
        Ok(FinalizeOutcome::Finalized {
            session: finalized,
            results_version,
        })
    }

    async fn update_slots(&self, updates: &[SlotUpdate]) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        for update in updates {
            if let Some(session) = state.sessions.get_mut(&update.session_id) {
                if !session.is_finalized() {
                    session.slots = update.merged_with(&session.slots);
                }
            }
        }
        Ok(())
    }

    async fn append_sessions(
        &self,
        id: TournamentId,
        sessions: &[NewSession],
    ) -> StorageResult<AppendOutcome> {
        let mut state = self.state.lock().await;
        match state.tournaments.get(&id).map(|t| t.status) {
            None => return Ok(AppendOutcome::NotFound),
            Some(TournamentStatus::InProgress) => {}
            Some(other) => return Ok(AppendOutcome::TournamentNotInProgress(other)),
        }
        if state.match_number_taken(id, sessions) {
            return Ok(AppendOutcome::RoundTaken);
        }
        let stored = state.insert_sessions(id, sessions);
        if let Some(tournament) = state.tournaments.get_mut(&id) {
            tournament.results_version += 1;
        }
        Ok(AppendOutcome::Appended(stored))
    }
}

#[async_trait]
impl StandingRepository for MemoryStore {
    async fn replace_standings(
        &self,
        tournament_id: TournamentId,
        results_version: i64,
        entries: &[StandingEntry],
    ) -> StorageResult<bool> {
        let mut state = self.state.lock().await;
        let Some(tournament) = state.tournaments.get_mut(&tournament_id) else {
            return Ok(false);
        };
        if results_version <= tournament.standings_version {
            return Ok(false);
        }
        tournament.standings_version = results_version;
        state.standings.insert(tournament_id, entries.to_vec());
        Ok(true)
    }

    async fn list_standings(&self, tournament_id: TournamentId) -> StorageResult<Vec<StandingEntry>> {
        let state = self.state.lock().await;
        let mut entries = state.standings.get(&tournament_id).cloned().unwrap_or_default();
        entries.sort_by_key(|e| (e.rank, e.participant_id));
        Ok(entries)
    }
}

#[async_trait]
impl RewardLedgerRepository for MemoryStore {
    async fn insert_entry(&self, entry: &NewLedgerEntry) -> StorageResult<LedgerInsert> {
        let mut state = self.state.lock().await;
        if state.ledger.contains_key(&entry.idempotency_key) {
            return Ok(LedgerInsert::Duplicate);
        }
        let id = state.next_id();
        let stored = entry.clone().into_entry(id, Utc::now());
        state
            .ledger
            .insert(stored.idempotency_key.clone(), stored.clone());
        Ok(LedgerInsert::Created(stored))
    }

    async fn find_by_key(&self, idempotency_key: &str) -> StorageResult<Option<RewardLedgerEntry>> {
        Ok(self.state.lock().await.ledger.get(idempotency_key).cloned())
    }

    async fn list_entries(&self, tournament_id: TournamentId) -> StorageResult<Vec<RewardLedgerEntry>> {
        // BTreeMap iteration is already key-ordered
        Ok(self
            .state
            .lock()
            .await
            .ledger
            .values()
            .filter(|e| e.tournament_id == tournament_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RosterSource for MemoryStore {
    async fn enrolled_participants(&self, tournament_id: TournamentId) -> StorageResult<Vec<ParticipantId>> {
        Ok(self
            .state
            .lock()
            .await
            .enrollments
            .get(&tournament_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl AssignmentDirectory for MemoryStore {
    async fn assignments(&self, tournament_id: TournamentId) -> StorageResult<Vec<InstructorAssignment>> {
        Ok(self
            .state
            .lock()
            .await
            .assignments
            .get(&tournament_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl SkillDirectory for MemoryStore {
    async fn has_skill(&self, participant_id: ParticipantId, skill: &str) -> StorageResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .skills
            .get(&participant_id)
            .is_some_and(|skills| skills.contains(skill)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewards::{RewardGrant, RewardType};
    use crate::tournament::{Slot, Stage, TournamentFormat};

    fn pair(match_number: u32, a: ParticipantId, b: ParticipantId) -> NewSession {
        NewSession::scheduled(match_number, 1, Stage::League, vec![Slot::fixed(a), Slot::fixed(b)], "TBD")
    }

    async fn running(store: &MemoryStore) -> Tournament {
        let t = store
            .create_tournament(&NewTournament::new("Cup", TournamentFormat::League))
            .await
            .unwrap();
        assert!(store
            .start_tournament(t.id, TournamentStatus::Draft, &[1, 2], &[pair(1, 1, 2)])
            .await
            .unwrap());
        store.find_tournament(t.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_status_compare_and_set() {
        let store = MemoryStore::new();
        let t = store
            .create_tournament(&NewTournament::new("Cup", TournamentFormat::League))
            .await
            .unwrap();

        assert!(store
            .compare_and_set_status(t.id, TournamentStatus::Draft, TournamentStatus::Cancelled)
            .await
            .unwrap());
        // Second writer expected the old status
        assert!(!store
            .compare_and_set_status(t.id, TournamentStatus::Draft, TournamentStatus::InstructorAssigned)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_start_freezes_roster() {
        let store = MemoryStore::new();
        let t = running(&store).await;
        assert_eq!(t.status, TournamentStatus::InProgress);
        assert_eq!(t.roster, vec![1, 2]);
        assert!(t.started_at.is_some());
        assert_eq!(store.list_sessions(t.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_once() {
        let store = MemoryStore::new();
        let t = running(&store).await;
        let session = store.list_sessions(t.id).await.unwrap().remove(0);

        let first = store
            .finalize_session(session.id, &MatchResult::score(2, 1))
            .await
            .unwrap();
        assert!(matches!(first, FinalizeOutcome::Finalized { results_version: 1, .. }));

        let second = store
            .finalize_session(session.id, &MatchResult::score(0, 5))
            .await
            .unwrap();
        match second {
            FinalizeOutcome::AlreadyFinalized(stored) => {
                assert_eq!(stored.result, Some(MatchResult::score(2, 1)));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_append_rejects_taken_match_numbers() {
        let store = MemoryStore::new();
        let t = running(&store).await;
        assert_eq!(
            store.append_sessions(t.id, &[pair(1, 2, 1)]).await.unwrap(),
            AppendOutcome::RoundTaken
        );
        match store.append_sessions(t.id, &[pair(2, 2, 1)]).await.unwrap() {
            AppendOutcome::Appended(added) => assert_eq!(added.len(), 1),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_append_requires_running_tournament() {
        let store = MemoryStore::new();
        let t = running(&store).await;
        assert!(store
            .compare_and_set_status(t.id, TournamentStatus::InProgress, TournamentStatus::Completed)
            .await
            .unwrap());

        assert_eq!(
            store.append_sessions(t.id, &[pair(2, 2, 1)]).await.unwrap(),
            AppendOutcome::TournamentNotInProgress(TournamentStatus::Completed)
        );
        let stored = store.find_tournament(t.id).await.unwrap().unwrap();
        assert_eq!(stored.results_version, 0);
        assert_eq!(store.list_sessions(t.id).await.unwrap().len(), 1);
        assert_eq!(store.append_sessions(99, &[]).await.unwrap(), AppendOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_stale_standings_are_ignored() {
        let store = MemoryStore::new();
        let t = running(&store).await;
        let fresh = vec![StandingEntry::new(t.id, 1)];
        assert!(store.replace_standings(t.id, 3, &fresh).await.unwrap());
        assert!(!store.replace_standings(t.id, 2, &[]).await.unwrap());
        assert_eq!(store.list_standings(t.id).await.unwrap(), fresh);
    }

    #[tokio::test]
    async fn test_ledger_key_is_unique() {
        let store = MemoryStore::new();
        let row = NewLedgerEntry::from_grant(1, 10, 1, &RewardGrant::Currency { amount: 5 });
        assert!(matches!(store.insert_entry(&row).await.unwrap(), LedgerInsert::Created(_)));
        assert_eq!(store.insert_entry(&row).await.unwrap(), LedgerInsert::Duplicate);

        let stored = store.find_by_key(&row.idempotency_key).await.unwrap().unwrap();
        assert_eq!(stored.reward_type, RewardType::Currency);
        assert_eq!(store.list_entries(1).await.unwrap().len(), 1);
    }
}
