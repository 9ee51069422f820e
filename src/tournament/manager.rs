//! Tournament manager: lifecycle, schedule generation, results and rewards.
//!
//! The manager owns no state of its own. Every operation reads from the
//! repositories, decides through the pure state machine and generators, and
//! writes back with conditional updates, so any number of managers may run
//! against the same store.

use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;

use super::external::{AssignmentDirectory, RosterSource};
use super::models::{
    MatchResult, NewTournament, ParticipantId, Session, SessionId, Stage, Tournament,
    TournamentFormat, TournamentId, TournamentStatus,
};
use super::state_machine::{GuardContext, LifecycleError, LifecycleEvent, Transition, transition};
use crate::db::{
    AppendOutcome, FinalizeOutcome, RewardLedgerRepository, StandingRepository, StorageError,
    TournamentRepository,
};
use crate::logging;
use crate::ranking::{RankingContext, RankingRulesError, StandingEntry, compute_standings, group_table};
use crate::rewards::{DistributionReport, RewardError, RewardPipeline, SkillDirectory};
use crate::schedule::bracket::apply_updates;
use crate::schedule::{
    FormatGenerator, GenerationContext, GenerationError, PairingHistory, SessionGenerator,
    SlotUpdate, SwissGenerator, resolve_slots,
};
use crate::venue::{FallbackVenueResolver, VenueResolver};

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Tournament {id} is {actual}, expected {expected}")]
    InvalidState {
        id: TournamentId,
        expected: TournamentStatus,
        actual: TournamentStatus,
    },

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid ranking rules: {0}")]
    RankingRules(#[from] RankingRulesError),

    #[error("Reward error: {0}")]
    Rewards(#[from] RewardError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid result: {0}")]
    InvalidResult(String),

    #[error("Session {0} is still waiting for its participants")]
    SessionNotReady(SessionId),

    #[error("Session {0} already has a result")]
    AlreadyFinalized(SessionId),

    #[error("Tournament {id} left {expected} concurrently")]
    ConcurrentTransition {
        id: TournamentId,
        expected: TournamentStatus,
    },

    #[error("{operation} is not supported for {format} tournaments")]
    UnsupportedOperation {
        format: TournamentFormat,
        operation: &'static str,
    },

    #[error("Round {0} still has sessions without results")]
    RoundInProgress(u32),
}

impl TournamentError {
    /// Get a client-safe error message that doesn't leak storage internals
    pub fn client_message(&self) -> String {
        match self {
            TournamentError::Storage(e) => e.client_message(),
            TournamentError::Rewards(e) => e.client_message(),
            _ => self.to_string(),
        }
    }
}

pub type TournamentResult<T> = Result<T, TournamentError>;

/// Engine-wide behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Complete a tournament when its last session is finalized
    pub auto_complete: bool,
    /// Parallel fields used when a tournament does not configure its own
    pub default_parallel_fields: u32,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            auto_complete: true,
            default_parallel_fields: 1,
        }
    }
}

/// Outcome of completing a tournament
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub tournament: Tournament,
    pub rewards: DistributionReport,
}

/// Everything that followed from recording one result
#[derive(Debug, Clone, PartialEq)]
pub struct ResultReport {
    pub session: Session,
    /// Standings recomputed including this result
    pub standings: Vec<StandingEntry>,
    /// Downstream bracket slots filled by this result
    pub resolved_slots: Vec<SlotUpdate>,
    /// Swiss sessions generated because this result closed a round
    pub next_round: Vec<Session>,
    /// Set when this result completed the tournament
    pub completion: Option<CompletionReport>,
}

/// Tournament manager
#[derive(Clone)]
pub struct TournamentManager {
    tournaments: Arc<dyn TournamentRepository>,
    standings: Arc<dyn StandingRepository>,
    roster: Arc<dyn RosterSource>,
    assignments: Arc<dyn AssignmentDirectory>,
    venue: Arc<dyn VenueResolver>,
    rewards: RewardPipeline,
    settings: ManagerSettings,
}

impl TournamentManager {
    /// Create a new tournament manager over one store implementing every repository
    pub fn new<S>(
        store: Arc<S>,
        roster: Arc<dyn RosterSource>,
        assignments: Arc<dyn AssignmentDirectory>,
        skills: Arc<dyn SkillDirectory>,
    ) -> Self
    where
        S: TournamentRepository + StandingRepository + RewardLedgerRepository + 'static,
    {
        let ledger: Arc<dyn RewardLedgerRepository> = store.clone();
        Self {
            tournaments: store.clone(),
            standings: store,
            roster,
            assignments,
            venue: Arc::new(FallbackVenueResolver),
            rewards: RewardPipeline::new(ledger, skills),
            settings: ManagerSettings::default(),
        }
    }

    /// Replace the venue fallback chain
    pub fn with_venue_resolver(mut self, resolver: impl VenueResolver + 'static) -> Self {
        self.venue = Arc::new(resolver);
        self
    }

    pub fn with_settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Validate and store a new tournament in `Draft`
    ///
    /// # Errors
    ///
    /// Rejects, without writing anything, a scoring mode the format cannot
    /// run, malformed ranking rules, a reward config with a missing placement
    /// band, and a round count of zero.
    pub async fn create_tournament(&self, new: NewTournament) -> TournamentResult<Tournament> {
        let expected_mode = new.format.scoring_mode();
        if new.scoring_mode != expected_mode {
            return Err(GenerationError::ScoringModeMismatch {
                format: new.format,
                mode: new.scoring_mode,
            }
            .into());
        }
        new.ranking_rules.validate(new.scoring_mode)?;
        new.reward_config.validate()?;

        if new.number_of_rounds == 0 {
            return Err(GenerationError::InvalidRoundCount {
                rounds: 0,
                reason: "at least one round is required".to_string(),
            }
            .into());
        }

        let tournament = self.tournaments.create_tournament(&new).await?;
        info!(
            "Created {} tournament {} ({})",
            tournament.format, tournament.id, tournament.name
        );
        Ok(tournament)
    }

    /// Get tournament by ID
    pub async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.tournaments
            .find_tournament(id)
            .await?
            .ok_or(TournamentError::NotFound(id))
    }

    /// Sessions of a tournament ordered by match number
    pub async fn sessions(&self, id: TournamentId) -> TournamentResult<Vec<Session>> {
        Ok(self.tournaments.list_sessions(id).await?)
    }

    /// Last stored standings
    pub async fn standings(&self, id: TournamentId) -> TournamentResult<Vec<StandingEntry>> {
        Ok(self.standings.list_standings(id).await?)
    }

    /// `Draft` to `InstructorAssigned`; needs an accepted lead instructor
    pub async fn assign_lead_instructor(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.advance(id, LifecycleEvent::AssignLeadInstructor).await
    }

    /// `InstructorAssigned` to `ReadyForEnrollment`; needs an accepted assistant
    pub async fn mark_ready_for_enrollment(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.advance(id, LifecycleEvent::MarkReadyForEnrollment).await
    }

    pub async fn open_enrollment(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.advance(id, LifecycleEvent::OpenEnrollment).await
    }

    /// Abandon a tournament from any non-terminal state; rewards are never paid
    pub async fn cancel_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.advance(id, LifecycleEvent::Cancel).await
    }

    /// Freeze the roster, generate the schedule and move to `InProgress`
    ///
    /// Generation happens before anything is written; a roster or config the
    /// format rejects leaves the tournament in `EnrollmentOpen` with no sessions.
    pub async fn start_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        let tournament = self.get_tournament(id).await?;
        let step = transition(tournament.status, LifecycleEvent::Start, &GuardContext::default())?;

        let roster = self.roster.enrolled_participants(id).await?;
        let venue = self.venue.resolve(&tournament);
        let generator = FormatGenerator::from(tournament.format);
        let sessions = generator.generate(&roster, &self.generation_context(&tournament, &venue))?;

        if !self
            .tournaments
            .start_tournament(id, step.from, &roster, &sessions)
            .await?
        {
            return Err(TournamentError::ConcurrentTransition {
                id,
                expected: step.from,
            });
        }
        logging::log_transition(id, step.from, step.to);
        info!(
            "Tournament {} started with {} participants and {} sessions",
            id,
            roster.len(),
            sessions.len()
        );

        // Initial table, including any round-one byes
        self.recompute_standings(id).await?;
        self.get_tournament(id).await
    }

    /// Move to `Completed` and distribute rewards
    ///
    /// Without `admin_override` every session must be finalized. If the
    /// distribution fails after the status is stored, [`Self::distribute_rewards`]
    /// finishes it safely.
    pub async fn complete_tournament(
        &self,
        id: TournamentId,
        admin_override: bool,
    ) -> TournamentResult<CompletionReport> {
        let tournament = self.get_tournament(id).await?;
        let sessions = self.tournaments.list_sessions(id).await?;
        let guards = GuardContext {
            unfinalized_sessions: sessions.iter().filter(|s| !s.is_finalized()).count(),
            ..GuardContext::default()
        };
        let step = transition(
            tournament.status,
            LifecycleEvent::Complete { admin_override },
            &guards,
        )?;
        if admin_override && guards.unfinalized_sessions > 0 {
            warn!(
                "Tournament {} completed by override with {} open sessions",
                id, guards.unfinalized_sessions
            );
        }

        self.commit(id, step).await?;
        let rewards = self.distribute_rewards(id).await?;
        Ok(CompletionReport {
            tournament: self.get_tournament(id).await?,
            rewards,
        })
    }

    /// Run the reward pipeline for a completed tournament
    ///
    /// Safe to call any number of times; later runs only find existing rows.
    pub async fn distribute_rewards(&self, id: TournamentId) -> TournamentResult<DistributionReport> {
        let tournament = self.get_tournament(id).await?;
        let standings = self.recompute_standings(id).await?;
        let report = self.rewards.distribute(&tournament, &standings).await?;
        logging::log_distribution(&report);
        Ok(report)
    }

    /// Recompute standings from every finalized session and store them
    ///
    /// The stored table is only replaced if no fresher computation landed first.
    pub async fn recompute_standings(&self, id: TournamentId) -> TournamentResult<Vec<StandingEntry>> {
        // Version is read before the sessions so it never claims newer results
        let tournament = self.get_tournament(id).await?;
        let sessions = self.tournaments.list_sessions(id).await?;
        self.store_standings(&tournament, tournament.results_version, &sessions)
            .await
    }

    /// Record the result of a session
    ///
    /// Recomputes standings, fills downstream bracket slots, pairs the next
    /// Swiss round once the current one is finished and, when enabled,
    /// completes the tournament after its last session.
    pub async fn record_result(
        &self,
        session_id: SessionId,
        result: MatchResult,
    ) -> TournamentResult<ResultReport> {
        let session = self
            .tournaments
            .find_session(session_id)
            .await?
            .ok_or(TournamentError::SessionNotFound(session_id))?;
        if session.is_finalized() {
            return Err(TournamentError::AlreadyFinalized(session_id));
        }
        if !session.is_ready() {
            return Err(TournamentError::SessionNotReady(session_id));
        }
        validate_result(&session, &result)?;

        let (session, results_version) =
            match self.tournaments.finalize_session(session_id, &result).await? {
                FinalizeOutcome::Finalized {
                    session,
                    results_version,
                } => (session, results_version),
                FinalizeOutcome::AlreadyFinalized(_) => {
                    return Err(TournamentError::AlreadyFinalized(session_id));
                }
                FinalizeOutcome::TournamentNotInProgress(actual) => {
                    return Err(TournamentError::InvalidState {
                        id: session.tournament_id,
                        expected: TournamentStatus::InProgress,
                        actual,
                    });
                }
                FinalizeOutcome::NotFound => return Err(TournamentError::SessionNotFound(session_id)),
            };
        debug!(
            "Session {} (match {}) finalized, results version {}",
            session.id, session.match_number, results_version
        );

        let tournament = self.get_tournament(session.tournament_id).await?;
        let mut sessions = self.tournaments.list_sessions(tournament.id).await?;

        let resolved_slots = if tournament.format.is_bracket() {
            let ctx = RankingContext::for_tournament(&tournament);
            let updates = resolve_slots(&sessions, |group| group_table(&ctx, group, &sessions));
            if !updates.is_empty() {
                self.tournaments.update_slots(&updates).await?;
                apply_updates(&mut sessions, &updates);
            }
            updates
        } else {
            Vec::new()
        };

        let standings = self
            .store_standings(&tournament, results_version, &sessions)
            .await?;

        let mut next_round = Vec::new();
        if tournament.format == TournamentFormat::Swiss
            && round_finished(&sessions, session.round)
            && session.round < tournament.number_of_rounds
        {
            match self.pair_next_round(&tournament, &sessions, &standings).await {
                Ok(round) => next_round = round,
                Err(TournamentError::Generation(e)) => {
                    warn!("Tournament {}: next swiss round not generated: {}", tournament.id, e);
                }
                // Completed or cancelled while this result was being recorded
                Err(TournamentError::InvalidState { actual, .. }) => {
                    debug!(
                        "Tournament {}: next swiss round skipped, tournament is {}",
                        tournament.id, actual
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let completion = if self.settings.auto_complete
            && next_round.is_empty()
            && schedule_exhausted(&tournament, &sessions)
        {
            self.auto_complete(tournament.id).await?
        } else {
            None
        };

        Ok(ResultReport {
            session,
            standings,
            resolved_slots,
            next_round,
            completion,
        })
    }

    /// Pair and store the next Swiss round
    ///
    /// Returns the round's sessions; if a concurrent caller already stored
    /// them, those are returned instead.
    ///
    /// # Errors
    ///
    /// - `UnsupportedOperation` for any format but Swiss
    /// - `RoundInProgress` while the current round has open sessions
    /// - `Generation(RoundLimitReached)` once every round exists
    /// - `Generation(SwissPairingExhausted)` when only rematches remain
    pub async fn generate_next_round(&self, id: TournamentId) -> TournamentResult<Vec<Session>> {
        let tournament = self.get_tournament(id).await?;
        if tournament.format != TournamentFormat::Swiss {
            return Err(TournamentError::UnsupportedOperation {
                format: tournament.format,
                operation: "generate_next_round",
            });
        }
        if tournament.status != TournamentStatus::InProgress {
            return Err(TournamentError::InvalidState {
                id,
                expected: TournamentStatus::InProgress,
                actual: tournament.status,
            });
        }

        let sessions = self.tournaments.list_sessions(id).await?;
        let current = current_round(&sessions);
        if !round_finished(&sessions, current) {
            return Err(TournamentError::RoundInProgress(current));
        }

        let ctx = RankingContext::for_tournament(&tournament);
        let standings = compute_standings(&ctx, &tournament.roster, &sessions);
        self.pair_next_round(&tournament, &sessions, &standings).await
    }

    async fn pair_next_round(
        &self,
        tournament: &Tournament,
        sessions: &[Session],
        standings: &[StandingEntry],
    ) -> TournamentResult<Vec<Session>> {
        let round = current_round(sessions) + 1;
        let first_match_number = sessions.iter().map(|s| s.match_number).max().unwrap_or(0) + 1;
        let ranked: Vec<(ParticipantId, f64)> = standings
            .iter()
            .map(|entry| (entry.participant_id, entry.score))
            .collect();
        let history = PairingHistory::from_sessions(sessions);

        let venue = self.venue.resolve(tournament);
        let ctx = self.generation_context(tournament, &venue);
        let new_sessions =
            SwissGenerator.next_round(&ranked, &history, round, first_match_number, &ctx)?;

        match self
            .tournaments
            .append_sessions(tournament.id, &new_sessions)
            .await?
        {
            AppendOutcome::Appended(stored) => {
                info!(
                    "Tournament {}: swiss round {} paired ({} sessions)",
                    tournament.id,
                    round,
                    stored.len()
                );
                // Byes are finalized on creation and count immediately
                self.recompute_standings(tournament.id).await?;
                Ok(stored)
            }
            AppendOutcome::RoundTaken => {
                debug!(
                    "Tournament {}: swiss round {} already paired by another caller",
                    tournament.id, round
                );
                let existing = self.tournaments.list_sessions(tournament.id).await?;
                Ok(existing.into_iter().filter(|s| s.round == round).collect())
            }
            AppendOutcome::TournamentNotInProgress(actual) => Err(TournamentError::InvalidState {
                id: tournament.id,
                expected: TournamentStatus::InProgress,
                actual,
            }),
            AppendOutcome::NotFound => Err(TournamentError::NotFound(tournament.id)),
        }
    }

    async fn auto_complete(&self, id: TournamentId) -> TournamentResult<Option<CompletionReport>> {
        match self.complete_tournament(id, false).await {
            Ok(report) => Ok(Some(report)),
            // Another caller's last result got there first
            Err(TournamentError::ConcurrentTransition { .. })
            | Err(TournamentError::Lifecycle(LifecycleError::Terminal(_))) => {
                debug!("Tournament {} already completed elsewhere", id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn store_standings(
        &self,
        tournament: &Tournament,
        results_version: i64,
        sessions: &[Session],
    ) -> TournamentResult<Vec<StandingEntry>> {
        let ctx = RankingContext::for_tournament(tournament);
        let entries = compute_standings(&ctx, &tournament.roster, sessions);
        if !self
            .standings
            .replace_standings(tournament.id, results_version, &entries)
            .await?
        {
            debug!(
                "Tournament {}: standings for version {} superseded",
                tournament.id, results_version
            );
        }
        Ok(entries)
    }

    /// Apply a guarded event that needs no work besides the status change
    async fn advance(&self, id: TournamentId, event: LifecycleEvent) -> TournamentResult<Tournament> {
        let tournament = self.get_tournament(id).await?;
        let assignments = match event {
            LifecycleEvent::AssignLeadInstructor | LifecycleEvent::MarkReadyForEnrollment => {
                self.assignments.assignments(id).await?
            }
            _ => Vec::new(),
        };
        let guards = GuardContext {
            assignments: &assignments,
            location_id: tournament.location.location_id,
            unfinalized_sessions: 0,
        };
        let step = transition(tournament.status, event, &guards)?;
        self.commit(id, step).await?;
        self.get_tournament(id).await
    }

    async fn commit(&self, id: TournamentId, step: Transition) -> TournamentResult<()> {
        if !self
            .tournaments
            .compare_and_set_status(id, step.from, step.to)
            .await?
        {
            return Err(TournamentError::ConcurrentTransition {
                id,
                expected: step.from,
            });
        }
        logging::log_transition(id, step.from, step.to);
        Ok(())
    }

    fn generation_context<'a>(&self, tournament: &'a Tournament, venue: &'a str) -> GenerationContext<'a> {
        GenerationContext::new(tournament, venue)
            .with_default_parallel_fields(self.settings.default_parallel_fields)
    }
}

/// Check a result fits the session it is recorded for
fn validate_result(session: &Session, result: &MatchResult) -> TournamentResult<()> {
    match (session.stage, result) {
        (Stage::Individual, MatchResult::Attempt { value }) => {
            if !value.is_finite() {
                return Err(TournamentError::InvalidResult(format!(
                    "attempt value {value} is not a number"
                )));
            }
            Ok(())
        }
        (Stage::Individual, _) => Err(TournamentError::InvalidResult(
            "individual sessions take an attempt value".to_string(),
        )),
        (_, MatchResult::Bye) => Err(TournamentError::InvalidResult(
            "byes are assigned by the schedule".to_string(),
        )),
        (_, MatchResult::Attempt { .. }) => Err(TournamentError::InvalidResult(
            "head-to-head sessions take a score".to_string(),
        )),
        (
            stage,
            MatchResult::HeadToHead {
                home_score,
                away_score,
                decided_by,
            },
        ) => {
            let level = home_score == away_score;
            match decided_by {
                None if level && stage.is_elimination() => Err(TournamentError::InvalidResult(
                    "a level elimination match needs decided_by".to_string(),
                )),
                Some(_) if !level || !stage.is_elimination() => Err(TournamentError::InvalidResult(
                    "decided_by only settles a level elimination match".to_string(),
                )),
                Some(winner) if !session.involves(*winner) => Err(TournamentError::InvalidResult(
                    format!("participant {winner} is not playing this session"),
                )),
                _ => Ok(()),
            }
        }
    }
}

fn current_round(sessions: &[Session]) -> u32 {
    sessions.iter().map(|s| s.round).max().unwrap_or(0)
}

fn round_finished(sessions: &[Session], round: u32) -> bool {
    sessions
        .iter()
        .filter(|s| s.round == round)
        .all(Session::is_finalized)
}

/// All sessions finalized and, for Swiss, every round generated
fn schedule_exhausted(tournament: &Tournament, sessions: &[Session]) -> bool {
    let all_final = sessions.iter().all(Session::is_finalized);
    match tournament.format {
        TournamentFormat::Swiss => all_final && current_round(sessions) >= tournament.number_of_rounds,
        _ => all_final,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::rewards::{PlacementBand, RewardConfig, RewardGrant};
    use crate::tournament::{InstructorAssignment, Slot};
    use crate::venue::VenueInfo;
    use chrono::Utc;

    fn manager(store: &Arc<MemoryStore>) -> TournamentManager {
        TournamentManager::new(store.clone(), store.clone(), store.clone(), store.clone())
    }

    async fn enrollment_open(
        manager: &TournamentManager,
        store: &MemoryStore,
        new: NewTournament,
        participants: &[ParticipantId],
    ) -> Tournament {
        let t = manager.create_tournament(new).await.unwrap();
        store.assign_instructor(t.id, InstructorAssignment::lead(1)).await;
        store
            .assign_instructor(t.id, InstructorAssignment::assistant(2, None))
            .await;
        manager.assign_lead_instructor(t.id).await.unwrap();
        manager.mark_ready_for_enrollment(t.id).await.unwrap();
        manager.open_enrollment(t.id).await.unwrap();
        for &p in participants {
            store.enroll(t.id, p).await;
        }
        t
    }

    #[tokio::test]
    async fn test_create_rejects_mismatched_scoring_mode() {
        let store = Arc::new(MemoryStore::new());
        let mut new = NewTournament::new("Cup", TournamentFormat::League);
        new.scoring_mode = crate::tournament::ScoringMode::Individual;
        let result = manager(&store).create_tournament(new).await;
        assert!(matches!(
            result,
            Err(TournamentError::Generation(GenerationError::ScoringModeMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_reward_gap() {
        let store = Arc::new(MemoryStore::new());
        let new = NewTournament::new("Cup", TournamentFormat::League).with_reward_config(
            RewardConfig::new(vec![PlacementBand::rank(2, vec![RewardGrant::Currency { amount: 5 }])]),
        );
        let result = manager(&store).create_tournament(new).await;
        assert!(matches!(
            result,
            Err(TournamentError::Rewards(RewardError::MissingPlacementBand(1)))
        ));
    }

    #[tokio::test]
    async fn test_lead_instructor_guard() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store);
        let t = manager
            .create_tournament(NewTournament::new("Cup", TournamentFormat::League))
            .await
            .unwrap();

        let result = manager.assign_lead_instructor(t.id).await;
        assert!(matches!(
            result,
            Err(TournamentError::Lifecycle(LifecycleError::MissingLeadInstructor))
        ));
        assert_eq!(manager.get_tournament(t.id).await.unwrap().status, TournamentStatus::Draft);
    }

    #[tokio::test]
    async fn test_assistant_must_match_location() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store);
        let t = manager
            .create_tournament(
                NewTournament::new("Cup", TournamentFormat::League)
                    .with_location(VenueInfo::city("Leeds").with_location_id(4)),
            )
            .await
            .unwrap();
        store.assign_instructor(t.id, InstructorAssignment::lead(1)).await;
        store
            .assign_instructor(t.id, InstructorAssignment::assistant(2, Some(9)))
            .await;
        manager.assign_lead_instructor(t.id).await.unwrap();

        assert!(matches!(
            manager.mark_ready_for_enrollment(t.id).await,
            Err(TournamentError::Lifecycle(LifecycleError::MissingAssistantInstructor))
        ));
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_state_untouched() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store);
        let t = enrollment_open(&manager, &store, NewTournament::new("Cup", TournamentFormat::Knockout), &[1]).await;

        let result = manager.start_tournament(t.id).await;
        assert!(matches!(
            result,
            Err(TournamentError::Generation(GenerationError::InsufficientRoster { .. }))
        ));
        let stored = manager.get_tournament(t.id).await.unwrap();
        assert_eq!(stored.status, TournamentStatus::EnrollmentOpen);
        assert!(stored.roster.is_empty());
        assert!(manager.sessions(t.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_stamps_resolved_venue() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store).with_venue_resolver(|t: &Tournament| format!("Pitch for {}", t.name));
        let t = enrollment_open(&manager, &store, NewTournament::new("Cup", TournamentFormat::League), &[1, 2, 3]).await;

        let started = manager.start_tournament(t.id).await.unwrap();
        assert_eq!(started.status, TournamentStatus::InProgress);
        assert_eq!(started.roster, vec![1, 2, 3]);

        let sessions = manager.sessions(t.id).await.unwrap();
        assert_eq!(sessions.len(), 3);
        assert!(sessions.iter().all(|s| s.venue == "Pitch for Cup"));
        assert_eq!(manager.standings(t.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_level_knockout_needs_decider() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store);
        let t = enrollment_open(&manager, &store, NewTournament::new("Cup", TournamentFormat::Knockout), &[1, 2]).await;
        manager.start_tournament(t.id).await.unwrap();
        let final_match = manager.sessions(t.id).await.unwrap().remove(0);

        let level = manager.record_result(final_match.id, MatchResult::score(1, 1)).await;
        assert!(matches!(level, Err(TournamentError::InvalidResult(_))));

        let report = manager
            .record_result(final_match.id, MatchResult::decided(1, 1, 2))
            .await
            .unwrap();
        assert_eq!(report.standings[0].participant_id, 2);
        let completion = report.completion.expect("last session completes the tournament");
        assert_eq!(completion.tournament.status, TournamentStatus::Completed);
    }

    #[tokio::test]
    async fn test_result_recorded_once() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store).with_settings(ManagerSettings {
            auto_complete: false,
            ..ManagerSettings::default()
        });
        let t = enrollment_open(&manager, &store, NewTournament::new("Cup", TournamentFormat::League), &[1, 2]).await;
        manager.start_tournament(t.id).await.unwrap();
        let session = manager.sessions(t.id).await.unwrap().remove(0);

        let report = manager.record_result(session.id, MatchResult::score(2, 0)).await.unwrap();
        assert!(report.completion.is_none());
        assert!(matches!(
            manager.record_result(session.id, MatchResult::score(0, 2)).await,
            Err(TournamentError::AlreadyFinalized(_))
        ));
        assert_eq!(
            manager.get_tournament(t.id).await.unwrap().status,
            TournamentStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_pending_bracket_slot_rejects_results() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store);
        let t = enrollment_open(&manager, &store, NewTournament::new("Cup", TournamentFormat::Knockout), &[1, 2, 3, 4]).await;
        manager.start_tournament(t.id).await.unwrap();
        let final_match = manager
            .sessions(t.id)
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.round == 2)
            .unwrap();

        assert!(matches!(
            manager.record_result(final_match.id, MatchResult::score(1, 0)).await,
            Err(TournamentError::SessionNotReady(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_requires_all_finalized() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store);
        let t = enrollment_open(&manager, &store, NewTournament::new("Cup", TournamentFormat::League), &[1, 2, 3]).await;
        manager.start_tournament(t.id).await.unwrap();

        assert!(matches!(
            manager.complete_tournament(t.id, false).await,
            Err(TournamentError::Lifecycle(LifecycleError::UnfinalizedSessions(3)))
        ));
        let report = manager.complete_tournament(t.id, true).await.unwrap();
        assert_eq!(report.tournament.status, TournamentStatus::Completed);
        assert!(report.tournament.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_swiss_rounds_follow_results() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store);
        let t = enrollment_open(
            &manager,
            &store,
            NewTournament::new("Open", TournamentFormat::Swiss).with_rounds(2),
            &[1, 2, 3, 4],
        )
        .await;
        manager.start_tournament(t.id).await.unwrap();

        let round_one = manager.sessions(t.id).await.unwrap();
        assert_eq!(round_one.len(), 2);
        assert!(matches!(
            manager.generate_next_round(t.id).await,
            Err(TournamentError::RoundInProgress(1))
        ));

        let first = manager
            .record_result(round_one[0].id, MatchResult::score(1, 0))
            .await
            .unwrap();
        assert!(first.next_round.is_empty());
        let second = manager
            .record_result(round_one[1].id, MatchResult::score(0, 1))
            .await
            .unwrap();
        assert_eq!(second.next_round.len(), 2);
        assert!(second.next_round.iter().all(|s| s.round == 2));

        // Round two is open now
        assert!(matches!(
            manager.generate_next_round(t.id).await,
            Err(TournamentError::RoundInProgress(2))
        ));
    }

    #[tokio::test]
    async fn test_next_round_only_for_swiss() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store);
        let t = enrollment_open(&manager, &store, NewTournament::new("Cup", TournamentFormat::League), &[1, 2]).await;
        manager.start_tournament(t.id).await.unwrap();
        assert!(matches!(
            manager.generate_next_round(t.id).await,
            Err(TournamentError::UnsupportedOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_suppresses_rewards() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store);
        let t = enrollment_open(&manager, &store, NewTournament::new("Cup", TournamentFormat::League), &[1, 2]).await;
        manager.start_tournament(t.id).await.unwrap();
        manager.cancel_tournament(t.id).await.unwrap();

        assert!(matches!(
            manager.distribute_rewards(t.id).await,
            Err(TournamentError::Rewards(RewardError::RewardsSuppressed(_)))
        ));
        assert!(matches!(
            manager.cancel_tournament(t.id).await,
            Err(TournamentError::Lifecycle(LifecycleError::Terminal(TournamentStatus::Cancelled)))
        ));
    }

    #[test]
    fn test_result_validation() {
        let session = |stage| {
            crate::tournament::NewSession::scheduled(1, 1, stage, vec![Slot::fixed(1), Slot::fixed(2)], "TBD")
                .into_session(1, 1, Utc::now())
        };

        assert!(validate_result(&session(Stage::League), &MatchResult::score(1, 1)).is_ok());
        assert!(validate_result(&session(Stage::League), &MatchResult::decided(1, 1, 1)).is_err());
        assert!(validate_result(&session(Stage::Knockout), &MatchResult::decided(1, 1, 9)).is_err());
        assert!(validate_result(&session(Stage::Knockout), &MatchResult::decided(2, 1, 1)).is_err());
        assert!(validate_result(&session(Stage::Swiss), &MatchResult::Bye).is_err());
        assert!(validate_result(&session(Stage::League), &MatchResult::attempt(3.0)).is_err());
        assert!(validate_result(&session(Stage::Individual), &MatchResult::attempt(f64::NAN)).is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = ManagerSettings::default();
        assert!(settings.auto_complete);
        assert_eq!(settings.default_parallel_fields, 1);
    }
}
