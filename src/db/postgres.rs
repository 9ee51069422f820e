//! PostgreSQL implementation of the repositories.
//!
//! Every conditional write is a single `UPDATE ... WHERE` whose row count
//! decides the outcome, so concurrent callers never both win. Structured
//! values (configs, slots, results) live in JSONB columns.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;
use sqlx::{PgConnection, Row};
use std::str::FromStr;
use std::sync::Arc;

use super::errors::{StorageError, StorageResult};
use super::repository::{
    AppendOutcome, FinalizeOutcome, RewardLedgerRepository, StandingRepository, TournamentRepository,
};
use super::timeouts::{with_default_timeout, with_transaction_timeout};
use crate::ranking::StandingEntry;
use crate::rewards::{LedgerInsert, NewLedgerEntry, RewardLedgerEntry};
use crate::schedule::SlotUpdate;
use crate::tournament::{
    MatchResult, NewSession, NewTournament, ParticipantId, Session, SessionId, Slot, Tournament,
    TournamentId, TournamentStatus,
};

const TOURNAMENT_COLUMNS: &str = "id, name, format, status, scoring_mode, number_of_rounds, \
     format_config, ranking_rules, reward_config, location, roster, results_version, \
     standings_version, created_at, started_at, completed_at";

const SESSION_COLUMNS: &str = "id, tournament_id, match_number, round, stage, slots, venue, \
     field, time_slot, result, status, finalized_at";

const STANDING_COLUMNS: &str = "tournament_id, participant_id, rank, score, played, wins, \
     draws, losses, goals_for, goals_against, best_attempt, attempts, buchholz, stage_progress";

const LEDGER_COLUMNS: &str = "id, tournament_id, participant_id, reward_type, detail, amount, \
     rank, idempotency_key, created_at";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn start_in_tx(
        &self,
        id: TournamentId,
        expected: TournamentStatus,
        roster: &[ParticipantId],
        sessions: &[NewSession],
    ) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE tournaments SET status = $3, roster = $4, started_at = NOW()
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(expected.to_string())
        .bind(TournamentStatus::InProgress.to_string())
        .bind(roster)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Ok(false);
        }

        for session in sessions {
            insert_session(&mut tx, id, session).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn finalize_in_tx(
        &self,
        id: SessionId,
        result: &MatchResult,
    ) -> StorageResult<FinalizeOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(owner) = sqlx::query("SELECT tournament_id FROM tournament_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(FinalizeOutcome::NotFound);
        };
        let tournament_id: TournamentId = owner.try_get("tournament_id")?;

        // Serializes finalization against status changes of the same tournament
        let Some(tournament) = sqlx::query("SELECT status FROM tournaments WHERE id = $1 FOR UPDATE")
            .bind(tournament_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(FinalizeOutcome::NotFound);
        };
        let status: TournamentStatus = parse_column(&tournament, "status")?;
        if status != TournamentStatus::InProgress {
            return Ok(FinalizeOutcome::TournamentNotInProgress(status));
        }

        let update = format!(
            "UPDATE tournament_sessions SET result = $2, status = 'finalized', finalized_at = NOW()
             WHERE id = $1 AND status = 'scheduled'
             RETURNING {SESSION_COLUMNS}"
        );
        let finalized = sqlx::query(&update)
            .bind(id)
            .bind(Json(result))
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = finalized else {
            let select = format!("SELECT {SESSION_COLUMNS} FROM tournament_sessions WHERE id = $1");
            let existing = sqlx::query(&select).bind(id).fetch_one(&mut *tx).await?;
            return Ok(FinalizeOutcome::AlreadyFinalized(session_from_row(&existing)?));
        };
        let session = session_from_row(&row)?;

        let version = sqlx::query(
            "UPDATE tournaments SET results_version = results_version + 1
             WHERE id = $1 RETURNING results_version",
        )
        .bind(tournament_id)
        .fetch_one(&mut *tx)
        .await?;
        let results_version: i64 = version.try_get("results_version")?;

        tx.commit().await?;
        Ok(FinalizeOutcome::Finalized {
            session,
            results_version,
        })
    }

    async fn update_slots_in_tx(&self, updates: &[SlotUpdate]) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        for update in updates {
            let Some(row) = sqlx::query(
                "SELECT slots FROM tournament_sessions
                 WHERE id = $1 AND status = 'scheduled' FOR UPDATE",
            )
            .bind(update.session_id)
            .fetch_optional(&mut *tx)
            .await?
            else {
                continue;
            };
            let stored: Vec<Slot> = row.try_get::<Json<_>, _>("slots")?.0;

            sqlx::query("UPDATE tournament_sessions SET slots = $2 WHERE id = $1")
                .bind(update.session_id)
                .bind(Json(update.merged_with(&stored)))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn append_in_tx(
        &self,
        id: TournamentId,
        sessions: &[NewSession],
    ) -> StorageResult<AppendOutcome> {
        let mut tx = self.pool.begin().await?;

        // Same lock finalize takes: a round never lands after completion
        let Some(tournament) = sqlx::query("SELECT status FROM tournaments WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(AppendOutcome::NotFound);
        };
        let status: TournamentStatus = parse_column(&tournament, "status")?;
        if status != TournamentStatus::InProgress {
            return Ok(AppendOutcome::TournamentNotInProgress(status));
        }

        let mut stored = Vec::with_capacity(sessions.len());
        for session in sessions {
            match insert_session(&mut tx, id, session).await {
                Ok(session) => stored.push(session),
                Err(StorageError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => {
                    return Ok(AppendOutcome::RoundTaken);
                }
                Err(e) => return Err(e),
            }
        }

        sqlx::query("UPDATE tournaments SET results_version = results_version + 1 WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(AppendOutcome::Appended(stored))
    }

    async fn replace_standings_in_tx(
        &self,
        tournament_id: TournamentId,
        results_version: i64,
        entries: &[StandingEntry],
    ) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE tournaments SET standings_version = $2
             WHERE id = $1 AND standings_version < $2",
        )
        .bind(tournament_id)
        .bind(results_version)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM tournament_standings WHERE tournament_id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        let insert = format!(
            "INSERT INTO tournament_standings ({STANDING_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        );
        for entry in entries {
            sqlx::query(&insert)
                .bind(tournament_id)
                .bind(entry.participant_id)
                .bind(to_i32(entry.rank, "rank")?)
                .bind(entry.score)
                .bind(to_i32(entry.played, "played")?)
                .bind(to_i32(entry.wins, "wins")?)
                .bind(to_i32(entry.draws, "draws")?)
                .bind(to_i32(entry.losses, "losses")?)
                .bind(to_i32(entry.goals_for, "goals_for")?)
                .bind(to_i32(entry.goals_against, "goals_against")?)
                .bind(entry.best_attempt)
                .bind(to_i32(entry.attempts, "attempts")?)
                .bind(entry.buchholz)
                .bind(entry.stage_progress)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}

async fn insert_session(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
    session: &NewSession,
) -> StorageResult<Session> {
    let insert = format!(
        "INSERT INTO tournament_sessions
             (tournament_id, match_number, round, stage, slots, venue, field, time_slot,
              result, status, finalized_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                 CASE WHEN $10 = 'finalized' THEN NOW() END)
         RETURNING {SESSION_COLUMNS}"
    );
    let row = sqlx::query(&insert)
        .bind(tournament_id)
        .bind(to_i32(session.match_number, "match_number")?)
        .bind(to_i32(session.round, "round")?)
        .bind(Json(session.stage))
        .bind(Json(&session.slots))
        .bind(&session.venue)
        .bind(to_i32(session.field, "field")?)
        .bind(to_i32(session.time_slot, "time_slot")?)
        .bind(session.result.map(Json))
        .bind(session.initial_status().to_string())
        .fetch_one(&mut *conn)
        .await?;
    session_from_row(&row)
}

#[async_trait]
impl TournamentRepository for PgStore {
    async fn create_tournament(&self, tournament: &NewTournament) -> StorageResult<Tournament> {
        let insert = format!(
            "INSERT INTO tournaments
                 (name, format, status, scoring_mode, number_of_rounds,
                  format_config, ranking_rules, reward_config, location)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {TOURNAMENT_COLUMNS}"
        );
        let row = with_default_timeout(
            sqlx::query(&insert)
                .bind(&tournament.name)
                .bind(tournament.format.to_string())
                .bind(TournamentStatus::Draft.to_string())
                .bind(tournament.scoring_mode.to_string())
                .bind(to_i32(tournament.number_of_rounds, "number_of_rounds")?)
                .bind(Json(&tournament.format_config))
                .bind(Json(&tournament.ranking_rules))
                .bind(Json(&tournament.reward_config))
                .bind(Json(&tournament.location))
                .fetch_one(self.pool.as_ref()),
        )
        .await?;
        tournament_from_row(&row)
    }

    async fn find_tournament(&self, id: TournamentId) -> StorageResult<Option<Tournament>> {
        let select = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1");
        let row = with_default_timeout(
            sqlx::query(&select).bind(id).fetch_optional(self.pool.as_ref()),
        )
        .await?;
        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn compare_and_set_status(
        &self,
        id: TournamentId,
        expected: TournamentStatus,
        next: TournamentStatus,
    ) -> StorageResult<bool> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE tournaments
                 SET status = $3,
                     completed_at = CASE WHEN $3 = 'completed' THEN NOW() ELSE completed_at END
                 WHERE id = $1 AND status = $2",
            )
            .bind(id)
            .bind(expected.to_string())
            .bind(next.to_string())
            .execute(self.pool.as_ref()),
        )
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn start_tournament(
        &self,
        id: TournamentId,
        expected: TournamentStatus,
        roster: &[ParticipantId],
        sessions: &[NewSession],
    ) -> StorageResult<bool> {
        with_transaction_timeout(self.start_in_tx(id, expected, roster, sessions)).await
    }

    async fn list_sessions(&self, id: TournamentId) -> StorageResult<Vec<Session>> {
        let select = format!(
            "SELECT {SESSION_COLUMNS} FROM tournament_sessions
             WHERE tournament_id = $1 ORDER BY match_number"
        );
        let rows = with_default_timeout(
            sqlx::query(&select).bind(id).fetch_all(self.pool.as_ref()),
        )
        .await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn find_session(&self, id: SessionId) -> StorageResult<Option<Session>> {
        let select = format!("SELECT {SESSION_COLUMNS} FROM tournament_sessions WHERE id = $1");
        let row = with_default_timeout(
            sqlx::query(&select).bind(id).fetch_optional(self.pool.as_ref()),
        )
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn finalize_session(
        &self,
        id: SessionId,
        result: &MatchResult,
    ) -> StorageResult<FinalizeOutcome> {
        with_transaction_timeout(self.finalize_in_tx(id, result)).await
    }

    async fn update_slots(&self, updates: &[SlotUpdate]) -> StorageResult<()> {
        if updates.is_empty() {
            return Ok(());
        }
        with_transaction_timeout(self.update_slots_in_tx(updates)).await
    }

    async fn append_sessions(
        &self,
        id: TournamentId,
        sessions: &[NewSession],
    ) -> StorageResult<AppendOutcome> {
        with_transaction_timeout(self.append_in_tx(id, sessions)).await
    }
}

#[async_trait]
impl StandingRepository for PgStore {
    async fn replace_standings(
        &self,
        tournament_id: TournamentId,
        results_version: i64,
        entries: &[StandingEntry],
    ) -> StorageResult<bool> {
        with_transaction_timeout(self.replace_standings_in_tx(tournament_id, results_version, entries))
            .await
    }

    async fn list_standings(&self, tournament_id: TournamentId) -> StorageResult<Vec<StandingEntry>> {
        let select = format!(
            "SELECT {STANDING_COLUMNS} FROM tournament_standings
             WHERE tournament_id = $1 ORDER BY rank, participant_id"
        );
        let rows = with_default_timeout(
            sqlx::query(&select)
                .bind(tournament_id)
                .fetch_all(self.pool.as_ref()),
        )
        .await?;
        rows.iter().map(standing_from_row).collect()
    }
}

#[async_trait]
impl RewardLedgerRepository for PgStore {
    async fn insert_entry(&self, entry: &NewLedgerEntry) -> StorageResult<LedgerInsert> {
        let insert = format!(
            "INSERT INTO reward_ledger
                 (tournament_id, participant_id, reward_type, detail, amount, rank, idempotency_key)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {LEDGER_COLUMNS}"
        );
        let inserted = with_default_timeout(
            sqlx::query(&insert)
                .bind(entry.tournament_id)
                .bind(entry.participant_id)
                .bind(entry.reward_type.to_string())
                .bind(entry.detail.as_deref())
                .bind(entry.amount)
                .bind(to_i32(entry.rank, "rank")?)
                .bind(&entry.idempotency_key)
                .fetch_one(self.pool.as_ref()),
        )
        .await;

        // The unique key is the duplicate guard; a violation is an expected signal
        match inserted {
            Ok(row) => Ok(LedgerInsert::Created(ledger_from_row(&row)?)),
            Err(StorageError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => {
                Ok(LedgerInsert::Duplicate)
            }
            Err(e) => Err(e),
        }
    }

    async fn find_by_key(&self, idempotency_key: &str) -> StorageResult<Option<RewardLedgerEntry>> {
        let select = format!("SELECT {LEDGER_COLUMNS} FROM reward_ledger WHERE idempotency_key = $1");
        let row = with_default_timeout(
            sqlx::query(&select)
                .bind(idempotency_key)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?;
        row.as_ref().map(ledger_from_row).transpose()
    }

    async fn list_entries(&self, tournament_id: TournamentId) -> StorageResult<Vec<RewardLedgerEntry>> {
        let select = format!(
            "SELECT {LEDGER_COLUMNS} FROM reward_ledger
             WHERE tournament_id = $1 ORDER BY idempotency_key"
        );
        let rows = with_default_timeout(
            sqlx::query(&select)
                .bind(tournament_id)
                .fetch_all(self.pool.as_ref()),
        )
        .await?;
        rows.iter().map(ledger_from_row).collect()
    }
}

fn tournament_from_row(row: &PgRow) -> StorageResult<Tournament> {
    Ok(Tournament {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        format: parse_column(row, "format")?,
        status: parse_column(row, "status")?,
        scoring_mode: parse_column(row, "scoring_mode")?,
        number_of_rounds: to_u32(row.try_get("number_of_rounds")?, "number_of_rounds")?,
        format_config: row.try_get::<Json<_>, _>("format_config")?.0,
        ranking_rules: row.try_get::<Json<_>, _>("ranking_rules")?.0,
        reward_config: row.try_get::<Json<_>, _>("reward_config")?.0,
        location: row.try_get::<Json<_>, _>("location")?.0,
        roster: row.try_get("roster")?,
        results_version: row.try_get("results_version")?,
        standings_version: row.try_get("standings_version")?,
        created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
        started_at: row
            .try_get::<Option<NaiveDateTime>, _>("started_at")?
            .map(|dt| dt.and_utc()),
        completed_at: row
            .try_get::<Option<NaiveDateTime>, _>("completed_at")?
            .map(|dt| dt.and_utc()),
    })
}

fn session_from_row(row: &PgRow) -> StorageResult<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        tournament_id: row.try_get("tournament_id")?,
        match_number: to_u32(row.try_get("match_number")?, "match_number")?,
        round: to_u32(row.try_get("round")?, "round")?,
        stage: row.try_get::<Json<_>, _>("stage")?.0,
        slots: row.try_get::<Json<_>, _>("slots")?.0,
        venue: row.try_get("venue")?,
        field: to_u32(row.try_get("field")?, "field")?,
        time_slot: to_u32(row.try_get("time_slot")?, "time_slot")?,
        result: row
            .try_get::<Option<Json<MatchResult>>, _>("result")?
            .map(|json| json.0),
        status: parse_column(row, "status")?,
        finalized_at: row
            .try_get::<Option<NaiveDateTime>, _>("finalized_at")?
            .map(|dt| dt.and_utc()),
    })
}

fn standing_from_row(row: &PgRow) -> StorageResult<StandingEntry> {
    Ok(StandingEntry {
        tournament_id: row.try_get("tournament_id")?,
        participant_id: row.try_get("participant_id")?,
        rank: to_u32(row.try_get("rank")?, "rank")?,
        score: row.try_get("score")?,
        played: to_u32(row.try_get("played")?, "played")?,
        wins: to_u32(row.try_get("wins")?, "wins")?,
        draws: to_u32(row.try_get("draws")?, "draws")?,
        losses: to_u32(row.try_get("losses")?, "losses")?,
        goals_for: to_u32(row.try_get("goals_for")?, "goals_for")?,
        goals_against: to_u32(row.try_get("goals_against")?, "goals_against")?,
        best_attempt: row.try_get("best_attempt")?,
        attempts: to_u32(row.try_get("attempts")?, "attempts")?,
        buchholz: row.try_get("buchholz")?,
        stage_progress: row.try_get("stage_progress")?,
    })
}

fn ledger_from_row(row: &PgRow) -> StorageResult<RewardLedgerEntry> {
    Ok(RewardLedgerEntry {
        id: row.try_get("id")?,
        tournament_id: row.try_get("tournament_id")?,
        participant_id: row.try_get("participant_id")?,
        reward_type: parse_column(row, "reward_type")?,
        detail: row.try_get("detail")?,
        amount: row.try_get("amount")?,
        rank: to_u32(row.try_get("rank")?, "rank")?,
        idempotency_key: row.try_get("idempotency_key")?,
        created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
    })
}

/// Parse a text column into one of the snake_case domain enums
fn parse_column<T>(row: &PgRow, column: &str) -> StorageResult<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e| StorageError::Corrupt(format!("{column}: {e}")))
}

fn to_u32(value: i32, column: &str) -> StorageResult<u32> {
    u32::try_from(value)
        .map_err(|_| StorageError::Corrupt(format!("{column}: negative value {value}")))
}

fn to_i32(value: u32, column: &str) -> StorageResult<i32> {
    i32::try_from(value)
        .map_err(|_| StorageError::Corrupt(format!("{column}: {value} out of range")))
}
