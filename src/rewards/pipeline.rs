//! Idempotent reward distribution.
//!
//! Every reward row has a deterministic idempotency key and the ledger's
//! unique constraint on that key is the only duplicate guard: a run inserts
//! each row and, when the key is taken, reads the existing row back. Running
//! the pipeline any number of times, concurrently or after a crash, converges
//! on the same row set.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::errors::{RewardError, RewardResult};
use super::models::{
    DistributionReport, Entitlement, LedgerInsert, NewLedgerEntry, ParticipantFailure,
    RewardConfig, RewardGrant, RewardLedgerEntry,
};
use crate::db::{RewardLedgerRepository, StorageResult};
use crate::ranking::StandingEntry;
use crate::tournament::{ParticipantId, Tournament, TournamentId, TournamentStatus};

/// Maps participants to the skills they can earn points in
#[async_trait]
pub trait SkillDirectory: Send + Sync {
    async fn has_skill(&self, participant_id: ParticipantId, skill: &str) -> StorageResult<bool>;
}

/// Fixed in-process skill mapping
#[derive(Debug, Clone, Default)]
pub struct StaticSkillDirectory {
    skills: HashMap<ParticipantId, HashSet<String>>,
}

impl StaticSkillDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skill(mut self, participant_id: ParticipantId, skill: impl Into<String>) -> Self {
        self.skills.entry(participant_id).or_default().insert(skill.into());
        self
    }
}

#[async_trait]
impl SkillDirectory for StaticSkillDirectory {
    async fn has_skill(&self, participant_id: ParticipantId, skill: &str) -> StorageResult<bool> {
        Ok(self
            .skills
            .get(&participant_id)
            .is_some_and(|skills| skills.contains(skill)))
    }
}

/// Result of a create-or-get write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    Created(RewardLedgerEntry),
    Existing(RewardLedgerEntry),
}

/// Reward distribution pipeline
#[derive(Clone)]
pub struct RewardPipeline {
    ledger: Arc<dyn RewardLedgerRepository>,
    skills: Arc<dyn SkillDirectory>,
}

impl RewardPipeline {
    /// Create a new reward pipeline
    pub fn new(ledger: Arc<dyn RewardLedgerRepository>, skills: Arc<dyn SkillDirectory>) -> Self {
        Self { ledger, skills }
    }

    /// What each ranked participant is owed; participants without grants are omitted
    pub fn entitlements(config: &RewardConfig, standings: &[StandingEntry]) -> Vec<Entitlement> {
        standings
            .iter()
            .filter_map(|entry| {
                let grants = config.grants_for_rank(entry.rank);
                (!grants.is_empty()).then(|| Entitlement {
                    participant_id: entry.participant_id,
                    rank: entry.rank,
                    grants: grants.to_vec(),
                })
            })
            .collect()
    }

    /// Distribute rewards for a completed tournament
    ///
    /// A participant whose rewards cannot be computed is reported in
    /// `failures` with none of their rows written; the rest are unaffected.
    /// Storage failures abort the run, which is safe to retry.
    ///
    /// # Errors
    ///
    /// - `RewardsSuppressed` for a cancelled tournament
    /// - `NotCompleted` for any other status but completed
    pub async fn distribute(
        &self,
        tournament: &Tournament,
        standings: &[StandingEntry],
    ) -> RewardResult<DistributionReport> {
        match tournament.status {
            TournamentStatus::Completed => {}
            TournamentStatus::Cancelled => {
                return Err(RewardError::RewardsSuppressed(tournament.id));
            }
            status => {
                return Err(RewardError::NotCompleted {
                    id: tournament.id,
                    status,
                });
            }
        }

        let mut report = DistributionReport::new(tournament.id);
        for entitlement in Self::entitlements(&tournament.reward_config, standings) {
            let rows = match self.prepare(tournament.id, &entitlement).await {
                Ok(rows) => rows,
                Err(RewardError::Storage(e)) => return Err(e.into()),
                Err(e) => {
                    warn!(
                        "Skipping rewards for participant {} in tournament {}: {}",
                        entitlement.participant_id, tournament.id, e
                    );
                    report.failures.push(ParticipantFailure {
                        participant_id: entitlement.participant_id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            for row in &rows {
                match self.create_or_get(row).await? {
                    LedgerWrite::Created(entry) => report.created.push(entry),
                    LedgerWrite::Existing(entry) => report.existing.push(entry),
                }
            }
        }

        info!(
            "Tournament {} rewards: {} created, {} existing, {} failed",
            tournament.id,
            report.created.len(),
            report.existing.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Build every row for one participant, or fail without writing any
    async fn prepare(
        &self,
        tournament_id: TournamentId,
        entitlement: &Entitlement,
    ) -> RewardResult<Vec<NewLedgerEntry>> {
        for grant in &entitlement.grants {
            if let RewardGrant::SkillPoints { skill, .. } = grant {
                if !self.skills.has_skill(entitlement.participant_id, skill).await? {
                    return Err(RewardError::MissingSkillMapping {
                        participant_id: entitlement.participant_id,
                        skill: skill.clone(),
                    });
                }
            }
        }

        Ok(entitlement
            .grants
            .iter()
            .map(|grant| {
                NewLedgerEntry::from_grant(
                    tournament_id,
                    entitlement.participant_id,
                    entitlement.rank,
                    grant,
                )
            })
            .collect())
    }

    /// Insert a row, or return the row already holding its key
    pub async fn create_or_get(&self, entry: &NewLedgerEntry) -> RewardResult<LedgerWrite> {
        match self.ledger.insert_entry(entry).await? {
            LedgerInsert::Created(created) => Ok(LedgerWrite::Created(created)),
            LedgerInsert::Duplicate => {
                debug!("Reward {} already recorded", entry.idempotency_key);
                self.ledger
                    .find_by_key(&entry.idempotency_key)
                    .await?
                    .map(LedgerWrite::Existing)
                    .ok_or_else(|| RewardError::LedgerInconsistent(entry.idempotency_key.clone()))
            }
        }
    }
}
