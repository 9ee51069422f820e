//! Reward configuration and ledger models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::errors::{RewardError, RewardResult};
use crate::tournament::{ParticipantId, TournamentId};

/// Kind of reward credited to a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Currency,
    Experience,
    SkillPoints,
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardType::Currency => write!(f, "currency"),
            RewardType::Experience => write!(f, "experience"),
            RewardType::SkillPoints => write!(f, "skill_points"),
        }
    }
}

impl FromStr for RewardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "currency" => Ok(RewardType::Currency),
            "experience" => Ok(RewardType::Experience),
            "skill_points" => Ok(RewardType::SkillPoints),
            other => Err(format!("unknown reward type '{other}'")),
        }
    }
}

/// One reward granted to every participant in a placement band
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardGrant {
    Currency { amount: i64 },
    Experience { amount: i64 },
    SkillPoints { skill: String, points: i64 },
}

impl RewardGrant {
    pub fn reward_type(&self) -> RewardType {
        match self {
            RewardGrant::Currency { .. } => RewardType::Currency,
            RewardGrant::Experience { .. } => RewardType::Experience,
            RewardGrant::SkillPoints { .. } => RewardType::SkillPoints,
        }
    }

    /// Skill code for skill points
    pub fn detail(&self) -> Option<&str> {
        match self {
            RewardGrant::SkillPoints { skill, .. } => Some(skill.as_str()),
            _ => None,
        }
    }

    pub fn amount(&self) -> i64 {
        match self {
            RewardGrant::Currency { amount } | RewardGrant::Experience { amount } => *amount,
            RewardGrant::SkillPoints { points, .. } => *points,
        }
    }

    fn validate(&self) -> RewardResult<()> {
        if self.amount() <= 0 {
            return Err(RewardError::InvalidAmount(self.amount()));
        }
        if let RewardGrant::SkillPoints { skill, .. } = self {
            if skill.trim().is_empty() {
                return Err(RewardError::EmptySkill);
            }
        }
        Ok(())
    }
}

/// Grants for an inclusive range of final ranks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementBand {
    pub from_rank: u32,
    pub to_rank: u32,
    pub grants: Vec<RewardGrant>,
}

impl PlacementBand {
    pub fn new(from_rank: u32, to_rank: u32, grants: Vec<RewardGrant>) -> Self {
        Self {
            from_rank,
            to_rank,
            grants,
        }
    }

    /// Band covering a single rank
    pub fn rank(rank: u32, grants: Vec<RewardGrant>) -> Self {
        Self::new(rank, rank, grants)
    }

    pub fn contains(&self, rank: u32) -> bool {
        (self.from_rank..=self.to_rank).contains(&rank)
    }
}

/// Entitlements per placement band
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Contiguous bands starting at rank 1
    pub bands: Vec<PlacementBand>,
    /// Granted to ranks beyond the last band
    pub participation: Vec<RewardGrant>,
}

impl RewardConfig {
    pub fn new(bands: Vec<PlacementBand>) -> Self {
        Self {
            bands,
            participation: Vec::new(),
        }
    }

    pub fn with_participation(mut self, grants: Vec<RewardGrant>) -> Self {
        self.participation = grants;
        self
    }

    /// Check that bands start at rank 1 and cover ranks without gaps or overlaps
    pub fn validate(&self) -> RewardResult<()> {
        let mut expected = 1;
        for band in &self.bands {
            if band.from_rank == 0 || band.to_rank < band.from_rank {
                return Err(RewardError::InvalidBand {
                    from: band.from_rank,
                    to: band.to_rank,
                });
            }
            if band.from_rank < expected {
                return Err(RewardError::OverlappingBands(band.from_rank));
            }
            if band.from_rank > expected {
                return Err(RewardError::MissingPlacementBand(expected));
            }
            validate_grants(&band.grants)?;
            expected = band.to_rank + 1;
        }
        validate_grants(&self.participation)
    }

    /// Grants for a final rank
    pub fn grants_for_rank(&self, rank: u32) -> &[RewardGrant] {
        self.bands
            .iter()
            .find(|band| band.contains(rank))
            .map(|band| band.grants.as_slice())
            .unwrap_or(&self.participation)
    }
}

fn validate_grants(grants: &[RewardGrant]) -> RewardResult<()> {
    let mut keys = HashSet::with_capacity(grants.len());
    for grant in grants {
        grant.validate()?;
        if !keys.insert((grant.reward_type(), grant.detail())) {
            let label = match grant.detail() {
                Some(detail) => format!("{}:{detail}", grant.reward_type()),
                None => grant.reward_type().to_string(),
            };
            return Err(RewardError::DuplicateGrant(label));
        }
    }
    Ok(())
}

/// Deterministic key identifying one reward row across the system
pub fn idempotency_key(
    tournament_id: TournamentId,
    participant_id: ParticipantId,
    reward_type: RewardType,
    detail: Option<&str>,
) -> String {
    match detail {
        Some(detail) => {
            format!("tournament-reward:{tournament_id}:{participant_id}:{reward_type}:{detail}")
        }
        None => format!("tournament-reward:{tournament_id}:{participant_id}:{reward_type}"),
    }
}

/// Append-only reward ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardLedgerEntry {
    pub id: i64,
    pub tournament_id: TournamentId,
    pub participant_id: ParticipantId,
    pub reward_type: RewardType,
    pub detail: Option<String>,
    pub amount: i64,
    pub rank: u32,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

/// Ledger row to insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub tournament_id: TournamentId,
    pub participant_id: ParticipantId,
    pub reward_type: RewardType,
    pub detail: Option<String>,
    pub amount: i64,
    pub rank: u32,
    pub idempotency_key: String,
}

impl NewLedgerEntry {
    pub fn from_grant(
        tournament_id: TournamentId,
        participant_id: ParticipantId,
        rank: u32,
        grant: &RewardGrant,
    ) -> Self {
        let reward_type = grant.reward_type();
        let detail = grant.detail();
        Self {
            tournament_id,
            participant_id,
            reward_type,
            detail: detail.map(str::to_string),
            amount: grant.amount(),
            rank,
            idempotency_key: idempotency_key(tournament_id, participant_id, reward_type, detail),
        }
    }

    /// Materialize as a stored row
    pub fn into_entry(self, id: i64, created_at: DateTime<Utc>) -> RewardLedgerEntry {
        RewardLedgerEntry {
            id,
            tournament_id: self.tournament_id,
            participant_id: self.participant_id,
            reward_type: self.reward_type,
            detail: self.detail,
            amount: self.amount,
            rank: self.rank,
            idempotency_key: self.idempotency_key,
            created_at,
        }
    }
}

/// Outcome of a ledger insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerInsert {
    Created(RewardLedgerEntry),
    /// The key already exists; nothing was written
    Duplicate,
}

/// What one participant is owed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    pub participant_id: ParticipantId,
    pub rank: u32,
    pub grants: Vec<RewardGrant>,
}

/// A participant whose rewards could not be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantFailure {
    pub participant_id: ParticipantId,
    pub reason: String,
}

/// Result of one distribution run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionReport {
    pub tournament_id: TournamentId,
    /// Rows written by this run
    pub created: Vec<RewardLedgerEntry>,
    /// Rows found from an earlier or concurrent run
    pub existing: Vec<RewardLedgerEntry>,
    pub failures: Vec<ParticipantFailure>,
}

impl DistributionReport {
    pub fn new(tournament_id: TournamentId) -> Self {
        Self {
            tournament_id,
            created: Vec::new(),
            existing: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Every ledger row covered by this run, ordered by idempotency key
    pub fn entries(&self) -> Vec<&RewardLedgerEntry> {
        let mut all: Vec<&RewardLedgerEntry> =
            self.created.iter().chain(self.existing.iter()).collect();
        all.sort_by(|a, b| a.idempotency_key.cmp(&b.idempotency_key));
        all
    }
}
