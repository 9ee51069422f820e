//! Reward error types.

use thiserror::Error;

use crate::db::StorageError;
use crate::tournament::{ParticipantId, TournamentId, TournamentStatus};

/// Reward errors
#[derive(Debug, Error)]
pub enum RewardError {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// No band covers a rank below the last configured band
    #[error("Reward config has no placement band for rank {0}")]
    MissingPlacementBand(u32),

    /// Two bands claim the same rank
    #[error("Reward bands overlap at rank {0}")]
    OverlappingBands(u32),

    /// Band range is empty or starts at rank 0
    #[error("Invalid placement band {from}..={to}")]
    InvalidBand { from: u32, to: u32 },

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// The same reward appears twice in one band
    #[error("Duplicate reward grant {0} in one band")]
    DuplicateGrant(String),

    /// Skill points without a skill code
    #[error("Skill points grant has an empty skill code")]
    EmptySkill,

    /// Participant has no mapping for the rewarded skill
    #[error("Skill {skill} is not mapped for participant {participant_id}")]
    MissingSkillMapping {
        participant_id: ParticipantId,
        skill: String,
    },

    /// Distribution requested before completion
    #[error("Tournament {id} is {status}, rewards are only distributed once completed")]
    NotCompleted {
        id: TournamentId,
        status: TournamentStatus,
    },

    /// Cancelled tournaments never pay out
    #[error("Rewards suppressed for cancelled tournament {0}")]
    RewardsSuppressed(TournamentId),

    /// A duplicate insert found no existing row
    #[error("Ledger entry {0} reported as duplicate but not found")]
    LedgerInconsistent(String),
}

impl RewardError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            RewardError::Storage(e) => e.client_message(),
            RewardError::LedgerInconsistent(_) => "Internal server error".to_string(),
            RewardError::MissingSkillMapping { skill, .. } => {
                format!("Skill {skill} is not mapped")
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for reward operations
pub type RewardResult<T> = Result<T, RewardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_redacts_participant() {
        let err = RewardError::MissingSkillMapping {
            participant_id: 99,
            skill: "passing".into(),
        };
        assert_eq!(err.client_message(), "Skill passing is not mapped");
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_not_completed_message() {
        let err = RewardError::NotCompleted {
            id: 3,
            status: TournamentStatus::InProgress,
        };
        assert!(err.to_string().contains("in_progress"));
    }
}
