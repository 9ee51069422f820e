//! Collaborators owned by other parts of the academy platform.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::models::{ParticipantId, TournamentId};
use crate::db::StorageResult;

/// Source of the enrolled participants, frozen when a tournament starts
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Enrolled participants in enrollment order
    async fn enrolled_participants(&self, tournament_id: TournamentId) -> StorageResult<Vec<ParticipantId>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructorRole {
    Lead,
    Assistant,
}

/// An instructor's assignment to a tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorAssignment {
    pub instructor_id: i64,
    pub role: InstructorRole,
    pub accepted: bool,
    pub location_id: Option<i64>,
}

impl InstructorAssignment {
    pub fn lead(instructor_id: i64) -> Self {
        Self {
            instructor_id,
            role: InstructorRole::Lead,
            accepted: true,
            location_id: None,
        }
    }

    pub fn assistant(instructor_id: i64, location_id: Option<i64>) -> Self {
        Self {
            instructor_id,
            role: InstructorRole::Assistant,
            accepted: true,
            location_id,
        }
    }

    /// Mark as offered but not yet accepted
    pub fn pending(mut self) -> Self {
        self.accepted = false;
        self
    }
}

/// Directory of instructor assignments consulted by lifecycle guards
#[async_trait]
pub trait AssignmentDirectory: Send + Sync {
    async fn assignments(&self, tournament_id: TournamentId) -> StorageResult<Vec<InstructorAssignment>>;
}
