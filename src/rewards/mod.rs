//! Reward distribution: placement bands, the append-only ledger and the
//! idempotent pipeline that writes it.

pub mod errors;
pub mod models;
pub mod pipeline;

pub use errors::{RewardError, RewardResult};
pub use models::{
    DistributionReport, Entitlement, LedgerInsert, NewLedgerEntry, ParticipantFailure,
    PlacementBand, RewardConfig, RewardGrant, RewardLedgerEntry, RewardType, idempotency_key,
};
pub use pipeline::{LedgerWrite, RewardPipeline, SkillDirectory, StaticSkillDirectory};
