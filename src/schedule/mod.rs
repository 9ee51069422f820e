//! Session generation, one strategy per tournament format.
//!
//! Generators are stateless and synchronous: they take a frozen roster and the
//! tournament's configuration and return the full list of sessions to store.
//! [`FormatGenerator`] dispatches to the right strategy by format tag.

pub mod bracket;
pub mod group_knockout;
pub mod individual;
pub mod knockout;
pub mod league;
pub mod swiss;

use enum_dispatch::enum_dispatch;
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use thiserror::Error;

pub use bracket::{BracketPlan, SlotUpdate, resolve_slots};
pub use group_knockout::GroupKnockoutGenerator;
pub use individual::IndividualRankingGenerator;
pub use knockout::KnockoutGenerator;
pub use league::LeagueGenerator;
pub use swiss::{PairingHistory, SwissGenerator};

use crate::tournament::{
    FormatConfig, NewSession, ParticipantId, ScoringMode, Seeding, Tournament, TournamentFormat,
};

/// Reasons a schedule cannot be generated
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("{format} needs at least {minimum} participants, roster has {actual}")]
    InsufficientRoster {
        format: TournamentFormat,
        minimum: usize,
        actual: usize,
    },

    #[error("participant {0} appears more than once in the roster")]
    DuplicateParticipant(ParticipantId),

    #[error("{format} does not support scoring mode {mode}")]
    ScoringModeMismatch {
        format: TournamentFormat,
        mode: ScoringMode,
    },

    #[error("invalid number of rounds {rounds}: {reason}")]
    InvalidRoundCount { rounds: u32, reason: String },

    #[error("group distribution {distribution:?} does not fit a roster of {roster}: {reason}")]
    InvalidGroupDistribution {
        distribution: Vec<usize>,
        roster: usize,
        reason: String,
    },

    #[error("invalid qualifiers per group ({qualifiers}): {reason}")]
    InvalidQualifiers { qualifiers: usize, reason: String },

    #[error("parallel fields must be at least 1")]
    InvalidFieldCount,

    #[error("no rematch-free pairing exists for swiss round {round}")]
    SwissPairingExhausted { round: u32 },

    #[error("all {max} rounds have already been generated")]
    RoundLimitReached { max: u32 },
}

/// Result type for generation
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Tournament settings a generator reads
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub scoring_mode: ScoringMode,
    pub number_of_rounds: u32,
    pub config: &'a FormatConfig,
    /// Resolved venue stamped on every session
    pub venue: &'a str,
    /// Fields used when the config leaves `parallel_fields` at 0
    pub default_parallel_fields: u32,
}

impl<'a> GenerationContext<'a> {
    pub fn new(tournament: &'a Tournament, venue: &'a str) -> Self {
        Self {
            scoring_mode: tournament.scoring_mode,
            number_of_rounds: tournament.number_of_rounds,
            config: &tournament.format_config,
            venue,
            default_parallel_fields: 1,
        }
    }

    pub fn with_default_parallel_fields(mut self, fields: u32) -> Self {
        self.default_parallel_fields = fields;
        self
    }

    /// Parallel fields in effect
    pub fn parallel_fields(&self) -> u32 {
        if self.config.parallel_fields == 0 {
            self.default_parallel_fields
        } else {
            self.config.parallel_fields
        }
    }
}

/// A schedule generation strategy
#[enum_dispatch]
pub trait SessionGenerator {
    /// Format this generator implements
    fn format(&self) -> TournamentFormat;

    /// Smallest roster the format can run with
    fn minimum_roster(&self) -> usize;

    /// Check the roster and configuration without generating anything
    fn validate(&self, roster: &[ParticipantId], ctx: &GenerationContext<'_>) -> GenerationResult<()>;

    /// Generate every session known at start time
    fn generate(
        &self,
        roster: &[ParticipantId],
        ctx: &GenerationContext<'_>,
    ) -> GenerationResult<Vec<NewSession>>;
}

/// Generator selected by format tag
#[enum_dispatch(SessionGenerator)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatGenerator {
    League(LeagueGenerator),
    Knockout(KnockoutGenerator),
    Swiss(SwissGenerator),
    GroupKnockout(GroupKnockoutGenerator),
    IndividualRanking(IndividualRankingGenerator),
}

impl From<TournamentFormat> for FormatGenerator {
    fn from(format: TournamentFormat) -> Self {
        match format {
            TournamentFormat::League => LeagueGenerator.into(),
            TournamentFormat::Knockout => KnockoutGenerator.into(),
            TournamentFormat::Swiss => SwissGenerator.into(),
            TournamentFormat::GroupKnockout => GroupKnockoutGenerator.into(),
            TournamentFormat::IndividualRanking => IndividualRankingGenerator.into(),
        }
    }
}

/// Checks shared by every format: scoring mode, roster size, uniqueness and fields
pub(crate) fn check_common<G: SessionGenerator>(
    generator: &G,
    roster: &[ParticipantId],
    ctx: &GenerationContext<'_>,
) -> GenerationResult<()> {
    let format = generator.format();
    if ctx.scoring_mode != format.scoring_mode() {
        return Err(GenerationError::ScoringModeMismatch {
            format,
            mode: ctx.scoring_mode,
        });
    }

    if ctx.parallel_fields() == 0 {
        return Err(GenerationError::InvalidFieldCount);
    }

    let minimum = generator.minimum_roster();
    if roster.len() < minimum {
        return Err(GenerationError::InsufficientRoster {
            format,
            minimum,
            actual: roster.len(),
        });
    }

    let mut seen = HashSet::with_capacity(roster.len());
    for &participant in roster {
        if !seen.insert(participant) {
            return Err(GenerationError::DuplicateParticipant(participant));
        }
    }

    Ok(())
}

/// Apply the configured seeding to the roster
pub fn seeded_order(roster: &[ParticipantId], seeding: &Seeding) -> Vec<ParticipantId> {
    let mut order = roster.to_vec();
    match seeding {
        Seeding::Roster => {}
        Seeding::Random { seed } => {
            let seed = seed.unwrap_or_else(rand::random);
            info!("Random seeding with seed {seed}");
            order.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        Seeding::Rating { ratings } => {
            // Stable sort: unrated and equally rated keep roster order
            order.sort_by(|a, b| match (ratings.get(a), ratings.get(b)) {
                (Some(x), Some(y)) => y.total_cmp(x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }
    }
    order
}

/// Assign field and time slot to sessions, packing each round across fields
pub(crate) fn pack_fields(sessions: &mut [NewSession], fields: u32) {
    let fields = fields.max(1);
    let mut current_round = None;
    let mut index = 0u32;
    for session in sessions.iter_mut() {
        if current_round != Some(session.round) {
            current_round = Some(session.round);
            index = 0;
        }
        session.field = index % fields + 1;
        session.time_slot = index / fields + 1;
        index += 1;
    }
}
