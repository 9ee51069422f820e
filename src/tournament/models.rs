//! Tournament data models: formats, lifecycle states, sessions and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::ranking::{MeasurementType, RankingRules};
use crate::rewards::RewardConfig;
use crate::venue::VenueInfo;

/// Tournament ID type
pub type TournamentId = i64;

/// Participant (enrolled user) ID type
pub type ParticipantId = i64;

/// Session ID type
pub type SessionId = i64;

/// Match number, unique within one tournament
pub type MatchNumber = u32;

/// Zero-based group index in a group stage
pub type GroupIndex = u32;

/// Competition format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentFormat {
    /// Round-robin, everyone plays everyone
    League,
    /// Single elimination bracket
    Knockout,
    /// Score-based pairing over a fixed number of rounds
    Swiss,
    /// Group round-robin feeding a knockout bracket
    GroupKnockout,
    /// Solo attempts ranked by an aggregate measurement
    IndividualRanking,
}

impl TournamentFormat {
    /// Scoring mode this format runs under
    pub fn scoring_mode(self) -> ScoringMode {
        match self {
            TournamentFormat::IndividualRanking => ScoringMode::Individual,
            _ => ScoringMode::HeadToHead,
        }
    }

    /// Whether standings are led by bracket progress
    pub fn is_bracket(self) -> bool {
        matches!(
            self,
            TournamentFormat::Knockout | TournamentFormat::GroupKnockout
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            TournamentFormat::League => "league",
            TournamentFormat::Knockout => "knockout",
            TournamentFormat::Swiss => "swiss",
            TournamentFormat::GroupKnockout => "group_knockout",
            TournamentFormat::IndividualRanking => "individual_ranking",
        }
    }
}

impl fmt::Display for TournamentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "league" => Ok(TournamentFormat::League),
            "knockout" => Ok(TournamentFormat::Knockout),
            "swiss" => Ok(TournamentFormat::Swiss),
            "group_knockout" => Ok(TournamentFormat::GroupKnockout),
            "individual_ranking" => Ok(TournamentFormat::IndividualRanking),
            other => Err(format!("unknown tournament format '{other}'")),
        }
    }
}

/// Tournament lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    /// Created, not yet staffed
    Draft,
    /// Lead instructor confirmed
    InstructorAssigned,
    /// Assistant staffing confirmed
    ReadyForEnrollment,
    /// Participants may enroll
    EnrollmentOpen,
    /// Roster frozen, sessions generated
    InProgress,
    /// Finished; rewards distributed
    Completed,
    /// Abandoned; rewards suppressed
    Cancelled,
}

impl TournamentStatus {
    /// Completed and cancelled tournaments never change again
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TournamentStatus::Completed | TournamentStatus::Cancelled
        )
    }

    /// Whether the roster can no longer change
    pub fn roster_frozen(self) -> bool {
        matches!(
            self,
            TournamentStatus::InProgress | TournamentStatus::Completed
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            TournamentStatus::Draft => "draft",
            TournamentStatus::InstructorAssigned => "instructor_assigned",
            TournamentStatus::ReadyForEnrollment => "ready_for_enrollment",
            TournamentStatus::EnrollmentOpen => "enrollment_open",
            TournamentStatus::InProgress => "in_progress",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TournamentStatus::Draft),
            "instructor_assigned" => Ok(TournamentStatus::InstructorAssigned),
            "ready_for_enrollment" => Ok(TournamentStatus::ReadyForEnrollment),
            "enrollment_open" => Ok(TournamentStatus::EnrollmentOpen),
            "in_progress" => Ok(TournamentStatus::InProgress),
            "completed" => Ok(TournamentStatus::Completed),
            "cancelled" => Ok(TournamentStatus::Cancelled),
            other => Err(format!("unknown tournament status '{other}'")),
        }
    }
}

/// How sessions are contested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Two participants per session
    HeadToHead,
    /// One participant per session
    Individual,
}

impl ScoringMode {
    fn as_str(self) -> &'static str {
        match self {
            ScoringMode::HeadToHead => "head_to_head",
            ScoringMode::Individual => "individual",
        }
    }
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "head_to_head" => Ok(ScoringMode::HeadToHead),
            "individual" => Ok(ScoringMode::Individual),
            other => Err(format!("unknown scoring mode '{other}'")),
        }
    }
}

/// Initial ordering of the roster before generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Seeding {
    /// Enrollment order
    #[default]
    Roster,
    /// Shuffled; a fixed seed makes the draw reproducible
    Random { seed: Option<u64> },
    /// Highest rating first; unrated participants keep roster order at the end
    Rating { ratings: BTreeMap<ParticipantId, f64> },
}

/// Format-specific generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Play off the semifinal losers
    pub third_place_match: bool,
    /// Group sizes for a group stage, e.g. `[4, 3]`
    pub group_distribution: Vec<usize>,
    /// Participants per group entering the bracket
    pub qualifiers_per_group: usize,
    /// Initial seeding
    pub seeding: Seeding,
    /// Sessions that can run at once within a round; 0 uses the engine default
    pub parallel_fields: u32,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            third_place_match: false,
            group_distribution: Vec::new(),
            qualifiers_per_group: 0,
            seeding: Seeding::Roster,
            parallel_fields: 0,
        }
    }
}

/// Stage a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "stage", content = "group", rename_all = "snake_case")]
pub enum Stage {
    League,
    Group(GroupIndex),
    Knockout,
    ThirdPlace,
    Swiss,
    Individual,
}

impl Stage {
    /// Elimination stages must produce a winner
    pub fn is_elimination(self) -> bool {
        matches!(self, Stage::Knockout | Stage::ThirdPlace)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::League => f.write_str("league"),
            Stage::Group(group) => write!(f, "group_{}", group_label(*group)),
            Stage::Knockout => f.write_str("knockout"),
            Stage::ThirdPlace => f.write_str("third_place"),
            Stage::Swiss => f.write_str("swiss"),
            Stage::Individual => f.write_str("individual"),
        }
    }
}

/// Letter label for a group index (0 -> "A")
pub fn group_label(group: GroupIndex) -> String {
    let mut n = group as usize;
    let mut label = Vec::new();
    loop {
        label.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

/// Where a slot's participant comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum SlotSource {
    /// Known when the schedule is generated
    Participant { id: ParticipantId },
    /// Winner of an earlier match
    WinnerOf { match_number: MatchNumber },
    /// Loser of an earlier match
    LoserOf { match_number: MatchNumber },
    /// Final group position (1-based place)
    GroupPlacement { group: GroupIndex, place: u32 },
}

/// One participant position in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub source: SlotSource,
    pub participant: Option<ParticipantId>,
}

impl Slot {
    /// Slot for a known participant
    pub fn fixed(participant: ParticipantId) -> Self {
        Self {
            source: SlotSource::Participant { id: participant },
            participant: Some(participant),
        }
    }

    /// Slot filled from a source, resolved immediately when it is a participant
    pub fn from_source(source: SlotSource) -> Self {
        let participant = match source {
            SlotSource::Participant { id } => Some(id),
            _ => None,
        };
        Self {
            source,
            participant,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.participant.is_some()
    }
}

/// Lifecycle of a single session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Finalized,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Scheduled => f.write_str("scheduled"),
            SessionStatus::Finalized => f.write_str("finalized"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(SessionStatus::Scheduled),
            "finalized" => Ok(SessionStatus::Finalized),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

/// Recorded outcome of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchResult {
    /// Scores for slot 0 (home) and slot 1 (away)
    HeadToHead {
        home_score: u32,
        away_score: u32,
        /// Winner of a level elimination match (extra time, shoot-out)
        #[serde(default)]
        decided_by: Option<ParticipantId>,
    },
    /// Measured value of a solo attempt
    Attempt { value: f64 },
    /// Free pass in a Swiss round
    Bye,
}

impl MatchResult {
    /// Plain head-to-head score
    pub fn score(home_score: u32, away_score: u32) -> Self {
        MatchResult::HeadToHead {
            home_score,
            away_score,
            decided_by: None,
        }
    }

    /// Level head-to-head score settled in favour of `winner`
    pub fn decided(home_score: u32, away_score: u32, winner: ParticipantId) -> Self {
        MatchResult::HeadToHead {
            home_score,
            away_score,
            decided_by: Some(winner),
        }
    }

    pub fn attempt(value: f64) -> Self {
        MatchResult::Attempt { value }
    }
}

/// Winner and loser of a finalized head-to-head session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub winner: Option<ParticipantId>,
    pub loser: Option<ParticipantId>,
}

/// A session produced by a generator, before it is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub match_number: MatchNumber,
    pub round: u32,
    pub stage: Stage,
    pub slots: Vec<Slot>,
    pub venue: String,
    /// 1-based field within the round
    pub field: u32,
    /// 1-based time slot within the round
    pub time_slot: u32,
    /// Set only for sessions that are final at creation (byes)
    pub result: Option<MatchResult>,
}

impl NewSession {
    /// A scheduled session; field packing is assigned afterwards
    pub fn scheduled(
        match_number: MatchNumber,
        round: u32,
        stage: Stage,
        slots: Vec<Slot>,
        venue: &str,
    ) -> Self {
        Self {
            match_number,
            round,
            stage,
            slots,
            venue: venue.to_string(),
            field: 1,
            time_slot: 1,
            result: None,
        }
    }

    /// A Swiss bye, finalized as soon as it is stored
    pub fn bye(match_number: MatchNumber, round: u32, participant: ParticipantId, venue: &str) -> Self {
        Self {
            result: Some(MatchResult::Bye),
            ..Self::scheduled(
                match_number,
                round,
                Stage::Swiss,
                vec![Slot::fixed(participant)],
                venue,
            )
        }
    }

    /// Status the session is stored with
    pub fn initial_status(&self) -> SessionStatus {
        if self.result.is_some() {
            SessionStatus::Finalized
        } else {
            SessionStatus::Scheduled
        }
    }

    /// Participants already known
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.slots.iter().filter_map(|slot| slot.participant)
    }

    /// Materialize as a stored session
    pub fn into_session(
        self,
        id: SessionId,
        tournament_id: TournamentId,
        now: DateTime<Utc>,
    ) -> Session {
        let status = self.initial_status();
        Session {
            id,
            tournament_id,
            match_number: self.match_number,
            round: self.round,
            stage: self.stage,
            slots: self.slots,
            venue: self.venue,
            field: self.field,
            time_slot: self.time_slot,
            result: self.result,
            status,
            finalized_at: (status == SessionStatus::Finalized).then_some(now),
        }
    }
}

/// A stored session (match or attempt)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub tournament_id: TournamentId,
    pub match_number: MatchNumber,
    pub round: u32,
    pub stage: Stage,
    pub slots: Vec<Slot>,
    pub venue: String,
    pub field: u32,
    pub time_slot: u32,
    pub result: Option<MatchResult>,
    pub status: SessionStatus,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_finalized(&self) -> bool {
        self.status == SessionStatus::Finalized
    }

    /// Every slot has a participant
    pub fn is_ready(&self) -> bool {
        self.slots.iter().all(Slot::is_resolved)
    }

    /// Participants known so far, in slot order
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.slots.iter().filter_map(|slot| slot.participant)
    }

    pub fn involves(&self, participant: ParticipantId) -> bool {
        self.participants().any(|p| p == participant)
    }

    /// Home and away participants of a ready head-to-head session
    pub fn pairing(&self) -> Option<(ParticipantId, ParticipantId)> {
        match self.slots.as_slice() {
            [home, away] => Some((home.participant?, away.participant?)),
            _ => None,
        }
    }

    /// Winner and loser, once a head-to-head session is finalized
    ///
    /// A level score without `decided_by` has neither.
    pub fn outcome(&self) -> Option<Outcome> {
        if !self.is_finalized() {
            return None;
        }
        let (home, away) = self.pairing()?;
        match self.result? {
            MatchResult::HeadToHead {
                home_score,
                away_score,
                decided_by,
            } => {
                let winner = if home_score > away_score {
                    Some(home)
                } else if away_score > home_score {
                    Some(away)
                } else {
                    decided_by.filter(|id| *id == home || *id == away)
                };
                let loser = winner.map(|w| if w == home { away } else { home });
                Some(Outcome { winner, loser })
            }
            _ => None,
        }
    }
}

/// A tournament record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub format: TournamentFormat,
    pub status: TournamentStatus,
    pub scoring_mode: ScoringMode,
    pub number_of_rounds: u32,
    pub format_config: FormatConfig,
    pub ranking_rules: RankingRules,
    pub reward_config: RewardConfig,
    pub location: VenueInfo,
    /// Frozen when the tournament starts; empty before
    pub roster: Vec<ParticipantId>,
    /// Incremented on every finalized session
    pub results_version: i64,
    /// `results_version` the stored standings were computed from; -1 before any
    pub standings_version: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Parameters for creating a tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTournament {
    pub name: String,
    pub format: TournamentFormat,
    pub scoring_mode: ScoringMode,
    pub number_of_rounds: u32,
    pub format_config: FormatConfig,
    pub ranking_rules: RankingRules,
    pub reward_config: RewardConfig,
    pub location: VenueInfo,
}

impl NewTournament {
    /// Tournament with the defaults of its format
    ///
    /// Head-to-head formats rank by 3/1/0 points with goal difference, goals
    /// for and participant id as tiebreakers; individual ranking sums scores.
    pub fn new(name: impl Into<String>, format: TournamentFormat) -> Self {
        let scoring_mode = format.scoring_mode();
        let ranking_rules = match scoring_mode {
            ScoringMode::HeadToHead => RankingRules::head_to_head(),
            ScoringMode::Individual => RankingRules::individual(MeasurementType::Score),
        };

        Self {
            name: name.into(),
            format,
            scoring_mode,
            number_of_rounds: 1,
            format_config: FormatConfig::default(),
            ranking_rules,
            reward_config: RewardConfig::default(),
            location: VenueInfo::default(),
        }
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.number_of_rounds = rounds;
        self
    }

    pub fn with_format_config(mut self, config: FormatConfig) -> Self {
        self.format_config = config;
        self
    }

    pub fn with_ranking_rules(mut self, rules: RankingRules) -> Self {
        self.ranking_rules = rules;
        self
    }

    pub fn with_reward_config(mut self, config: RewardConfig) -> Self {
        self.reward_config = config;
        self
    }

    pub fn with_location(mut self, location: VenueInfo) -> Self {
        self.location = location;
        self
    }

    /// Materialize as a stored draft
    pub fn into_tournament(self, id: TournamentId, now: DateTime<Utc>) -> Tournament {
        Tournament {
            id,
            name: self.name,
            format: self.format,
            status: TournamentStatus::Draft,
            scoring_mode: self.scoring_mode,
            number_of_rounds: self.number_of_rounds,
            format_config: self.format_config,
            ranking_rules: self.ranking_rules,
            reward_config: self.reward_config,
            location: self.location,
            roster: Vec::new(),
            results_version: 0,
            standings_version: -1,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }
}
