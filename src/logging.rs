//! Structured logging configuration.
//!
//! The engine itself logs through the `log` facade; these helpers install a
//! `tracing-subscriber` pipeline that also captures those records and emit
//! structured lifecycle events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::rewards::DistributionReport;
use crate::tournament::{TournamentId, TournamentStatus};

const DEFAULT_FILTER: &str = "info,sqlx=warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var and default to
/// `info,sqlx=warn`.
///
/// # Example
///
/// ```no_run
/// use academy_tournaments::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     log::info!("Engine starting");
/// }
/// ```
pub fn init() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Initialize logging for tests; safe to call from every test
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Log a persisted lifecycle transition with structured data
pub fn log_transition(tournament_id: TournamentId, from: TournamentStatus, to: TournamentStatus) {
    tracing::info!(
        tournament_id = tournament_id,
        from = %from,
        to = %to,
        "Tournament status changed"
    );
}

/// Log the outcome of a reward distribution run
pub fn log_distribution(report: &DistributionReport) {
    if report.failures.is_empty() {
        tracing::info!(
            tournament_id = report.tournament_id,
            created = report.created.len(),
            existing = report.existing.len(),
            "Rewards distributed"
        );
    } else {
        tracing::warn!(
            tournament_id = report.tournament_id,
            created = report.created.len(),
            existing = report.existing.len(),
            failures = report.failures.len(),
            "Rewards distributed with per-participant failures"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_for_tests_is_repeatable() {
        init_for_tests();
        init_for_tests();
        log_transition(1, TournamentStatus::Draft, TournamentStatus::Cancelled);
    }

    #[test]
    fn test_log_distribution_accepts_empty_report() {
        init_for_tests();
        log_distribution(&DistributionReport::new(7));
    }
}
