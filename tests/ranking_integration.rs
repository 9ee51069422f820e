//! Integration tests for standings computation.
//!
//! Covers measurement direction, per-round aggregation and the configurable
//! tiebreaker chain, both through the ranking engine directly and through a
//! tournament run end to end.

#[cfg(test)]
mod ranking_tests {
    use academy_tournaments::db::MemoryStore;
    use academy_tournaments::ranking::{
        Aggregation, MeasurementType, RankingContext, RankingRules, StandingEntry, Tiebreaker,
        compute_standings,
    };
    use academy_tournaments::tournament::{
        InstructorAssignment, MatchResult, NewSession, NewTournament, ParticipantId, Session,
        SessionStatus, Slot, Stage, Tournament, TournamentFormat, TournamentManager,
        TournamentStatus,
    };
    use chrono::Utc;
    use std::sync::Arc;

    fn finalized(id: i64, stage: Stage, slots: Vec<Slot>, result: MatchResult) -> Session {
        let mut session = NewSession::scheduled(id as u32, 1, stage, slots, "Track")
            .into_session(id, 1, Utc::now());
        session.result = Some(result);
        session.status = SessionStatus::Finalized;
        session
    }

    fn h2h(id: i64, home: ParticipantId, away: ParticipantId, score: (u32, u32)) -> Session {
        finalized(
            id,
            Stage::League,
            vec![Slot::fixed(home), Slot::fixed(away)],
            MatchResult::score(score.0, score.1),
        )
    }

    fn attempt(id: i64, participant: ParticipantId, value: f64) -> Session {
        finalized(id, Stage::Individual, vec![Slot::fixed(participant)], MatchResult::attempt(value))
    }

    fn league(rules: RankingRules) -> Tournament {
        NewTournament::new("Table", TournamentFormat::League)
            .with_ranking_rules(rules)
            .into_tournament(1, Utc::now())
    }

    fn individual(rules: RankingRules) -> Tournament {
        NewTournament::new("Sprint", TournamentFormat::IndividualRanking)
            .with_rounds(3)
            .with_ranking_rules(rules)
            .into_tournament(1, Utc::now())
    }

    fn order(standings: &[StandingEntry]) -> Vec<(ParticipantId, u32)> {
        standings.iter().map(|e| (e.participant_id, e.rank)).collect()
    }

    /// 1 and 2 finish level on points and goal difference
    fn level_table() -> Vec<Session> {
        vec![h2h(1, 1, 3, (1, 0)), h2h(2, 2, 3, (4, 3)), h2h(3, 1, 2, (0, 0))]
    }

    fn sprint_times() -> Vec<Session> {
        vec![
            attempt(1, 1, 12.1),
            attempt(2, 2, 12.0),
            attempt(3, 1, 11.9),
            attempt(4, 2, 12.0),
            attempt(5, 1, 12.4),
            attempt(6, 2, 12.0),
        ]
    }

    #[test]
    fn test_lower_total_time_ranks_first() {
        let t = individual(RankingRules::individual(MeasurementType::Time));
        let standings = compute_standings(&RankingContext::for_tournament(&t), &[1, 2], &sprint_times());

        assert_eq!(order(&standings), vec![(2, 1), (1, 2)]);
        assert!((standings[0].score - 36.0).abs() < 1e-9);
        assert!((standings[1].score - 36.4).abs() < 1e-9);
        assert_eq!(standings[1].best_attempt, Some(11.9));
        assert_eq!(standings[1].attempts, 3);
    }

    #[test]
    fn test_best_attempt_aggregation_flips_the_order() {
        let rules = RankingRules::individual(MeasurementType::Time).with_aggregation(Aggregation::Best);
        let t = individual(rules);
        let standings = compute_standings(&RankingContext::for_tournament(&t), &[1, 2], &sprint_times());
        assert_eq!(order(&standings), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_distance_ranks_higher_first_and_idle_last() {
        let t = individual(RankingRules::individual(MeasurementType::Distance));
        let sessions = vec![attempt(1, 1, 5.2), attempt(2, 2, 6.8), attempt(3, 1, 5.9)];
        let standings = compute_standings(&RankingContext::for_tournament(&t), &[1, 2, 3], &sessions);

        // 1 totals 11.1 over two jumps; 3 never jumped
        assert_eq!(order(&standings), vec![(1, 1), (2, 2), (3, 3)]);
        assert_eq!(standings[2].attempts, 0);
    }

    #[test]
    fn test_tiebreaker_order_is_configuration() {
        let by_goals_for = league(
            RankingRules::head_to_head()
                .with_tiebreakers(vec![Tiebreaker::GoalsFor, Tiebreaker::ParticipantId]),
        );
        let standings =
            compute_standings(&RankingContext::for_tournament(&by_goals_for), &[1, 2, 3], &level_table());
        assert_eq!(order(&standings), vec![(2, 1), (1, 2), (3, 3)]);

        let by_goals_against = league(
            RankingRules::head_to_head()
                .with_tiebreakers(vec![Tiebreaker::GoalsAgainst, Tiebreaker::ParticipantId]),
        );
        let standings = compute_standings(
            &RankingContext::for_tournament(&by_goals_against),
            &[1, 2, 3],
            &level_table(),
        );
        assert_eq!(order(&standings), vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_unbroken_tie_shares_rank() {
        let t = league(RankingRules::head_to_head().with_tiebreakers(vec![Tiebreaker::GoalDifference]));
        let standings = compute_standings(&RankingContext::for_tournament(&t), &[1, 2, 3], &level_table());

        assert_eq!(order(&standings), vec![(1, 1), (2, 1), (3, 3)]);
        assert_eq!(standings[0].score, 4.0);
        assert_eq!(standings[1].score, 4.0);
    }

    #[test]
    fn test_unplayed_sessions_do_not_count() {
        let t = league(RankingRules::head_to_head());
        let mut sessions = level_table();
        sessions[2].status = SessionStatus::Scheduled;
        sessions[2].result = None;

        let standings = compute_standings(&RankingContext::for_tournament(&t), &[1, 2, 3], &sessions);
        let one = standings.iter().find(|e| e.participant_id == 1).unwrap();
        assert_eq!(one.played, 1);
        assert_eq!(one.score, 3.0);
    }

    #[tokio::test]
    async fn test_time_trial_through_the_manager() {
        academy_tournaments::logging::init_for_tests();
        let store = Arc::new(MemoryStore::new());
        let manager = TournamentManager::new(store.clone(), store.clone(), store.clone(), store.clone());

        let t = manager
            .create_tournament(
                NewTournament::new("100m", TournamentFormat::IndividualRanking)
                    .with_rounds(3)
                    .with_ranking_rules(RankingRules::individual(MeasurementType::Time)),
            )
            .await
            .unwrap();
        store.assign_instructor(t.id, InstructorAssignment::lead(7)).await;
        store
            .assign_instructor(t.id, InstructorAssignment::assistant(8, None))
            .await;
        manager.assign_lead_instructor(t.id).await.unwrap();
        manager.mark_ready_for_enrollment(t.id).await.unwrap();
        manager.open_enrollment(t.id).await.unwrap();
        store.enroll(t.id, 1).await;
        store.enroll(t.id, 2).await;
        manager.start_tournament(t.id).await.unwrap();

        let times = [(1, [12.1, 11.9, 12.4]), (2, [12.0, 12.0, 12.0])];
        for session in manager.sessions(t.id).await.unwrap() {
            let participant = session.participants().next().unwrap();
            let (_, runs) = times.iter().find(|(p, _)| *p == participant).unwrap();
            let value = runs[session.round as usize - 1];
            manager
                .record_result(session.id, MatchResult::attempt(value))
                .await
                .unwrap();
        }

        let standings = manager.standings(t.id).await.unwrap();
        assert_eq!(order(&standings), vec![(2, 1), (1, 2)]);
        assert_eq!(
            manager.get_tournament(t.id).await.unwrap().status,
            TournamentStatus::Completed
        );
    }
}
