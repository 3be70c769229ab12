#[cfg(test)]
mod tests {
    use casepilot_core::{
        CriticVerdict, EscalationPriority, InvestigationRequest, IssueType, ReplayRun,
        ReplaySession, ReplayStatus, ResolutionType, RunOrigin, RunResult, RunStatus,
        TerminalVerdict, ToolCallRecord, TraceStore,
    };
    use casepilot_store::SqliteStore;
    use casepilot_store::sqlite::MAX_PERSISTED_REASONING_CHARS;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn request(issue_id: &str) -> InvestigationRequest {
        InvestigationRequest {
            issue_id: issue_id.into(),
            customer_id: "CUST-001".into(),
            channel: "chat".into(),
            urgency: "high".into(),
            raw_message: "My wire transfer has not arrived".into(),
        }
    }

    fn verdict() -> TerminalVerdict {
        TerminalVerdict {
            issue_type: IssueType::WireDelay,
            root_cause: "Compliance hold".into(),
            resolution: "Hold released".into(),
            resolution_type: ResolutionType::AutoResolved,
            next_steps: vec!["Notify customer".into()],
            confidence_score: 0.9,
            escalate: false,
            escalation_priority: None,
            policy_flags: vec![],
        }
    }

    fn run(issue_id: &str, origin: RunOrigin) -> RunResult {
        RunResult {
            trace_id: Uuid::new_v4(),
            issue_id: issue_id.into(),
            customer_id: "CUST-001".into(),
            origin,
            status: RunStatus::Completed,
            tool_calls: vec![ToolCallRecord {
                tool_name: "get_customer_profile".into(),
                argument_digest: "abcdef012345".into(),
                latency_ms: 12.5,
                cache_hit: false,
                result_summary: "tier=gold".into(),
            }],
            structured_output: Some(verdict()),
            confidence_score: 0.9,
            escalate: false,
            escalation_priority: EscalationPriority::Low,
            policy_flags: vec![],
            agent_reasoning: "Checked the wire status.".into(),
            token_count: 1500,
            duration_ms: 820.0,
            started_at: Utc::now(),
            error: None,
        }
    }

    fn replay_run(session: &ReplaySession, index: u32, matches: bool) -> ReplayRun {
        ReplayRun {
            session_id: session.session_id,
            run_index: index,
            perturbation_text: format!("variant {index}"),
            replay_trace_id: Some(Uuid::new_v4()),
            resolution_type: Some(ResolutionType::AutoResolved),
            confidence_score: 0.8,
            escalate: false,
            matches_original: matches,
            error: None,
        }
    }

    // ── Runs ───────────────────────────────────────────────────

    #[test]
    fn test_save_and_get_run() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = run("ISS-1", RunOrigin::Primary);
        store.save_run(&r, &request("ISS-1")).unwrap();

        let loaded = store.get_run(r.trace_id).unwrap().unwrap();
        assert_eq!(loaded, r);
        assert_eq!(store.run_count().unwrap(), 1);
    }

    #[test]
    fn test_get_unknown_run_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_run(Uuid::new_v4()).unwrap().is_none());
        assert!(store.get_request(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_request_stored_with_run() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = run("ISS-2", RunOrigin::Primary);
        let req = request("ISS-2");
        store.save_run(&r, &req).unwrap();
        assert_eq!(store.get_request(r.trace_id).unwrap(), Some(req));
    }

    #[test]
    fn test_failed_run_without_verdict_roundtrips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut r = run("ISS-3", RunOrigin::Primary);
        r.status = RunStatus::Failed;
        r.structured_output = None;
        r.escalate = true;
        r.error = Some("backend unavailable".into());
        store.save_run(&r, &request("ISS-3")).unwrap();

        let loaded = store.get_run(r.trace_id).unwrap().unwrap();
        assert!(loaded.is_failed());
        assert!(loaded.structured_output.is_none());
        assert_eq!(loaded.error.as_deref(), Some("backend unavailable"));
    }

    #[test]
    fn test_long_reasoning_truncated() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut r = run("ISS-4", RunOrigin::Primary);
        r.agent_reasoning = "é".repeat(MAX_PERSISTED_REASONING_CHARS + 500);
        store.save_run(&r, &request("ISS-4")).unwrap();

        let loaded = store.get_run(r.trace_id).unwrap().unwrap();
        assert_eq!(
            loaded.agent_reasoning.chars().count(),
            MAX_PERSISTED_REASONING_CHARS
        );
    }

    #[test]
    fn test_list_runs_newest_first_primary_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut older = run("ISS-old", RunOrigin::Primary);
        older.started_at = Utc::now() - Duration::minutes(10);
        let newer = run("ISS-new", RunOrigin::Primary);
        let replay = run(
            "ISS-old",
            RunOrigin::Replay {
                session_id: Uuid::new_v4(),
            },
        );
        store.save_run(&older, &request("ISS-old")).unwrap();
        store.save_run(&newer, &request("ISS-new")).unwrap();
        store.save_run(&replay, &request("ISS-old")).unwrap();

        let listed = store.list_runs(10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].issue_id, "ISS-new");
        assert_eq!(listed[1].issue_id, "ISS-old");

        assert_eq!(store.list_runs(1).unwrap().len(), 1);
        assert_eq!(store.run_count().unwrap(), 3);
    }

    #[test]
    fn test_replay_origin_roundtrips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session_id = Uuid::new_v4();
        let r = run("ISS-5", RunOrigin::Replay { session_id });
        store.save_run(&r, &request("ISS-5")).unwrap();
        let loaded = store.get_run(r.trace_id).unwrap().unwrap();
        assert_eq!(loaded.origin, RunOrigin::Replay { session_id });
    }

    // ── Critic verdicts ────────────────────────────────────────

    #[test]
    fn test_critic_save_and_overwrite() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = run("ISS-6", RunOrigin::Primary);
        store.save_run(&r, &request("ISS-6")).unwrap();
        assert!(store.get_critic(r.trace_id).unwrap().is_none());

        store
            .save_critic(r.trace_id, &CriticVerdict::unavailable("critic-model"))
            .unwrap();
        let reviewed = CriticVerdict {
            agrees: false,
            note: "Priority should be HIGH".into(),
            model_id: "critic-model".into(),
        };
        store.save_critic(r.trace_id, &reviewed).unwrap();
        assert_eq!(store.get_critic(r.trace_id).unwrap(), Some(reviewed));
    }

    // ── Replay sessions ────────────────────────────────────────

    #[test]
    fn test_replay_session_lookup_both_ways() {
        let store = SqliteStore::open_in_memory().unwrap();
        let trace_id = Uuid::new_v4();
        let session = ReplaySession::start(trace_id, 3);
        store.save_replay_session(&session).unwrap();

        let by_id = store.get_replay_session(session.session_id).unwrap().unwrap();
        assert_eq!(by_id.trace_id, trace_id);
        assert_eq!(by_id.status, ReplayStatus::Running);
        assert!(by_id.stability_score.is_none());

        let by_trace = store.find_replay_session_for_trace(trace_id).unwrap().unwrap();
        assert_eq!(by_trace.session_id, session.session_id);
        assert!(store.find_replay_session_for_trace(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_replay_session_update_in_place() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut session = ReplaySession::start(Uuid::new_v4(), 3);
        store.save_replay_session(&session).unwrap();

        session.attempted = 3;
        session.matches = 2;
        session.stability_score = Some(0.667);
        session.status = ReplayStatus::Completed;
        store.save_replay_session(&session).unwrap();

        let loaded = store.get_replay_session(session.session_id).unwrap().unwrap();
        assert!(loaded.is_complete());
        assert_eq!(loaded.matches, 2);
        assert_eq!(loaded.stability_score, Some(0.667));
    }

    #[test]
    fn test_replay_runs_ordered_and_cleared() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = ReplaySession::start(Uuid::new_v4(), 3);
        store.save_replay_session(&session).unwrap();

        store.save_replay_run(&replay_run(&session, 2, false)).unwrap();
        store.save_replay_run(&replay_run(&session, 0, true)).unwrap();
        let mut failed = replay_run(&session, 1, false);
        failed.replay_trace_id = None;
        failed.resolution_type = None;
        failed.error = Some("timeout".into());
        store.save_replay_run(&failed).unwrap();

        let runs = store.list_replay_runs(session.session_id).unwrap();
        let indexes: Vec<u32> = runs.iter().map(|r| r.run_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(runs[1], failed);

        store.clear_replay_runs(session.session_id).unwrap();
        assert!(store.list_replay_runs(session.session_id).unwrap().is_empty());
    }

    // ── On disk ────────────────────────────────────────────────

    #[test]
    fn test_reopen_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces.db");
        let r = run("ISS-7", RunOrigin::Primary);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_run(&r, &request("ISS-7")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_run(r.trace_id).unwrap().unwrap().issue_id, "ISS-7");
    }
}
