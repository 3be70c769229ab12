//! Background execution of replay sessions.
//!
//! A trigger validates the request, resets or creates the session, and
//! returns at once with a `running` snapshot. The session's runs execute in
//! a background task; each run waits for a permit from a semaphore shared by
//! every session, so replays never exceed `max_concurrent_runs` backend
//! investigations at a time. Session counters live behind a per-session
//! mutex and every update carries the epoch of the trigger that scheduled
//! it, so a superseded trigger can never write into a restarted session.

use casepilot_config::ReplayConfig;
use casepilot_core::{
    CasepilotError, InvestigationRequest, ReplayRun, ReplaySession, ReplayStatus, ResolutionType,
    Result, RunOrigin, SessionId, TraceId, TraceStore,
};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::perturb::{Paraphraser, PerturbationSource};
use super::stability::{compute_stability, replay_run_from_result};
use crate::investigator::Investigator;

struct SessionCell {
    session: ReplaySession,
    epoch: u64,
    runs: Vec<ReplayRun>,
    tx: watch::Sender<ReplaySession>,
}

struct LiveSession {
    cell: Arc<Mutex<SessionCell>>,
    task: JoinHandle<()>,
}

struct Shared {
    investigator: Arc<Investigator>,
    paraphraser: Paraphraser,
    store: Arc<dyn TraceStore>,
    permits: Arc<Semaphore>,
}

/// Schedules and tracks replay sessions, keyed by the trace they replay.
pub struct ReplayEngine {
    shared: Arc<Shared>,
    config: ReplayConfig,
    live: Mutex<HashMap<TraceId, LiveSession>>,
}

/// A caller's view of a triggered session.
pub struct ReplayHandle {
    session_id: SessionId,
    trace_id: TraceId,
    rx: watch::Receiver<ReplaySession>,
}

impl ReplayHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Current state of the session.
    pub fn snapshot(&self) -> ReplaySession {
        self.rx.borrow().clone()
    }

    /// Wait until every run of the session has been attempted.
    pub async fn wait(&self) -> ReplaySession {
        let mut rx = self.rx.clone();
        // A closed channel means the engine is gone; report the last state seen.
        let _ = rx.wait_for(ReplaySession::is_complete).await;
        let session = rx.borrow().clone();
        session
    }
}

impl ReplayEngine {
    pub fn new(
        investigator: Arc<Investigator>,
        paraphraser: Paraphraser,
        store: Arc<dyn TraceStore>,
        config: ReplayConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_runs.max(1)));
        Self {
            shared: Arc::new(Shared {
                investigator,
                paraphraser,
                store,
                permits,
            }),
            config,
            live: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Start, or restart, the replay session for `trace_id` with `n_runs`
    /// perturbations (the configured default when `None`).
    ///
    /// The reset session is written to the store before any in-memory state
    /// changes, so a failed write leaves a running session untouched. Must be
    /// called from within a Tokio runtime.
    pub fn trigger(&self, trace_id: TraceId, n_runs: Option<u32>) -> Result<ReplayHandle> {
        let n = n_runs.unwrap_or(self.config.default_runs);
        if n == 0 || n > self.config.max_runs {
            return Err(CasepilotError::InvalidRequest(format!(
                "n_runs must be between 1 and {}, got {n}",
                self.config.max_runs
            )));
        }

        let store = self.shared.store.as_ref();
        let original = store
            .get_run(trace_id)?
            .ok_or_else(|| CasepilotError::NotFound(format!("run {trace_id}")))?;
        if original.origin.is_replay() {
            return Err(CasepilotError::InvalidRequest(format!(
                "run {trace_id} is itself a replay"
            )));
        }
        let decision = original.decision().ok_or_else(|| {
            CasepilotError::InvalidRequest(format!("run {trace_id} has no verdict to replay"))
        })?;
        let request = store
            .get_request(trace_id)?
            .ok_or_else(|| CasepilotError::NotFound(format!("request for run {trace_id}")))?;

        let mut live = self.live.lock();
        live.retain(|_, entry| !entry.task.is_finished());

        let (cell, epoch, session) = match live.get(&trace_id) {
            Some(existing) => {
                let cell = Arc::clone(&existing.cell);
                let (epoch, session) = restart_cell(store, &cell, n)?;
                (cell, epoch, session)
            }
            None => {
                let session = match store.find_replay_session_for_trace(trace_id)? {
                    Some(mut previous) => {
                        previous.restart(n);
                        previous
                    }
                    None => ReplaySession::start(trace_id, n),
                };
                persist_restart(store, &session)?;
                let (tx, _) = watch::channel(session.clone());
                let cell = Arc::new(Mutex::new(SessionCell {
                    session: session.clone(),
                    epoch: 0,
                    runs: Vec::new(),
                    tx,
                }));
                (cell, 0, session)
            }
        };
        let rx = cell.lock().tx.subscribe();

        info!(
            session_id = %session.session_id,
            %trace_id,
            n_runs = n,
            epoch,
            "replay session started"
        );

        let task = tokio::spawn(run_session(
            Arc::clone(&self.shared),
            Arc::clone(&cell),
            epoch,
            request,
            decision,
            n,
        ));
        if let Some(previous) = live.insert(trace_id, LiveSession { cell, task }) {
            previous.task.abort();
        }

        Ok(ReplayHandle {
            session_id: session.session_id,
            trace_id,
            rx,
        })
    }

    /// Stored state of a session and the runs recorded so far.
    pub fn session(&self, session_id: SessionId) -> Result<Option<(ReplaySession, Vec<ReplayRun>)>> {
        let store = &self.shared.store;
        match store.get_replay_session(session_id)? {
            Some(session) => {
                let runs = store.list_replay_runs(session_id)?;
                Ok(Some((session, runs)))
            }
            None => Ok(None),
        }
    }

    /// Abort every background session.
    pub fn shutdown(&self) {
        for (trace_id, entry) in self.live.lock().drain() {
            if !entry.task.is_finished() {
                debug!(%trace_id, "aborting replay session");
                entry.task.abort();
            }
        }
    }
}

impl Drop for ReplayEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_session(
    shared: Arc<Shared>,
    cell: Arc<Mutex<SessionCell>>,
    epoch: u64,
    request: InvestigationRequest,
    original: (ResolutionType, bool),
    n: u32,
) {
    let session_id = cell.lock().session.session_id;
    let perturbations = shared
        .paraphraser
        .generate(&request.raw_message, n as usize)
        .await;
    if let PerturbationSource::Template { ref reason } = perturbations.source {
        info!(%session_id, %reason, "replay using template perturbations");
    }

    let mut pending: FuturesUnordered<_> = perturbations
        .texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let shared = Arc::clone(&shared);
            let replay_request = request.with_message(text.clone());
            async move {
                let result = match Arc::clone(&shared.permits).acquire_owned().await {
                    Ok(_permit) => {
                        let result = shared
                            .investigator
                            .run_with_origin(&replay_request, RunOrigin::Replay { session_id })
                            .await;
                        if let Err(e) = shared.store.save_run(&result, &replay_request) {
                            warn!(%session_id, trace_id = %result.trace_id, error = %e, "failed to persist replay trace");
                        }
                        Some(result)
                    }
                    Err(_) => None,
                };
                (index as u32, text, result)
            }
        })
        .collect();

    while let Some((index, text, result)) = pending.next().await {
        let run = match result {
            Some(ref result) => replay_run_from_result(session_id, index, text, result, original),
            None => unscheduled_run(session_id, index, text),
        };
        info!(
            %session_id,
            run_index = index,
            matches = run.matches_original,
            failed = run.error.is_some(),
            "replay run complete"
        );
        record(&shared, &cell, epoch, run, original);
    }
}

fn persist_restart(store: &dyn TraceStore, session: &ReplaySession) -> Result<()> {
    store.clear_replay_runs(session.session_id)?;
    store.save_replay_session(session)
}

/// Reset a live session in place. The store is written under the cell lock,
/// which `record` also holds, so no run of the old epoch lands between the
/// clear and the epoch bump.
fn restart_cell(
    store: &dyn TraceStore,
    cell: &Mutex<SessionCell>,
    n: u32,
) -> Result<(u64, ReplaySession)> {
    let mut c = cell.lock();
    let mut session = c.session.clone();
    session.restart(n);
    persist_restart(store, &session)?;

    c.epoch += 1;
    c.session = session.clone();
    c.runs.clear();
    c.tx.send_replace(session.clone());
    Ok((c.epoch, session))
}

fn unscheduled_run(session_id: SessionId, run_index: u32, perturbation_text: String) -> ReplayRun {
    ReplayRun {
        session_id,
        run_index,
        perturbation_text,
        replay_trace_id: None,
        resolution_type: None,
        confidence_score: 0.0,
        escalate: true,
        matches_original: false,
        error: Some("replay scheduler shut down".into()),
    }
}

fn record(
    shared: &Shared,
    cell: &Mutex<SessionCell>,
    epoch: u64,
    run: ReplayRun,
    original: (ResolutionType, bool),
) {
    let mut c = cell.lock();
    if c.epoch != epoch {
        debug!(session_id = %c.session.session_id, "dropping run from a superseded replay trigger");
        return;
    }

    if let Err(e) = shared.store.save_replay_run(&run) {
        warn!(session_id = %run.session_id, run_index = run.run_index, error = %e, "failed to persist replay run");
    }
    c.session.attempted += 1;
    if run.matches_original {
        c.session.matches += 1;
    }
    c.runs.push(run);
    c.session.updated_at = Utc::now();

    if c.session.attempted >= c.session.n_runs {
        let stability = compute_stability(original.0, original.1, &c.runs);
        c.session.status = ReplayStatus::Completed;
        c.session.stability_score = Some(stability);
        c.runs = Vec::new();
        info!(
            session_id = %c.session.session_id,
            matches = c.session.matches,
            n_runs = c.session.n_runs,
            stability,
            "replay session complete"
        );
    }

    if let Err(e) = shared.store.save_replay_session(&c.session) {
        warn!(session_id = %c.session.session_id, error = %e, "failed to persist replay session");
    }
    let snapshot = c.session.clone();
    c.tx.send_replace(snapshot);
}
