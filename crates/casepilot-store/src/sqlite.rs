use casepilot_core::{
    CasepilotError, CriticVerdict, InvestigationRequest, ReplayRun, ReplaySession, ReplayStatus,
    ResolutionType, Result, RunOrigin, RunResult, SessionId, TraceId, TraceStore,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Agent reasoning longer than this is cut when a run is persisted.
pub const MAX_PERSISTED_REASONING_CHARS: usize = 10_000;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS runs (
        trace_id TEXT PRIMARY KEY,
        issue_id TEXT NOT NULL,
        customer_id TEXT NOT NULL,
        origin TEXT NOT NULL,
        session_id TEXT,
        status TEXT NOT NULL,
        resolution_type TEXT,
        confidence_score REAL NOT NULL,
        escalate INTEGER NOT NULL,
        request_json TEXT NOT NULL,
        result_json TEXT NOT NULL,
        started_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(origin, started_at);

    CREATE TABLE IF NOT EXISTS critic_verdicts (
        trace_id TEXT PRIMARY KEY REFERENCES runs(trace_id),
        agrees INTEGER NOT NULL,
        note TEXT NOT NULL,
        model_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS replay_sessions (
        session_id TEXT PRIMARY KEY,
        trace_id TEXT NOT NULL UNIQUE,
        n_runs INTEGER NOT NULL,
        status TEXT NOT NULL,
        attempted INTEGER NOT NULL,
        matches INTEGER NOT NULL,
        stability_score REAL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS replay_runs (
        session_id TEXT NOT NULL REFERENCES replay_sessions(session_id),
        run_index INTEGER NOT NULL,
        perturbation_text TEXT NOT NULL,
        replay_trace_id TEXT,
        resolution_type TEXT,
        confidence_score REAL NOT NULL,
        escalate INTEGER NOT NULL,
        matches_original INTEGER NOT NULL,
        error TEXT,
        PRIMARY KEY (session_id, run_index)
    );
";

/// SQLite implementation of [`TraceStore`].
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

fn store_err(e: impl std::fmt::Display) -> CasepilotError {
    CasepilotError::Store(e.to_string())
}

impl SqliteStore {
    /// Open or create the trace database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening trace store");
        let conn = Connection::open(path).map_err(store_err)?;
        // WAL lets the API read while replay runs write
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(store_err)?;
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Number of persisted runs, replays included.
    pub fn run_count(&self) -> Result<usize> {
        let db = self.db.lock();
        let n: i64 = db
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))
            .map_err(store_err)?;
        Ok(n as usize)
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(store_err)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(store_err)
}

fn parse_resolution(code: Option<String>) -> Result<Option<ResolutionType>> {
    match code {
        None => Ok(None),
        Some(c) => ResolutionType::from_code(&c)
            .map(Some)
            .ok_or_else(|| store_err(format!("unknown resolution_type '{c}'"))),
    }
}

struct SessionRow {
    session_id: String,
    trace_id: String,
    n_runs: i64,
    status: String,
    attempted: i64,
    matches: i64,
    stability_score: Option<f64>,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    const COLUMNS: &'static str = "session_id, trace_id, n_runs, status, attempted, matches, \
                                   stability_score, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            trace_id: row.get(1)?,
            n_runs: row.get(2)?,
            status: row.get(3)?,
            attempted: row.get(4)?,
            matches: row.get(5)?,
            stability_score: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_session(self) -> Result<ReplaySession> {
        Ok(ReplaySession {
            session_id: parse_uuid(&self.session_id)?,
            trace_id: parse_uuid(&self.trace_id)?,
            n_runs: self.n_runs as u32,
            status: ReplayStatus::from_code(&self.status)
                .ok_or_else(|| store_err(format!("unknown replay status '{}'", self.status)))?,
            attempted: self.attempted as u32,
            matches: self.matches as u32,
            stability_score: self.stability_score,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

impl SqliteStore {
    fn find_session(&self, column: &str, id: Uuid) -> Result<Option<ReplaySession>> {
        let db = self.db.lock();
        let sql = format!(
            "SELECT {} FROM replay_sessions WHERE {column} = ?1",
            SessionRow::COLUMNS
        );
        let row = db
            .query_row(&sql, params![id.to_string()], SessionRow::from_row)
            .optional()
            .map_err(store_err)?;
        row.map(SessionRow::into_session).transpose()
    }
}

impl TraceStore for SqliteStore {
    fn save_run(&self, run: &RunResult, request: &InvestigationRequest) -> Result<()> {
        let mut stored = run.clone();
        stored.agent_reasoning =
            truncate_chars(&run.agent_reasoning, MAX_PERSISTED_REASONING_CHARS);
        let result_json = serde_json::to_string(&stored)?;
        let request_json = serde_json::to_string(request)?;
        let (origin, session_id) = match run.origin {
            RunOrigin::Primary => ("primary", None),
            RunOrigin::Replay { session_id } => {
                ("replay", Some(session_id.to_string()))
            }
        };

        let db = self.db.lock();
        db.execute(
            "INSERT INTO runs (trace_id, issue_id, customer_id, origin, session_id, status,
                               resolution_type, confidence_score, escalate, request_json,
                               result_json, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(trace_id) DO UPDATE SET
                status = excluded.status,
                resolution_type = excluded.resolution_type,
                confidence_score = excluded.confidence_score,
                escalate = excluded.escalate,
                result_json = excluded.result_json",
            params![
                run.trace_id.to_string(),
                run.issue_id,
                run.customer_id,
                origin,
                session_id,
                run.status.as_str(),
                run.resolution_type().map(|r| r.as_str()),
                run.confidence_score,
                run.escalate as i32,
                request_json,
                result_json,
                run.started_at.to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        debug!(trace_id = %run.trace_id, status = run.status.as_str(), "run persisted");
        Ok(())
    }

    fn get_run(&self, trace_id: TraceId) -> Result<Option<RunResult>> {
        let db = self.db.lock();
        let json: Option<String> = db
            .query_row(
                "SELECT result_json FROM runs WHERE trace_id = ?1",
                params![trace_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        json.map(|j| serde_json::from_str(&j).map_err(CasepilotError::from))
            .transpose()
    }

    fn get_request(&self, trace_id: TraceId) -> Result<Option<InvestigationRequest>> {
        let db = self.db.lock();
        let json: Option<String> = db
            .query_row(
                "SELECT request_json FROM runs WHERE trace_id = ?1",
                params![trace_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        json.map(|j| serde_json::from_str(&j).map_err(CasepilotError::from))
            .transpose()
    }

    fn list_runs(&self, limit: usize) -> Result<Vec<RunResult>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT result_json FROM runs
                 WHERE origin = 'primary'
                 ORDER BY started_at DESC
                 LIMIT ?1",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))
            .map_err(store_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(store_err)?;
        rows.iter()
            .map(|j| serde_json::from_str(j).map_err(CasepilotError::from))
            .collect()
    }

    fn save_critic(&self, trace_id: TraceId, verdict: &CriticVerdict) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO critic_verdicts (trace_id, agrees, note, model_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(trace_id) DO UPDATE SET
                agrees = excluded.agrees,
                note = excluded.note,
                model_id = excluded.model_id,
                created_at = excluded.created_at",
            params![
                trace_id.to_string(),
                verdict.agrees as i32,
                verdict.note,
                verdict.model_id,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn get_critic(&self, trace_id: TraceId) -> Result<Option<CriticVerdict>> {
        let db = self.db.lock();
        db.query_row(
            "SELECT agrees, note, model_id FROM critic_verdicts WHERE trace_id = ?1",
            params![trace_id.to_string()],
            |row| {
                Ok(CriticVerdict {
                    agrees: row.get::<_, i32>(0)? != 0,
                    note: row.get(1)?,
                    model_id: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(store_err)
    }

    fn save_replay_session(&self, session: &ReplaySession) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO replay_sessions (session_id, trace_id, n_runs, status, attempted,
                                          matches, stability_score, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(session_id) DO UPDATE SET
                n_runs = excluded.n_runs,
                status = excluded.status,
                attempted = excluded.attempted,
                matches = excluded.matches,
                stability_score = excluded.stability_score,
                updated_at = excluded.updated_at",
            params![
                session.session_id.to_string(),
                session.trace_id.to_string(),
                session.n_runs as i64,
                session.status.as_str(),
                session.attempted as i64,
                session.matches as i64,
                session.stability_score,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn get_replay_session(&self, session_id: SessionId) -> Result<Option<ReplaySession>> {
        self.find_session("session_id", session_id)
    }

    fn find_replay_session_for_trace(&self, trace_id: TraceId) -> Result<Option<ReplaySession>> {
        self.find_session("trace_id", trace_id)
    }

    fn save_replay_run(&self, run: &ReplayRun) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT OR REPLACE INTO replay_runs (session_id, run_index, perturbation_text,
                                                 replay_trace_id, resolution_type,
                                                 confidence_score, escalate,
                                                 matches_original, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run.session_id.to_string(),
                run.run_index as i64,
                run.perturbation_text,
                run.replay_trace_id.map(|t| t.to_string()),
                run.resolution_type.map(|r| r.as_str()),
                run.confidence_score,
                run.escalate as i32,
                run.matches_original as i32,
                run.error,
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn clear_replay_runs(&self, session_id: SessionId) -> Result<()> {
        let db = self.db.lock();
        let removed = db
            .execute(
                "DELETE FROM replay_runs WHERE session_id = ?1",
                params![session_id.to_string()],
            )
            .map_err(store_err)?;
        if removed > 0 {
            debug!(%session_id, removed, "cleared previous replay runs");
        }
        Ok(())
    }

    fn list_replay_runs(&self, session_id: SessionId) -> Result<Vec<ReplayRun>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT run_index, perturbation_text, replay_trace_id, resolution_type,
                        confidence_score, escalate, matches_original, error
                 FROM replay_runs WHERE session_id = ?1
                 ORDER BY run_index",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![session_id.to_string()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, i32>(5)? != 0,
                    row.get::<_, i32>(6)? != 0,
                    row.get::<_, Option<String>>(7)?,
                ))
            })
            .map_err(store_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(store_err)?;

        rows.into_iter()
            .map(
                |(index, text, trace, resolution, confidence, escalate, matches, error)|
                 -> Result<ReplayRun> {
                    Ok(ReplayRun {
                        session_id,
                        run_index: index as u32,
                        perturbation_text: text,
                        replay_trace_id: trace.as_deref().map(parse_uuid).transpose()?,
                        resolution_type: parse_resolution(resolution)?,
                        confidence_score: confidence,
                        escalate,
                        matches_original: matches,
                        error,
                    })
                },
            )
            .collect()
    }
}
