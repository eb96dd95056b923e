//! Session recorder: the append-only, crash-resistant JSON session log.
//!
//! Owns one JSON file on disk for one analysis run. Every mutation updates the
//! in-memory document and rewrites the file through a temp-file + atomic
//! rename, with bounded retries and a direct-overwrite fallback for platforms
//! where rename can transiently fail under concurrent readers. The file is
//! live-consumed by UIs and exporters, so a rare non-atomic overwrite is
//! preferred over a failed write.
//!
//! Write errors are logged, never raised: the recorder must not crash the
//! workflow.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Bounded rename retries before falling back to a direct overwrite.
const SAVE_ATTEMPTS: usize = 6;
/// Base backoff between rename retries; grows with the attempt number.
const SAVE_RETRY_BASE: Duration = Duration::from_millis(250);
/// Bounded attempts to exclusive-create the session file under id collisions.
const CREATE_ATTEMPTS: usize = 5;

/// Session lifecycle status. Transitions are forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    /// Ordering rank: a status can only move to a strictly higher rank.
    fn rank(&self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::Failed => 2,
            Self::Cancelled => 2,
        }
    }
}

/// One workflow stage marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage_name: String,
    pub description: String,
    pub start_time: String,
}

/// One agent execution in the session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_name: String,
    pub action: String,
    pub start_time: String,
    pub status: String,
    pub result: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

/// One intra-agent action (e.g. the LLM call with its tool count).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub agent_name: String,
    pub action: String,
    pub details: Value,
    pub timestamp: String,
}

/// One MCP tool call in the session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpCallRecord {
    pub agent_name: String,
    pub tool_name: String,
    pub tool_args: Value,
    pub tool_result: Value,
    pub timestamp: String,
}

/// One error or warning entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub timestamp: String,
}

/// The on-disk session document. Keys are stable; field order is not
/// significant. Consumers may read the file while the engine writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDocument {
    pub session_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub status: SessionStatus,
    pub user_query: String,
    pub stages: Vec<StageRecord>,
    pub agents: Vec<AgentRecord>,
    pub actions: Vec<ActionRecord>,
    pub mcp_calls: Vec<McpCallRecord>,
    pub errors: Vec<ErrorRecord>,
    pub warnings: Vec<ErrorRecord>,
    pub final_results: Value,
}

impl SessionDocument {
    fn new(session_id: String) -> Self {
        let now = now_iso();
        Self {
            session_id,
            created_at: now.clone(),
            updated_at: now,
            status: SessionStatus::Active,
            user_query: String::new(),
            stages: Vec::new(),
            agents: Vec::new(),
            actions: Vec::new(),
            mcp_calls: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            final_results: Value::Object(serde_json::Map::new()),
        }
    }
}

/// Failure to create the session file; the only error the recorder ever
/// returns (all later write failures are logged and swallowed).
#[derive(Debug, thiserror::Error)]
#[error("create session file in {dir}: {source}")]
pub struct RecorderError {
    pub dir: PathBuf,
    #[source]
    pub source: std::io::Error,
}

fn now_iso() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Session ids are a microsecond timestamp plus a short random token, unique
/// under concurrent runs.
fn generate_session_id() -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%6f");
    let token = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", stamp, &token[..8])
}

struct RecorderInner {
    doc: SessionDocument,
    path: PathBuf,
}

/// The session recorder (single owner of one session file).
///
/// All callers funnel through one instance; writes are serialized by the
/// internal mutex. Readers can open the file read-only at any time and will
/// observe an older consistent snapshot.
pub struct SessionRecorder {
    inner: Mutex<RecorderInner>,
}

impl SessionRecorder {
    /// Creates the session file atomically (exclusive create). If the path
    /// already exists the id is regenerated, a bounded number of times.
    pub fn new(dump_dir: &Path, session_id: Option<String>) -> Result<Self, RecorderError> {
        std::fs::create_dir_all(dump_dir).map_err(|e| RecorderError {
            dir: dump_dir.to_path_buf(),
            source: e,
        })?;

        let mut id = session_id.unwrap_or_else(generate_session_id);
        for attempt in 0..CREATE_ATTEMPTS {
            let path = dump_dir.join(format!("session_{id}.json"));
            let doc = SessionDocument::new(id.clone());
            let payload = serde_json::to_vec_pretty(&doc).expect("document serializes");
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    use std::io::Write;
                    if let Err(e) = file.write_all(&payload) {
                        warn!(error = %e, path = %path.display(), "initial session write failed");
                    }
                    tracing::info!(session_id = %id, path = %path.display(), "session started");
                    return Ok(Self {
                        inner: Mutex::new(RecorderInner { doc, path }),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if attempt + 1 == CREATE_ATTEMPTS {
                        return Err(RecorderError {
                            dir: dump_dir.to_path_buf(),
                            source: e,
                        });
                    }
                    id = generate_session_id();
                }
                Err(e) => {
                    return Err(RecorderError {
                        dir: dump_dir.to_path_buf(),
                        source: e,
                    })
                }
            }
        }
        unreachable!("create loop returns within CREATE_ATTEMPTS");
    }

    /// The session id of this run.
    pub fn session_id(&self) -> String {
        self.inner.lock().expect("recorder lock").doc.session_id.clone()
    }

    /// Path of the session file on disk.
    pub fn path(&self) -> PathBuf {
        self.inner.lock().expect("recorder lock").path.clone()
    }

    /// A clone of the current document, for programmatic consumers.
    pub fn snapshot(&self) -> SessionDocument {
        self.inner.lock().expect("recorder lock").doc.clone()
    }

    fn mutate<F: FnOnce(&mut SessionDocument)>(&self, f: F) {
        let mut inner = self.inner.lock().expect("recorder lock");
        f(&mut inner.doc);
        inner.doc.updated_at = now_iso();
        save(&inner.path, &inner.doc);
    }

    /// Sets the user query.
    pub fn set_user_query(&self, query: &str) {
        self.mutate(|doc| doc.user_query = query.to_string());
    }

    /// Advances the session status. Backward transitions are ignored.
    pub fn set_status(&self, status: SessionStatus) {
        self.mutate(|doc| {
            if status.rank() > doc.status.rank() {
                doc.status = status;
            }
        });
    }

    /// Opens a named stage. Consecutive calls with the same stage name are
    /// collapsed so debate loops do not spam the log.
    pub fn start_stage(&self, stage_name: &str, description: &str) {
        self.mutate(|doc| {
            if doc
                .stages
                .last()
                .map(|s| s.stage_name == stage_name)
                .unwrap_or(false)
            {
                return;
            }
            doc.stages.push(StageRecord {
                stage_name: stage_name.to_string(),
                description: description.to_string(),
                start_time: now_iso(),
            });
        });
    }

    /// Opens an agent record in `running` state.
    pub fn start_agent(
        &self,
        agent_name: &str,
        action: &str,
        system_prompt: &str,
        user_prompt: &str,
        context: &str,
    ) {
        self.mutate(|doc| {
            doc.agents.push(AgentRecord {
                agent_name: agent_name.to_string(),
                action: action.to_string(),
                start_time: now_iso(),
                status: "running".to_string(),
                result: String::new(),
                system_prompt: system_prompt.to_string(),
                user_prompt: user_prompt.to_string(),
                context: context.to_string(),
                end_time: None,
            });
        });
    }

    /// Closes the agent's open record with its result.
    pub fn complete_agent(&self, agent_name: &str, result: &str, success: bool) {
        self.mutate(|doc| {
            if let Some(agent) = doc
                .agents
                .iter_mut()
                .rev()
                .find(|a| a.agent_name == agent_name && a.status == "running")
            {
                agent.status = if success { "completed" } else { "failed" }.to_string();
                agent.result = result.to_string();
                agent.end_time = Some(now_iso());
            } else {
                warn!(agent = %agent_name, "complete_agent without matching start");
            }
        });
    }

    /// Appends an intra-agent action (e.g. the LLM call).
    pub fn add_agent_action(&self, agent_name: &str, action: &str, details: Value) {
        self.mutate(|doc| {
            doc.actions.push(ActionRecord {
                agent_name: agent_name.to_string(),
                action: action.to_string(),
                details,
                timestamp: now_iso(),
            });
        });
    }

    /// Appends an MCP tool call with its full arguments and result.
    pub fn add_mcp_tool_call(&self, agent_name: &str, tool_name: &str, args: &Value, result: &Value) {
        self.mutate(|doc| {
            doc.mcp_calls.push(McpCallRecord {
                agent_name: agent_name.to_string(),
                tool_name: tool_name.to_string(),
                tool_args: args.clone(),
                tool_result: result.clone(),
                timestamp: now_iso(),
            });
        });
    }

    /// Appends an error entry.
    pub fn add_error(&self, message: &str, agent: Option<&str>) {
        self.mutate(|doc| {
            doc.errors.push(ErrorRecord {
                message: message.to_string(),
                agent: agent.map(String::from),
                timestamp: now_iso(),
            });
        });
    }

    /// Appends a warning entry.
    pub fn add_warning(&self, message: &str, agent: Option<&str>) {
        self.mutate(|doc| {
            doc.warnings.push(ErrorRecord {
                message: message.to_string(),
                agent: agent.map(String::from),
                timestamp: now_iso(),
            });
        });
    }

    /// Stores the final results map.
    pub fn set_final_results(&self, results: Value) {
        self.mutate(|doc| doc.final_results = results);
    }
}

/// Writes the document durably: temp file, then atomic rename with bounded
/// retries, then a direct-overwrite fallback. Failures are logged only.
fn save(path: &Path, doc: &SessionDocument) {
    let payload = match serde_json::to_vec_pretty(doc) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "session document serialization failed");
            return;
        }
    };

    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        uuid::Uuid::new_v4().simple()
    ));
    if let Err(e) = std::fs::write(&tmp_path, &payload) {
        warn!(error = %e, path = %tmp_path.display(), "session temp write failed");
        return;
    }

    for attempt in 0..SAVE_ATTEMPTS {
        match std::fs::rename(&tmp_path, path) {
            Ok(()) => return,
            Err(e) => {
                if attempt + 1 == SAVE_ATTEMPTS {
                    warn!(error = %e, path = %path.display(), "session rename failed, overwriting directly");
                } else {
                    std::thread::sleep(SAVE_RETRY_BASE * (1 << attempt));
                }
            }
        }
    }

    if let Err(e) = std::fs::write(path, &payload) {
        warn!(error = %e, path = %path.display(), "session overwrite failed");
    }
    if tmp_path.exists() {
        let _ = std::fs::remove_file(&tmp_path);
    }
}
