//! `RuleEngine` backed by an external SWI-Prolog process.
//!
//! The process loads the knowledge base plus a small driver and then speaks a
//! line protocol: one request term in, one JSON object out. Requests are
//! serialized; a call abandoned by timeout or cancellation stops the process,
//! since its reply stream can no longer be trusted.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use metarag_core::boundary::CallGuard;
use metarag_core::error::{Error, Result};

use crate::engine::RuleEngine;
use crate::term::{quote_atom, Bindings, Fact, Goal, Term};

const DRIVER: &str = include_str!("../kb/driver.pl");

struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

pub struct SwiplEngine {
    session: Mutex<Option<Session>>,
    guard: CallGuard,
    _driver: tempfile::NamedTempFile,
}

#[derive(Deserialize)]
struct Reply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    solutions: Vec<serde_json::Map<String, serde_json::Value>>,
}

fn json_term(v: &serde_json::Value) -> Term {
    match v {
        serde_json::Value::String(s) => Term::Atom(s.clone()),
        serde_json::Value::Number(n) => n.as_i64().map(Term::Int).or_else(|| n.as_f64().map(Term::Float)).unwrap_or_else(|| Term::Atom(n.to_string())),
        other => Term::Atom(other.to_string()),
    }
}

impl SwiplEngine {
    /// Start `swipl` with `kb_file` consulted.
    pub async fn spawn(swipl: &Path, kb_file: &Path, guard: CallGuard) -> Result<Self> {
        if !kb_file.is_file() {
            return Err(Error::config(format!("knowledge base not found: {}", kb_file.display())));
        }
        let mut driver = tempfile::Builder::new()
            .prefix("metarag-driver-")
            .suffix(".pl")
            .tempfile()
            .map_err(|e| Error::Operation(format!("driver file: {e}")))?;
        driver
            .write_all(DRIVER.as_bytes())
            .map_err(|e| Error::Operation(format!("driver file: {e}")))?;

        let boot = format!(
            "consult({}), consult({}), main",
            quote_atom(&kb_file.to_string_lossy()),
            quote_atom(&driver.path().to_string_lossy())
        );
        let mut child = Command::new(swipl)
            .args(["-q", "-g"])
            .arg(boot)
            .args(["-t", "halt"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::connection(format!("cannot start {}: {e}", swipl.display())))?;
        let stdin = child.stdin.take().ok_or_else(|| Error::connection("swipl stdin unavailable"))?;
        let stdout = child.stdout.take().ok_or_else(|| Error::connection("swipl stdout unavailable"))?;
        tracing::info!(kb = %kb_file.display(), "rule engine process started");

        Ok(Self {
            session: Mutex::new(Some(Session { child, stdin, stdout: BufReader::new(stdout) })),
            guard,
            _driver: driver,
        })
    }

    /// `swipl` from `PATH`, or the given override.
    pub fn resolve_binary(configured: Option<&str>) -> PathBuf {
        configured.filter(|s| !s.is_empty()).map(metarag_core::config::expand_path).unwrap_or_else(|| PathBuf::from("swipl"))
    }

    async fn request(&self, line: String) -> Result<Reply> {
        let exchange = async {
            let mut session = self.session.lock().await;
            let s = session.as_mut().ok_or_else(|| Error::connection("rule engine is not running"))?;
            s.stdin.write_all(line.as_bytes()).await.map_err(|e| Error::connection(format!("rule engine write: {e}")))?;
            s.stdin.write_all(b"\n").await.map_err(|e| Error::connection(format!("rule engine write: {e}")))?;
            s.stdin.flush().await.map_err(|e| Error::connection(format!("rule engine write: {e}")))?;
            let mut reply = String::new();
            let n = s.stdout.read_line(&mut reply).await.map_err(|e| Error::connection(format!("rule engine read: {e}")))?;
            if n == 0 {
                return Err(Error::connection("rule engine exited"));
            }
            serde_json::from_str::<Reply>(&reply).map_err(|e| Error::Operation(format!("rule engine reply: {e}")))
        };
        match self.guard.run("rule engine", exchange).await {
            Err(e @ (Error::Timeout { .. } | Error::Cancelled(_))) => {
                self.stop().await;
                Err(e)
            }
            other => {
                let reply = other?;
                if !reply.ok {
                    return Err(Error::Operation(reply.error.unwrap_or_else(|| "rule engine error".into())));
                }
                Ok(reply)
            }
        }
    }

    /// Terminate the process. Later calls fail with a connection error.
    pub async fn stop(&self) {
        if let Some(mut s) = self.session.lock().await.take() {
            let _ = s.child.start_kill();
            tracing::warn!("rule engine process stopped");
        }
    }
}

#[async_trait]
impl RuleEngine for SwiplEngine {
    async fn assert_facts(&self, facts: &[Fact]) -> Result<()> {
        if facts.is_empty() {
            return Ok(());
        }
        let list: Vec<String> = facts.iter().map(ToString::to_string).collect();
        self.request(format!("assert_all([{}]).", list.join(", "))).await?;
        tracing::debug!(count = facts.len(), "facts asserted");
        Ok(())
    }

    async fn query(&self, goal: &Goal) -> Result<Vec<Bindings>> {
        let reply = self.request(format!("query({goal}).")).await?;
        Ok(reply
            .solutions
            .iter()
            .map(|row| row.iter().map(|(k, v)| (k.clone(), json_term(v))).collect())
            .collect())
    }
}
