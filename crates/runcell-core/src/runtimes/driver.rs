//! Line-protocol driver for interpreter subprocesses.
//!
//! Spawns an interpreter carrying an embedded bootstrap program and
//! speaks the execution service's line-delimited JSON protocol over the
//! child's stdio. The interpreter binary resolves as configured override
//! -> primary name -> fallback name; the bootstrap announces progress
//! while starting and then answers one run request per line. The child's
//! own stderr is drained to the debug log so a chatty interpreter can
//! never block the pipe.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use which::which;

use crate::core_types::{LanguageId, RuntimeStatus};
use crate::errors::EngineError;
use crate::protocol::{StatusMessage, WorkerReply, WorkerRequest};
use crate::runtimes::{RuntimeEngine, StatusPublisher};

/// Static description of how to launch one language runtime.
#[derive(Debug, Clone, Copy)]
pub struct DriverSpec {
    pub language: LanguageId,
    /// Preferred interpreter binary.
    pub primary: &'static str,
    /// Tried when the primary is not on PATH.
    pub fallback: &'static str,
    /// Arguments placed before the bootstrap program.
    pub args: &'static [&'static str],
    /// Flag introducing the inline bootstrap program (`-c`, `-e`).
    pub program_flag: &'static str,
    /// Bootstrap program source.
    pub bootstrap: &'static str,
}

/// A context engine backed by a long-lived interpreter subprocess.
pub struct DriverEngine {
    spec: DriverSpec,
    interpreter_override: Option<PathBuf>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr_drain: Option<JoinHandle<()>>,
}

impl DriverEngine {
    pub fn new(spec: DriverSpec, interpreter_override: Option<PathBuf>) -> Self {
        Self {
            spec,
            interpreter_override,
            child: None,
            stdin: None,
            stdout: None,
            stderr_drain: None,
        }
    }

    fn display_name(&self) -> &'static str {
        self.spec.language.display_name()
    }

    /// Resolution order: explicit override, primary binary on PATH,
    /// fallback binary on PATH.
    fn resolve_interpreter(&self, status: &StatusPublisher) -> Result<PathBuf, EngineError> {
        if let Some(path) = &self.interpreter_override {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(EngineError::InterpreterNotFound {
                tried: format!("configured interpreter {}", path.display()),
            });
        }

        status.publish(RuntimeStatus::Loading {
            message: Some(format!("locating {}", self.spec.primary)),
        });
        if let Ok(path) = which(self.spec.primary) {
            return Ok(path);
        }

        status.publish(RuntimeStatus::Loading {
            message: Some(format!(
                "{} not found, falling back to {}",
                self.spec.primary, self.spec.fallback
            )),
        });
        which(self.spec.fallback).map_err(|_| EngineError::InterpreterNotFound {
            tried: format!("{}, {}", self.spec.primary, self.spec.fallback),
        })
    }

    /// Reads bootstrap status lines until the runtime reports ready.
    async fn await_ready(&mut self, status: &StatusPublisher) -> Result<(), EngineError> {
        let name = self.display_name();
        let stdout = self.stdout.as_mut().ok_or(EngineError::Terminated)?;
        let mut line = String::new();
        loop {
            line.clear();
            if stdout.read_line(&mut line).await? == 0 {
                return Err(EngineError::Bootstrap(format!(
                    "{} runtime exited during startup",
                    name
                )));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<StatusMessage>(trimmed) {
                Ok(StatusMessage::Ready) => return Ok(()),
                Ok(StatusMessage::Loading { message }) => {
                    status.publish(RuntimeStatus::Loading { message });
                }
                Ok(StatusMessage::Error { error }) => return Err(EngineError::Bootstrap(error)),
                Err(_) => {
                    // interpreters may chat on stdout before the
                    // bootstrap takes over
                    log::debug!("{} startup line ignored: {}", name, trimmed);
                }
            }
        }
    }

    /// Reads the terminal reply for the current run cycle. Non-JSON lines
    /// are skipped; a JSON line that fails to decode is this cycle's
    /// reply slot and degrades to an empty result rather than waiting
    /// forever.
    async fn read_reply(&mut self) -> Result<WorkerReply, EngineError> {
        let name = self.display_name();
        let stdout = self.stdout.as_mut().ok_or(EngineError::Terminated)?;
        let mut line = String::new();
        loop {
            line.clear();
            if stdout.read_line(&mut line).await? == 0 {
                return Err(EngineError::Terminated);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !trimmed.starts_with('{') {
                log::debug!("{} runtime line ignored: {}", name, trimmed);
                continue;
            }
            match serde_json::from_str::<WorkerReply>(trimmed) {
                Ok(reply) => return Ok(reply),
                Err(err) => {
                    log::warn!(
                        "{} runtime sent a malformed reply ({}); degrading to an empty result",
                        name,
                        err
                    );
                    return Ok(WorkerReply::Result {
                        stdout: String::new(),
                        stderr: String::new(),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl RuntimeEngine for DriverEngine {
    fn language(&self) -> LanguageId {
        self.spec.language
    }

    async fn initialize(&mut self, status: &StatusPublisher) -> Result<(), EngineError> {
        let interpreter = self.resolve_interpreter(status)?;
        log::info!(
            "Starting {} runtime: {}",
            self.display_name(),
            interpreter.display()
        );
        status.publish(RuntimeStatus::Loading {
            message: Some(format!("starting {}", interpreter.display())),
        });

        let mut child = Command::new(&interpreter)
            .args(self.spec.args)
            .arg(self.spec.program_flag)
            .arg(self.spec.bootstrap)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::SpawnFailed {
                command: interpreter.display().to_string(),
                message: e.to_string(),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Protocol("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Protocol("child stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Protocol("child stderr unavailable".to_string()))?;

        let name = self.display_name();
        self.stderr_drain = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::debug!("{} interpreter stderr: {}", name, line);
            }
        }));

        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout));
        self.child = Some(child);

        self.await_ready(status).await
    }

    async fn execute(&mut self, code: &str, stdin_text: &str) -> Result<WorkerReply, EngineError> {
        let request = WorkerRequest::Run {
            code: code.to_string(),
            stdin: stdin_text.to_string(),
        };
        let mut line = serde_json::to_string(&request)
            .map_err(|e| EngineError::Protocol(e.to_string()))?;
        line.push('\n');

        let stdin = self.stdin.as_mut().ok_or(EngineError::Terminated)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        self.read_reply().await
    }

    async fn shutdown(&mut self) {
        // closing stdin lets the bootstrap loop exit on its own
        self.stdin.take();
        if let Some(drain) = self.stderr_drain.take() {
            drain.abort();
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
    }
}
