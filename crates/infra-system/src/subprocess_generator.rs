// Subprocess generator
// Runs the external content generator as a child process speaking JSON lines
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info, warn};

use quizgen_core::domain::GeneratedItem;
use quizgen_core::port::{
    CancellationToken, GenerationError, GenerationRequest, Generator, ProgressReporter,
};

/// Grace period between SIGTERM and SIGKILL when a call is abandoned
const GRACEFUL_KILL_TIMEOUT: Duration = Duration::from_secs(2);

/// Environment variables passed through to the generator by default
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "USER", "LANG", "TMPDIR"];

/// How to launch the generator command
#[derive(Debug, Clone)]
pub struct SubprocessGeneratorConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Only these variables of the daemon environment reach the child
    pub env_allowlist: Vec<String>,
    /// Per-call limit; `None` waits indefinitely
    pub timeout: Option<Duration>,
    pub working_dir: Option<PathBuf>,
}

impl SubprocessGeneratorConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env_allowlist: DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
            timeout: None,
            working_dir: None,
        }
    }
}

/// One line the generator writes to stdout
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum GeneratorEvent {
    Progress {
        percent: u8,
        #[serde(default)]
        label: String,
    },
    Items {
        items: Vec<GeneratedItem>,
    },
    Error {
        message: String,
    },
}

/// Why the output loop stopped
enum Outcome {
    Finished,
    Cancelled,
    TimedOut,
    ReadFailed(String),
}

/// Generator backed by an external command
///
/// Protocol: the request is written to stdin as one JSON document, then
/// stdin is closed. The child answers with JSON-lines events on stdout:
/// `progress`, `items` (may repeat, concatenated) and `error`.
pub struct SubprocessGenerator {
    config: SubprocessGeneratorConfig,
}

impl SubprocessGenerator {
    /// Create a new subprocess generator
    ///
    /// # Example
    /// ```ignore
    /// let mut config = SubprocessGeneratorConfig::new("quizgen-generator");
    /// config.timeout = Some(Duration::from_secs(300));
    /// let generator = SubprocessGenerator::new(config);
    /// ```
    pub fn new(config: SubprocessGeneratorConfig) -> Self {
        Self { config }
    }

    /// Filter environment variables to allowlist only
    fn filter_env<I>(&self, env: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        env.into_iter()
            .filter(|(k, _)| self.config.env_allowlist.contains(k))
            .collect()
    }

    fn spawn(&self) -> Result<Child, GenerationError> {
        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .env_clear()
            .envs(self.filter_env(std::env::vars()))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        command.spawn().map_err(|e| {
            GenerationError::Failed(format!(
                "failed to start generator {}: {}",
                self.config.command, e
            ))
        })
    }

    fn encode_request(request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        let mut payload = serde_json::to_vec(request)
            .map_err(|e| GenerationError::Failed(format!("failed to encode request: {}", e)))?;
        payload.push(b'\n');
        Ok(payload)
    }

    /// Write the request, then close stdin by dropping it
    async fn write_request(mut stdin: ChildStdin, payload: Vec<u8>) {
        // A child that ignores its input may close stdin before we finish
        if let Err(e) = stdin.write_all(&payload).await {
            debug!(error = %e, "Generator closed stdin early");
        }
    }

    /// SIGTERM first, then SIGKILL if the child lingers
    async fn terminate(child: &mut Child) {
        if send_sigterm(child) {
            match tokio::time::timeout(GRACEFUL_KILL_TIMEOUT, child.wait()).await {
                Ok(Ok(_)) => return,
                _ => warn!(pid = ?child.id(), "Generator did not exit after SIGTERM, sending SIGKILL"),
            }
        }
        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill generator process");
        }
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok(),
        None => false,
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}

#[async_trait]
impl Generator for SubprocessGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Vec<GeneratedItem>, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        info!(
            command = %self.config.command,
            target = %request.target.label(),
            count = request.count,
            "Starting generator process"
        );

        let payload = Self::encode_request(request)?;
        let mut child = self.spawn()?;
        // Written concurrently so a child that never reads stdin cannot stall cancel or timeout
        let stdin_task = child
            .stdin
            .take()
            .map(|stdin| tokio::spawn(Self::write_request(stdin, payload)));

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GenerationError::Failed("generator stdout unavailable".to_string()))?;
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        let limit = self.config.timeout;
        let deadline = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut lines = BufReader::new(stdout).lines();
        let mut items: Vec<GeneratedItem> = Vec::new();
        let mut reported_error: Option<String> = None;
        let mut last_percent = 0u8;

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Outcome::Cancelled,
                _ = &mut deadline => break Outcome::TimedOut,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => match serde_json::from_str::<GeneratorEvent>(&line) {
                        Ok(GeneratorEvent::Progress { percent, label }) => {
                            last_percent = percent.min(100).max(last_percent);
                            progress.report(last_percent, &label).await;
                        }
                        Ok(GeneratorEvent::Items { items: batch }) => items.extend(batch),
                        Ok(GeneratorEvent::Error { message }) => reported_error = Some(message),
                        Err(_) => debug!(line = %line, "Ignoring non-event generator output"),
                    },
                    Ok(None) => break Outcome::Finished,
                    Err(e) => break Outcome::ReadFailed(format!("failed to read generator output: {}", e)),
                }
            }
        };

        if let Some(task) = &stdin_task {
            task.abort();
        }

        match outcome {
            Outcome::Finished => {}
            Outcome::Cancelled => {
                Self::terminate(&mut child).await;
                info!(command = %self.config.command, "Generator process stopped on cancellation");
                return Err(GenerationError::Cancelled);
            }
            Outcome::TimedOut => {
                Self::terminate(&mut child).await;
                let secs = limit.map(|d| d.as_secs_f64()).unwrap_or_default();
                warn!(command = %self.config.command, timeout_secs = secs, "Generator timed out");
                return Err(GenerationError::Failed(format!(
                    "generator timed out after {}s",
                    secs
                )));
            }
            Outcome::ReadFailed(message) => {
                Self::terminate(&mut child).await;
                return Err(GenerationError::Failed(message));
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| GenerationError::Failed(format!("failed to wait for generator: {}", e)))?;
        let stderr = stderr_task.await.unwrap_or_default();

        info!(
            command = %self.config.command,
            exit_code = ?status.code(),
            items = items.len(),
            "Generator process finished"
        );

        if let Some(message) = reported_error {
            return Err(GenerationError::Failed(message));
        }
        if !status.success() {
            let stderr = stderr.trim();
            return Err(GenerationError::Failed(if stderr.is_empty() {
                format!("generator exited with {}", status)
            } else {
                format!("generator exited with {}: {}", status, stderr)
            }));
        }

        Ok(items)
    }
}
