//! Run generated programs as child processes

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::RunnerError;
use super::sandbox::{SandboxPolicy, kill_process_group};
use crate::config::RunnerConfig;

/// How long to wait for output pipes to close once the program has ended
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Captured result of one program run
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Standard output, trimmed
    pub stdout: String,

    /// Standard error, trimmed
    pub stderr: String,

    /// Exit code; `None` when killed by a signal or timed out
    pub exit_code: Option<i32>,

    /// How long the run took
    pub duration_ms: u64,

    /// Whether the run was killed for exceeding the timeout
    pub timed_out: bool,
}

impl ExecutionResult {
    /// A run fails when it wrote to stderr, timed out or died from a signal
    pub fn failed(&self) -> bool {
        let failed = self.timed_out || self.exit_code.is_none() || !self.stderr.is_empty();
        debug!(
            failed,
            timed_out = self.timed_out,
            exit_code = ?self.exit_code,
            stderr_len = self.stderr.len(),
            "ExecutionResult::failed: called"
        );
        failed
    }

    /// Text describing the failure, as fed back to the agent
    pub fn error_text(&self) -> String {
        if self.timed_out {
            let mut text = format!("Execution timed out after {}ms and was killed.", self.duration_ms);
            if !self.stderr.is_empty() {
                text.push('\n');
                text.push_str(&self.stderr);
            }
            return text;
        }
        if self.stderr.is_empty() && self.exit_code.is_none() {
            return "Process was killed by a signal (resource limit exceeded?)".to_string();
        }
        self.stderr.clone()
    }
}

/// Writes programs to temporary files and executes them under a sandbox policy
#[derive(Debug, Clone)]
pub struct CodeRunner {
    interpreter: String,
    file_suffix: String,
    temp_dir: Option<PathBuf>,
    policy: SandboxPolicy,
}

impl CodeRunner {
    pub fn new(interpreter: impl Into<String>, file_suffix: impl Into<String>, policy: SandboxPolicy) -> Self {
        Self {
            interpreter: interpreter.into(),
            file_suffix: file_suffix.into(),
            temp_dir: None,
            policy,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        debug!(interpreter = %config.interpreter, "CodeRunner::from_config: called");
        let mut runner = Self::new(
            config.interpreter.clone(),
            config.file_suffix.clone(),
            SandboxPolicy::from_config(&config.sandbox),
        );
        runner.temp_dir = config.temp_dir.clone();
        runner
    }

    /// Create program files under `dir` instead of the system temp directory
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Execute a program and capture its output
    ///
    /// The program file exists only for the duration of this call; it is
    /// removed on every return path.
    pub async fn execute(&self, program: &str, input: &Path, output: &Path) -> Result<ExecutionResult, RunnerError> {
        debug!(interpreter = %self.interpreter, program_len = program.len(), "CodeRunner::execute: called");

        let mut builder = tempfile::Builder::new();
        builder.prefix("va-program-").suffix(&self.file_suffix);
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(RunnerError::TempFile)?;
        file.write_all(program.as_bytes()).map_err(RunnerError::TempFile)?;
        file.flush().map_err(RunnerError::TempFile)?;
        debug!(path = ?file.path(), "CodeRunner::execute: wrote program");

        let scratch = if self.policy.isolate_workdir {
            Some(tempfile::Builder::new().prefix("va-work-").tempdir().map_err(RunnerError::TempFile)?)
        } else {
            None
        };

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &scratch {
            cmd.current_dir(dir.path());
        }
        self.policy.apply(&mut cmd, input, output);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            interpreter: self.interpreter.clone(),
            source,
        })?;
        let pid = child.id();

        // Read the pipes ourselves so output written before a timeout survives the kill
        let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        let (exit_code, timed_out) = match tokio::time::timeout(self.policy.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(?status, "CodeRunner::execute: process exited");
                (status.code(), false)
            }
            Ok(Err(e)) => {
                debug!(error = %e, "CodeRunner::execute: waiting on process failed");
                return Err(RunnerError::Io(e));
            }
            Err(_) => {
                warn!(timeout_ms = self.policy.timeout.as_millis() as u64, "CodeRunner::execute: timed out");
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "CodeRunner::execute: kill after timeout failed");
                }
                (None, true)
            }
        };

        let result = ExecutionResult {
            stdout: collect_pipe(stdout_task).await,
            stderr: collect_pipe(stderr_task).await,
            exit_code,
            duration_ms: start.elapsed().as_millis() as u64,
            timed_out,
        };

        info!(
            exit_code = ?result.exit_code,
            duration_ms = result.duration_ms,
            timed_out = result.timed_out,
            "program finished"
        );
        Ok(result)
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe
        && let Err(e) = pipe.read_to_end(&mut buf).await
    {
        debug!(error = %e, "read_pipe: read failed, keeping partial output");
    }
    buf
}

/// Trimmed pipe contents; gives up when a leftover descendant holds the pipe open
async fn collect_pipe(task: JoinHandle<Vec<u8>>) -> String {
    match tokio::time::timeout(PIPE_DRAIN_TIMEOUT, task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Ok(Err(e)) => {
            debug!(error = %e, "collect_pipe: reader task failed");
            String::new()
        }
        Err(_) => {
            warn!("collect_pipe: pipe still open after the program ended, output dropped");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;
    use serial_test::serial;
    use tempfile::tempdir;

    fn sh_runner(policy: SandboxPolicy) -> CodeRunner {
        CodeRunner::new("sh", ".sh", policy)
    }

    fn no_paths() -> (&'static Path, &'static Path) {
        (Path::new("/in.jpg"), Path::new("/out.jpg"))
    }

    #[tokio::test]
    async fn test_execute_captures_trimmed_stdout() {
        let (input, output) = no_paths();
        let result = sh_runner(SandboxPolicy::default())
            .execute("echo '  hello  '\necho", input, output)
            .await
            .unwrap();

        assert_eq!(result.stdout, "hello");
        assert!(result.stderr.is_empty());
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.failed());
    }

    #[tokio::test]
    async fn test_stderr_means_failure() {
        let (input, output) = no_paths();
        let result = sh_runner(SandboxPolicy::default())
            .execute("echo partial\necho 'Traceback: boom' >&2", input, output)
            .await
            .unwrap();

        assert_eq!(result.stdout, "partial");
        assert_eq!(result.stderr, "Traceback: boom");
        assert!(result.failed());
        assert_eq!(result.error_text(), "Traceback: boom");
    }

    #[tokio::test]
    async fn test_temp_file_removed_after_success_and_failure() {
        let temp = tempdir().unwrap();
        let runner = sh_runner(SandboxPolicy::default()).with_temp_dir(temp.path());
        let (input, output) = no_paths();

        let ok = runner.execute("echo \"$0\"", input, output).await.unwrap();
        assert!(ok.stdout.starts_with(temp.path().to_str().unwrap()));
        assert!(ok.stdout.ends_with(".sh"));
        assert!(!Path::new(&ok.stdout).exists());

        let failed = runner.execute("echo \"$0\" >&2; exit 3", input, output).await.unwrap();
        assert_eq!(failed.exit_code, Some(3));
        assert!(!Path::new(&failed.stderr).exists());

        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_temp_file_removed_when_spawn_fails() {
        let temp = tempdir().unwrap();
        let runner = CodeRunner::new("/nonexistent/interpreter", ".py", SandboxPolicy::default()).with_temp_dir(temp.path());
        let (input, output) = no_paths();

        let err = runner.execute("print(1)", input, output).await.unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_kills_program() {
        let temp = tempdir().unwrap();
        let policy = SandboxPolicy {
            timeout: Duration::from_millis(200),
            ..SandboxPolicy::default()
        };
        let runner = sh_runner(policy).with_temp_dir(temp.path());
        let (input, output) = no_paths();

        let result = runner.execute("sleep 10", input, output).await.unwrap();
        assert!(result.timed_out);
        assert!(result.failed());
        assert!(result.error_text().contains("timed out"));
        assert!(result.duration_ms < 5000);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_media_paths_exported() {
        let result = sh_runner(SandboxPolicy::default())
            .execute(
                "echo \"$VISION_AGENT_INPUT|$VISION_AGENT_OUTPUT\"",
                Path::new("/media/a.jpg"),
                Path::new("/media/out/b.jpg"),
            )
            .await
            .unwrap();

        assert_eq!(result.stdout, "/media/a.jpg|/media/out/b.jpg");
    }

    #[tokio::test]
    async fn test_isolated_workdir() {
        let policy = SandboxPolicy {
            isolate_workdir: true,
            ..SandboxPolicy::default()
        };
        let (input, output) = no_paths();
        let result = sh_runner(policy).execute("pwd", input, output).await.unwrap();

        let cwd = std::env::current_dir().unwrap();
        assert_ne!(Path::new(&result.stdout), cwd.as_path());
        assert!(!Path::new(&result.stdout).exists());
    }

    #[tokio::test]
    #[serial]
    async fn test_env_allow_list() {
        unsafe { std::env::set_var("VA_TEST_SECRET", "hunter2") };
        let policy = SandboxPolicy::from_config(&SandboxConfig {
            inherit_env: false,
            env_allow: vec!["PATH".to_string()],
            ..SandboxConfig::default()
        });
        let (input, output) = no_paths();

        let result = sh_runner(policy)
            .execute("echo \"${VA_TEST_SECRET:-unset}\"", input, output)
            .await
            .unwrap();
        assert_eq!(result.stdout, "unset");

        let inherited = sh_runner(SandboxPolicy::default())
            .execute("echo \"${VA_TEST_SECRET:-unset}\"", input, output)
            .await
            .unwrap();
        assert_eq!(inherited.stdout, "hunter2");

        unsafe { std::env::remove_var("VA_TEST_SECRET") };
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_cpu_limit_kills_busy_loop() {
        let policy = SandboxPolicy {
            timeout: Duration::from_secs(20),
            max_cpu_secs: Some(1),
            ..SandboxPolicy::default()
        };
        let (input, output) = no_paths();

        let result = sh_runner(policy)
            .execute("while :; do :; done", input, output)
            .await
            .unwrap();
        assert!(!result.timed_out);
        assert_eq!(result.exit_code, None);
        assert!(result.failed());
        assert!(result.error_text().contains("signal"));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let policy = SandboxPolicy {
            timeout: Duration::from_millis(500),
            ..SandboxPolicy::default()
        };
        let (input, output) = no_paths();

        let result = sh_runner(policy)
            .execute("echo half-written\necho 'loading model' >&2\nsleep 10", input, output)
            .await
            .unwrap();

        assert!(result.timed_out);
        assert_eq!(result.stdout, "half-written");
        assert_eq!(result.stderr, "loading model");
        let text = result.error_text();
        assert!(text.starts_with("Execution timed out after"));
        assert!(text.ends_with("loading model"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_background_descendants() {
        let temp = tempdir().unwrap();
        let marker = temp.path().join("leaked");
        let policy = SandboxPolicy {
            timeout: Duration::from_millis(300),
            ..SandboxPolicy::default()
        };
        let (input, output) = no_paths();
        let program = format!(
            "(sleep 1; touch '{}') >/dev/null 2>&1 &\nwait",
            marker.display()
        );

        let result = sh_runner(policy).execute(&program, input, output).await.unwrap();
        assert!(result.timed_out);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "background process outlived the timeout");
    }
}
