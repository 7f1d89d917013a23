//! Interpreter runs inside a shared scratch directory.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use capability_primitives::CodeLanguage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifacts::{self, Artifact, ResolvedArtifact};
use crate::error::{RunnerError, RunnerResult};

/// Default scratch directory shared by every run.
pub const DEFAULT_SCRATCH_DIR: &str = "/tmp/code-executor";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Output of a successful run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Every file in the scratch directory after the run.
    pub files: Vec<Artifact>,
    /// Completion time of the run.
    pub execution_time: DateTime<Utc>,
}

/// Runs Python and Node.js snippets as child processes.
///
/// Each run writes its source to a uniquely named file in the scratch
/// directory and passes that path to the interpreter as a separate argument.
/// The directory is never cleaned, so artifact listings accumulate across
/// runs.
#[derive(Clone, Debug)]
pub struct CodeRunner {
    scratch_dir: PathBuf,
    timeout: Duration,
    interpreters: HashMap<CodeLanguage, OsString>,
}

impl Default for CodeRunner {
    fn default() -> Self {
        Self::new(DEFAULT_SCRATCH_DIR)
    }
}

impl CodeRunner {
    /// Creates a runner over `scratch_dir` with a 30 second budget.
    #[must_use]
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            timeout: DEFAULT_TIMEOUT,
            interpreters: HashMap::new(),
        }
    }

    /// Sets the wall-clock budget of a run.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the interpreter program for a language.
    #[must_use]
    pub fn with_interpreter(mut self, language: CodeLanguage, program: impl Into<OsString>) -> Self {
        self.interpreters.insert(language, program.into());
        self
    }

    /// Scratch directory.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Wall-clock budget of a run.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Interpreter program used for a language.
    #[must_use]
    pub fn interpreter(&self, language: CodeLanguage) -> OsString {
        self.interpreters
            .get(&language)
            .cloned()
            .unwrap_or_else(|| OsString::from(language.interpreter()))
    }

    /// Runs `code` with the interpreter of `language`.
    ///
    /// # Errors
    ///
    /// - [`RunnerError::Timeout`] when the budget elapses; the child is
    ///   killed and the standard error read so far is kept.
    /// - [`RunnerError::NonZeroExit`] when the interpreter fails.
    /// - [`RunnerError::Spawn`] when the interpreter cannot be started.
    /// - [`RunnerError::Io`] when the source file cannot be written. A
    ///   failed artifact scan after a successful exit only empties `files`.
    pub async fn run(&self, language: CodeLanguage, code: &str) -> RunnerResult<ExecutionOutput> {
        fs::create_dir_all(&self.scratch_dir).await?;
        let file_name = format!("{}_{}{}", language.as_str(), Uuid::new_v4().simple(), language.extension());
        let source = self.scratch_dir.join(&file_name);
        fs::write(&source, code).await?;

        let interpreter = self.interpreter(language);
        info!(language = %language.as_str(), file = %file_name, "running code");

        let mut child = Command::new(&interpreter)
            .arg(&source)
            .current_dir(&self.scratch_dir)
            .env("PYTHONUNBUFFERED", "1")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                interpreter: interpreter.to_string_lossy().into_owned(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "failed to kill timed out interpreter");
                }
                let stderr = collect(stderr).await;
                warn!(language = %language.as_str(), timeout_secs = self.timeout.as_secs(), "code run timed out");
                return Err(RunnerError::Timeout {
                    language: language.as_str().to_owned(),
                    timeout: self.timeout,
                    stderr,
                });
            }
        };

        let stdout = collect(stdout).await;
        let stderr = collect(stderr).await;
        check_status(language, status, stderr.clone())?;

        let files = match artifacts::list(&self.scratch_dir).await {
            Ok(files) => {
                debug!(count = files.len(), "scratch directory scanned");
                files
            }
            Err(err) => {
                warn!(error = %err, "scratch directory scan failed");
                Vec::new()
            }
        };
        info!(language = %language.as_str(), "code run finished");

        Ok(ExecutionOutput {
            stdout,
            stderr,
            files,
            execution_time: Utc::now(),
        })
    }

    /// Every file in the scratch directory, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Io`] when the directory cannot be read.
    pub async fn list_artifacts(&self) -> RunnerResult<Vec<Artifact>> {
        artifacts::list(&self.scratch_dir).await
    }

    /// Resolves a percent-encoded artifact name to a file in the scratch
    /// directory.
    ///
    /// # Errors
    ///
    /// - [`RunnerError::InvalidArtifactName`] for names with separators or
    ///   parent references.
    /// - [`RunnerError::ArtifactNotFound`] when no such file exists.
    pub async fn resolve_artifact(&self, name: &str) -> RunnerResult<ResolvedArtifact> {
        artifacts::resolve(&self.scratch_dir, name).await
    }
}

fn check_status(language: CodeLanguage, status: ExitStatus, stderr: String) -> RunnerResult<()> {
    if status.success() {
        return Ok(());
    }
    warn!(language = %language.as_str(), code = ?status.code(), "interpreter exited unsuccessfully");
    Err(RunnerError::NonZeroExit {
        language: language.as_str().to_owned(),
        code: status.code(),
        stderr,
    })
}

fn drain<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pipe.map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(err) = pipe.read_to_end(&mut buf).await {
                debug!(error = %err, "pipe read ended early");
            }
            buf
        })
    })
}

async fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(handle) = handle else {
        return String::new();
    };
    match timeout(DRAIN_GRACE, handle).await {
        Ok(Ok(buf)) => String::from_utf8_lossy(&buf).into_owned(),
        Ok(Err(err)) => {
            warn!(error = %err, "pipe reader task failed");
            String::new()
        }
        Err(_) => {
            warn!("pipe still open after the interpreter exited");
            String::new()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use tempfile::TempDir;

    /// Runs "python" snippets through `sh` so tests need no interpreter.
    fn shell_runner(dir: &TempDir) -> CodeRunner {
        CodeRunner::new(dir.path().join("scratch"))
            .with_interpreter(CodeLanguage::Python, "sh")
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn captures_output_and_created_files() {
        let dir = TempDir::new().unwrap();
        let runner = shell_runner(&dir);

        let output = runner
            .run(CodeLanguage::Python, "echo hello\necho warn >&2\necho data > result.txt\n")
            .await
            .unwrap();

        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "warn\n");
        let result = output.files.iter().find(|f| f.name == "result.txt").unwrap();
        assert_eq!(result.size, 5);
        assert_eq!(result.download_url, "/download/result.txt");
        assert!(output.files.iter().any(|f| f.name.starts_with("python_") && f.name.ends_with(".py")));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let runner = shell_runner(&dir);

        let err = runner
            .run(CodeLanguage::Python, "echo boom >&2\nexit 3\n")
            .await
            .unwrap_err();
        match err {
            RunnerError::NonZeroExit { code, ref stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn timeout_kills_the_child_and_keeps_stderr() {
        let dir = TempDir::new().unwrap();
        let runner = shell_runner(&dir).with_timeout(Duration::from_millis(300));

        let err = runner
            .run(CodeLanguage::Python, "echo started >&2\nexec sleep 10\n")
            .await
            .unwrap_err();
        match err {
            RunnerError::Timeout { ref stderr, .. } => assert_eq!(stderr, "started\n"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_spawn_error() {
        let dir = TempDir::new().unwrap();
        let runner = CodeRunner::new(dir.path())
            .with_interpreter(CodeLanguage::Nodejs, "definitely-not-an-interpreter");

        let err = runner.run(CodeLanguage::Nodejs, "1").await.unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }

    #[tokio::test]
    async fn artifacts_accumulate_across_runs() {
        let dir = TempDir::new().unwrap();
        let runner = shell_runner(&dir);

        runner.run(CodeLanguage::Python, "echo a > first.txt").await.unwrap();
        runner.run(CodeLanguage::Python, "echo b > second.txt").await.unwrap();

        let names: Vec<String> = runner
            .list_artifacts()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert!(names.contains(&"first.txt".to_owned()));
        assert!(names.contains(&"second.txt".to_owned()));

        let resolved = runner.resolve_artifact("first.txt").await.unwrap();
        assert_eq!(resolved.content_type, "text/plain");
    }

    #[tokio::test]
    async fn unreadable_scratch_dir_after_exit_keeps_the_output() {
        let dir = TempDir::new().unwrap();
        let runner = shell_runner(&dir);

        let output = runner
            .run(CodeLanguage::Python, "echo done\ncd ..\nrm -rf scratch\necho x > scratch\n")
            .await
            .unwrap();

        assert_eq!(output.stdout, "done\n");
        assert!(output.files.is_empty());
    }

    #[test]
    fn default_interpreters() {
        let runner = CodeRunner::default();
        assert_eq!(runner.interpreter(CodeLanguage::Python), "python3");
        assert_eq!(runner.interpreter(CodeLanguage::Nodejs), "node");
        assert_eq!(runner.scratch_dir(), Path::new(DEFAULT_SCRATCH_DIR));
    }
}
