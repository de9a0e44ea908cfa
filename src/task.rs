//! External task adapter: run an out-of-process download/convert tool and
//! report a single classified outcome.
//!
//! The caller gets a [`Completion`] that resolves exactly once. Diagnostic
//! output is logged here; callers only see [`TaskOutput`] or [`TaskError`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::{oneshot, Semaphore};

/// Prefix the download tool uses for fatal diagnostics on stderr.
const ERROR_LINE_PREFIX: &str = "ERROR:";

/// Temporary files the tool leaves next to the artifact while working.
const PARTIAL_SUFFIXES: &[&str] = &["part", "ytdl", "temp"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("failed to start {0}")]
    Spawn(String),

    #[error("{0}")]
    Failed(String),

    /// The upstream resource is gone (removed, private, HTTP 410).
    #[error("resource unavailable: {0}")]
    Unavailable(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("no artifact produced at {0}")]
    MissingArtifact(PathBuf),

    #[error("task aborted")]
    Aborted,
}

/// What to extract from a media URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    fn label(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// One invocation of an external tool.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub program: String,
    pub args: Vec<String>,
    /// Artifact path without extension; the tool picks the extension.
    pub output_target: PathBuf,
}

impl TaskDescriptor {
    pub fn new(program: impl Into<String>, args: Vec<String>, output_target: PathBuf) -> Self {
        Self {
            program: program.into(),
            args,
            output_target,
        }
    }

    /// A `yt-dlp` style download of `url` into `output_dir`. Each descriptor
    /// gets a fresh ULID-based name so concurrent downloads never collide.
    pub fn media(tool: &str, kind: MediaKind, url: &str, output_dir: &Path) -> Self {
        let name = format!("{}-{}", kind.label(), ulid::Ulid::new().to_string().to_lowercase());
        let output_target = output_dir.join(name);
        let template = format!("{}.%(ext)s", output_target.display());

        let mut args: Vec<String> = vec!["--no-playlist".into(), "--no-progress".into()];
        match kind {
            MediaKind::Audio => {
                args.extend(["-x", "--audio-format", "mp3"].map(String::from));
            }
            MediaKind::Video => {
                args.extend(
                    ["-f", "bestvideo+bestaudio/best", "--merge-output-format", "mp4"]
                        .map(String::from),
                );
            }
        }
        args.extend(["-o".to_string(), template, "--".to_string(), url.to_string()]);

        Self::new(tool, args, output_target)
    }
}

/// Successful task result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub artifact: PathBuf,
}

pub type TaskResult = Result<TaskOutput, TaskError>;

/// Pending outcome of a spawned task. Awaiting consumes it.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<TaskResult>,
}

impl Completion {
    pub async fn wait(self) -> TaskResult {
        // The sender only disappears without a value if the worker panicked.
        self.rx.await.unwrap_or(Err(TaskError::Aborted))
    }
}

/// Spawns external tasks, optionally bounding how many run at once.
#[derive(Clone)]
pub struct TaskRunner {
    limit: Option<Arc<Semaphore>>,
    timeout: Duration,
}

impl TaskRunner {
    /// `max_concurrent == 0` leaves concurrency unbounded. Values above
    /// [`Semaphore::MAX_PERMITS`] are clamped.
    pub fn new(max_concurrent: usize, timeout: Duration) -> Self {
        let permits = max_concurrent.min(Semaphore::MAX_PERMITS);
        Self {
            limit: (permits > 0).then(|| Arc::new(Semaphore::new(permits))),
            timeout,
        }
    }

    /// Start `descriptor` in the background. Queues behind the concurrency
    /// bound if one is set; the timeout only covers the run itself.
    pub fn spawn(&self, descriptor: TaskDescriptor) -> Completion {
        let (tx, rx) = oneshot::channel();
        let limit = self.limit.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let _permit = match limit {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        let _ = tx.send(Err(TaskError::Aborted));
                        return;
                    }
                },
                None => None,
            };

            let result = run(&descriptor, timeout).await;
            match &result {
                Ok(output) => tracing::info!(
                    program = %descriptor.program,
                    artifact = %output.artifact.display(),
                    "External task completed"
                ),
                Err(e) => tracing::warn!(program = %descriptor.program, "External task failed: {}", e),
            }
            if tx.send(result).is_err() {
                tracing::debug!("Task completion dropped before delivery");
            }
        });

        Completion { rx }
    }
}

async fn run(descriptor: &TaskDescriptor, timeout: Duration) -> TaskResult {
    if let Some(parent) = descriptor.output_target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TaskError::Spawn(format!("{}: {}", parent.display(), e)))?;
    }

    let child = Command::new(&descriptor.program)
        .args(&descriptor.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TaskError::Spawn(format!("{}: {}", descriptor.program, e)))?;

    tracing::debug!(program = %descriptor.program, args = ?descriptor.args, "Spawned external task");

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(TaskError::Spawn(format!("{}: {}", descriptor.program, e))),
        Err(_) => return Err(TaskError::TimedOut(timeout)),
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    tracing::debug!(
        program = %descriptor.program,
        status = ?output.status.code(),
        stdout = %String::from_utf8_lossy(&output.stdout).trim(),
        stderr = %stderr.trim(),
        "External task exited"
    );

    let error_lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(ERROR_LINE_PREFIX))
        .collect();

    if !output.status.success() || !error_lines.is_empty() {
        let detail = if !error_lines.is_empty() {
            error_lines.join("\n")
        } else {
            stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("exited with {}", output.status))
        };
        return Err(classify_failure(detail, &stderr));
    }

    find_artifact(&descriptor.output_target)
        .map(|artifact| TaskOutput { artifact })
        .ok_or_else(|| TaskError::MissingArtifact(descriptor.output_target.clone()))
}

fn classify_failure(detail: String, diagnostics: &str) -> TaskError {
    let d = diagnostics.to_lowercase();
    let gone = [
        "video unavailable",
        "no longer available",
        "has been removed",
        "private video",
        "http error 410",
    ];
    if gone.iter().any(|needle| d.contains(needle)) {
        TaskError::Unavailable(detail)
    } else {
        TaskError::Failed(detail)
    }
}

/// The finished file at `{target}.<ext>`, ignoring partial downloads.
fn find_artifact(target: &Path) -> Option<PathBuf> {
    let pattern = format!("{}.*", glob::Pattern::escape(&target.to_string_lossy()));
    let paths = glob::glob(&pattern).ok()?;

    paths.filter_map(Result::ok).find(|path| {
        let partial = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| PARTIAL_SUFFIXES.contains(&ext));
        path.is_file() && !partial
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// `sh -c script` with the output target as `$1`.
    fn shell(script: &str, target: PathBuf) -> TaskDescriptor {
        let args = vec![
            "-c".to_string(),
            script.to_string(),
            "sh".to_string(),
            target.display().to_string(),
        ];
        TaskDescriptor::new("sh", args, target)
    }

    fn runner() -> TaskRunner {
        TaskRunner::new(0, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_success_reports_artifact() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("audio-1");
        let script = r#"echo "WARNING: throttled" >&2; printf data > "$1.mp3.part"; printf data > "$1.mp3""#;

        let output = runner().spawn(shell(script, target.clone())).wait().await.unwrap();
        assert_eq!(output.artifact, dir.path().join("audio-1.mp3"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let dir = TempDir::new().unwrap();
        let script = r#"echo "ERROR: unable to download webpage" >&2; exit 1"#;

        let result = runner().spawn(shell(script, dir.path().join("x"))).wait().await;
        assert_eq!(
            result,
            Err(TaskError::Failed("ERROR: unable to download webpage".to_string()))
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_without_diagnostics() {
        let dir = TempDir::new().unwrap();
        let result = runner().spawn(shell("exit 3", dir.path().join("x"))).wait().await;
        assert!(matches!(result, Err(TaskError::Failed(msg)) if msg.contains("exit")));
    }

    #[tokio::test]
    async fn test_error_stream_fails_despite_zero_exit() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("video-1");
        let script = r#"echo "ERROR: [youtube] abc: Video unavailable" >&2; touch "$1.mp4""#;

        let result = runner().spawn(shell(script, target)).wait().await;
        assert!(matches!(result, Err(TaskError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("audio-2");
        let result = runner().spawn(shell("exit 0", target.clone())).wait().await;
        assert_eq!(result, Err(TaskError::MissingArtifact(target)));
    }

    #[tokio::test]
    async fn test_timeout_kills_task() {
        let dir = TempDir::new().unwrap();
        let runner = TaskRunner::new(0, Duration::from_millis(200));
        let target = dir.path().join("slow");

        let result = runner.spawn(shell(r#"sleep 5; touch "$1.mp3""#, target)).wait().await;
        assert_eq!(result, Err(TaskError::TimedOut(Duration::from_millis(200))));
        assert_eq!(
            result.unwrap_err().to_string(),
            "timed out after 200ms"
        );
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let descriptor = TaskDescriptor::new("/nonexistent/yt-dlp", vec![], dir.path().join("x"));
        let result = runner().spawn(descriptor).wait().await;
        assert!(matches!(result, Err(TaskError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_oversized_bound_is_clamped() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("audio-3");
        let runner = TaskRunner::new(usize::MAX, Duration::from_secs(10));

        let output = runner
            .spawn(shell(r#"touch "$1.mp3""#, target))
            .wait()
            .await
            .unwrap();
        assert_eq!(output.artifact, dir.path().join("audio-3.mp3"));
    }

    #[tokio::test]
    async fn test_bounded_runner_completes_all_tasks() {
        let dir = TempDir::new().unwrap();
        let runner = TaskRunner::new(1, Duration::from_secs(10));

        let completions: Vec<_> = (0..3)
            .map(|i| {
                let target = dir.path().join(format!("t{}", i));
                runner.spawn(shell(r#"sleep 0.1; touch "$1.mp3""#, target))
            })
            .collect();

        for completion in completions {
            assert!(completion.wait().await.is_ok());
        }
    }

    #[test]
    fn test_media_descriptors_are_unique() {
        let dir = Path::new("/tmp/wabot");
        let a = TaskDescriptor::media("yt-dlp", MediaKind::Audio, "https://youtu.be/x", dir);
        let b = TaskDescriptor::media("yt-dlp", MediaKind::Audio, "https://youtu.be/x", dir);

        assert_ne!(a.output_target, b.output_target);
        assert!(a.output_target.starts_with(dir));
        assert!(a.args.contains(&"-x".to_string()));
        assert_eq!(a.args.last().map(String::as_str), Some("https://youtu.be/x"));

        let v = TaskDescriptor::media("yt-dlp", MediaKind::Video, "https://youtu.be/x", dir);
        assert!(v.args.contains(&"bestvideo+bestaudio/best".to_string()));
        assert!(v
            .output_target
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("video-")));
    }
}
