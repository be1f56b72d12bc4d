//! Listing changed paths between two revisions.
//!
//! [`GitCli`] shells out to `git diff --name-status -z` and parses the
//! NUL-separated records with [`parse_name_status`]. Anything that can
//! supply the same records implements [`ChangeSource`].

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use error_set::error_set;
use nom::bytes::complete::take_until;
use nom::character::complete::{char, digit0, satisfy};
use nom::combinator::{all_consuming, map_opt};
use nom::multi::many0;
use nom::sequence::terminated;
use nom::{IResult, Parser};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

error_set! {
    /// Errors from obtaining the list of changed paths
    DiffExecutionError := {
        #[display("Failed to run git diff in {repo}: {message}")]
        SpawnFailed { repo: String, message: String },
        #[display("Failed while waiting for git diff {from_ref} {to_ref}: {message}")]
        WaitFailed { from_ref: String, to_ref: String, message: String },
        #[display("git diff {from_ref} {to_ref} failed: {stderr}")]
        ExitError { from_ref: String, to_ref: String, stderr: String },
        #[display("git diff {from_ref} {to_ref} timed out after {millis}ms")]
        Timeout { from_ref: String, to_ref: String, millis: u128 },
        #[display("Malformed git diff output near '{near}'")]
        MalformedOutput { near: String },
    }
}

/// Change status letter from `git diff --name-status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Copied,
    Deleted,
    Modified,
    Renamed,
    TypeChanged,
    Unmerged,
    Unknown,
}

impl ChangeStatus {
    fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'A' => ChangeStatus::Added,
            'C' => ChangeStatus::Copied,
            'D' => ChangeStatus::Deleted,
            'M' => ChangeStatus::Modified,
            'R' => ChangeStatus::Renamed,
            'T' => ChangeStatus::TypeChanged,
            'U' => ChangeStatus::Unmerged,
            'X' => ChangeStatus::Unknown,
            _ => return None,
        })
    }

    /// Whether the path no longer exists at the target revision
    #[must_use]
    pub fn is_deletion(self) -> bool {
        self == ChangeStatus::Deleted
    }
}

/// A changed path, relative to the repository root, with its status.
///
/// For renames and copies `path` is the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    pub status: ChangeStatus,
    pub path: String,
}

impl ChangedPath {
    pub fn new(status: ChangeStatus, path: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
        }
    }
}

/// Supplies the paths that changed between two revisions
pub trait ChangeSource {
    /// List every path that differs between `from` and `to`.
    ///
    /// # Errors
    ///
    /// Returns [`DiffExecutionError`] if the listing cannot be produced.
    fn changed_paths(&self, from: &str, to: &str) -> Result<Vec<ChangedPath>, DiffExecutionError>;
}

/// [`ChangeSource`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
    timeout: Option<Duration>,
}

impl GitCli {
    /// Create a source for the repository at `repo_path`
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            timeout: None,
        }
    }

    /// Kill `git diff` if it has not finished within `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Run `git diff --name-status -z` and return its raw stdout
    fn name_status(&self, from: &str, to: &str) -> Result<Vec<u8>, DiffExecutionError> {
        let mut child = Command::new("git")
            .arg("-C")
            .arg(&self.repo_path)
            .args([
                "-c",
                "core.quotepath=off",
                "diff",
                "--name-status",
                "-z",
                "--no-renames",
                "--no-ext-diff",
                "--no-color",
                "--ignore-space-at-eol",
                "--ignore-space-change",
                "--ignore-all-space",
                "--end-of-options",
                from,
                to,
                "--",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DiffExecutionError::SpawnFailed {
                repo: self.repo_path.display().to_string(),
                message: e.to_string(),
            })?;

        let wait_failed = |message: String| DiffExecutionError::WaitFailed {
            from_ref: from.to_string(),
            to_ref: to.to_string(),
            message,
        };

        // Drain both pipes while waiting so a large diff cannot block git on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.timeout {
            None => child.wait().map_err(|e| wait_failed(e.to_string()))?,
            Some(timeout) => match wait_with_deadline(&mut child, timeout) {
                Ok(Some(status)) => status,
                Ok(None) => {
                    tracing::warn!(from, to, ?timeout, "git diff timed out");
                    return Err(DiffExecutionError::Timeout {
                        from_ref: from.to_string(),
                        to_ref: to.to_string(),
                        millis: timeout.as_millis(),
                    });
                }
                Err(e) => return Err(wait_failed(e.to_string())),
            },
        };

        let stdout = join(stdout).map_err(wait_failed)?;
        let stderr = join(stderr).map_err(wait_failed)?;
        check_status(status, from, to, &stderr)?;
        Ok(stdout)
    }
}

/// Wait for `child` to exit, killing and reaping it once `timeout` has passed.
///
/// Returns `Ok(None)` when the child was killed. A timeout too large to
/// express as a deadline waits without one.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let Some(deadline) = Instant::now().checked_add(timeout) else {
        return child.wait().map(Some);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            // The child may exit between the check and the kill.
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

type Drain = Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Drain {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf).map(|_| buf)
        })
    })
}

fn join(handle: Drain) -> Result<Vec<u8>, String> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| "output reader panicked".to_string())?
            .map_err(|e| e.to_string()),
    }
}

fn check_status(
    status: ExitStatus,
    from: &str,
    to: &str,
    stderr: &[u8],
) -> Result<(), DiffExecutionError> {
    if status.success() {
        return Ok(());
    }
    Err(DiffExecutionError::ExitError {
        from_ref: from.to_string(),
        to_ref: to.to_string(),
        stderr: String::from_utf8_lossy(stderr).trim().to_string(),
    })
}

impl ChangeSource for GitCli {
    fn changed_paths(&self, from: &str, to: &str) -> Result<Vec<ChangedPath>, DiffExecutionError> {
        let output = self.name_status(from, to)?;
        let changes = parse_name_status(&output)?;
        tracing::debug!(from, to, count = changes.len(), "listed changed paths");
        Ok(changes)
    }
}

/// Status letter, ignoring the similarity score of renames and copies
fn status(input: &[u8]) -> IResult<&[u8], ChangeStatus> {
    map_opt(
        terminated(satisfy(|c| c.is_ascii_uppercase()), digit0),
        ChangeStatus::from_code,
    )
    .parse(input)
}

fn nul_terminated(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_until(&b"\0"[..]), char('\0')).parse(input)
}

fn record(input: &[u8]) -> IResult<&[u8], (ChangeStatus, &[u8])> {
    let (input, status) = terminated(status, char('\0')).parse(input)?;
    let (input, mut path) = nul_terminated(input)?;
    let input = match status {
        ChangeStatus::Renamed | ChangeStatus::Copied => {
            let (input, destination) = nul_terminated(input)?;
            path = destination;
            input
        }
        _ => input,
    };
    Ok((input, (status, path)))
}

/// Parse `git diff --name-status -z` output.
///
/// Git passes paths through as raw bytes. Records whose path is not valid
/// UTF-8 are skipped with a warning; they can never name a metadata member.
///
/// # Examples
/// ```
/// use sfpkg::git::{parse_name_status, ChangeStatus};
///
/// let changes = parse_name_status(b"M\0a.cls\0A\0b\xff.txt\0R090\0old.cls\0new.cls\0").unwrap();
/// assert_eq!(changes.len(), 2);
/// assert_eq!(changes[0].status, ChangeStatus::Modified);
/// assert_eq!(changes[1].path, "new.cls");
/// ```
///
/// # Errors
///
/// Returns [`DiffExecutionError::MalformedOutput`] if a record is truncated
/// or carries an unknown status.
pub fn parse_name_status(output: impl AsRef<[u8]>) -> Result<Vec<ChangedPath>, DiffExecutionError> {
    let (_, records) = all_consuming(many0(record))
        .parse(output.as_ref())
        .map_err(|e| {
            let near = match e {
                nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
                nom::Err::Incomplete(_) => &[][..],
            };
            DiffExecutionError::MalformedOutput {
                near: String::from_utf8_lossy(&near[..near.len().min(40)]).replace('\0', "\\0"),
            }
        })?;

    Ok(records
        .into_iter()
        .filter_map(|(status, path)| match std::str::from_utf8(path) {
            Ok(path) => Some(ChangedPath::new(status, path)),
            Err(_) => {
                tracing::warn!(path = %String::from_utf8_lossy(path), "skipping path that is not valid UTF-8");
                None
            }
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn parse_empty_output() {
        assert_eq!(parse_name_status("").unwrap(), vec![]);
    }

    #[test]
    fn parse_basic_statuses() {
        let output = "M\0force-app/main/default/classes/Foo.cls\0A\0README.md\0D\0old.txt\0";
        assert_eq!(
            parse_name_status(output).unwrap(),
            vec![
                ChangedPath::new(ChangeStatus::Modified, "force-app/main/default/classes/Foo.cls"),
                ChangedPath::new(ChangeStatus::Added, "README.md"),
                ChangedPath::new(ChangeStatus::Deleted, "old.txt"),
            ]
        );
    }

    #[test]
    fn parse_rename_keeps_destination() {
        let output = "R100\0classes/Old.cls\0classes/New.cls\0C075\0a.txt\0b.txt\0";
        let changes = parse_name_status(output).unwrap();
        assert_eq!(
            changes,
            vec![
                ChangedPath::new(ChangeStatus::Renamed, "classes/New.cls"),
                ChangedPath::new(ChangeStatus::Copied, "b.txt"),
            ]
        );
    }

    #[test]
    fn parse_paths_with_spaces_and_tabs() {
        let output = "M\0static resources/logo\tv2.png\0";
        let changes = parse_name_status(output).unwrap();
        assert_eq!(changes[0].path, "static resources/logo\tv2.png");
    }

    #[test]
    fn parse_type_change_and_unmerged() {
        let changes = parse_name_status("T\0link\0U\0conflict.cls\0").unwrap();
        assert_eq!(changes[0].status, ChangeStatus::TypeChanged);
        assert_eq!(changes[1].status, ChangeStatus::Unmerged);
    }

    #[test]
    fn parse_rejects_unknown_status() {
        let err = parse_name_status("Q\0file\0").unwrap_err();
        assert!(matches!(err, DiffExecutionError::MalformedOutput { .. }));
    }

    #[test]
    fn parse_rejects_truncated_record() {
        let err = parse_name_status("M\0file-without-terminator").unwrap_err();
        assert!(matches!(err, DiffExecutionError::MalformedOutput { ref near } if near.starts_with("M\\0file")));

        let err = parse_name_status("R100\0only-source\0").unwrap_err();
        assert!(matches!(err, DiffExecutionError::MalformedOutput { .. }));
    }

    #[test]
    fn parse_skips_non_utf8_paths() {
        let output = b"A\0docs-\xff.txt\0A\0force-app/main/default/classes/Bar.cls\0R100\0a\xfe\0b.cls\0";
        assert_eq!(
            parse_name_status(output).unwrap(),
            vec![
                ChangedPath::new(ChangeStatus::Added, "force-app/main/default/classes/Bar.cls"),
                ChangedPath::new(ChangeStatus::Renamed, "b.cls"),
            ]
        );
    }

    #[test]
    fn only_deleted_is_deletion() {
        assert!(ChangeStatus::Deleted.is_deletion());
        assert!(!ChangeStatus::Renamed.is_deletion());
        assert!(!ChangeStatus::Modified.is_deletion());
    }

    #[test]
    fn missing_repository_is_exit_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = GitCli::new(dir.path())
            .changed_paths("HEAD~1", "HEAD")
            .unwrap_err();
        assert!(matches!(
            err,
            DiffExecutionError::ExitError { .. } | DiffExecutionError::SpawnFailed { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn slow_child_is_killed_at_deadline() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let started = Instant::now();

        let status = wait_with_deadline(&mut child, Duration::from_millis(50)).unwrap();
        assert!(status.is_none());
        assert!(started.elapsed() < Duration::from_secs(4));
        // Reaped: nothing left to wait for.
        assert!(child.try_wait().unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn fast_child_finishes_before_deadline() {
        let mut child = Command::new("true").spawn().unwrap();
        let status = wait_with_deadline(&mut child, Duration::from_secs(30)).unwrap();
        assert!(status.unwrap().success());
    }

    #[cfg(unix)]
    #[test]
    fn unrepresentable_deadline_waits_without_one() {
        let mut child = Command::new("true").spawn().unwrap();
        let status = wait_with_deadline(&mut child, Duration::from_secs(u64::MAX)).unwrap();
        assert!(status.unwrap().success());
    }

    #[test]
    fn timeout_reports_sub_second_duration() {
        let err = DiffExecutionError::Timeout {
            from_ref: "main".to_string(),
            to_ref: "HEAD".to_string(),
            millis: Duration::from_millis(250).as_millis(),
        };
        assert_eq!(err.to_string(), "git diff main HEAD timed out after 250ms");
    }
}
