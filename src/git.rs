//! Commit helper that backdates a commit to a given timestamp.
//!
//! Git is driven through the `CommandExecutor` trait so the sequence of calls
//! can be checked without a repository.

use crate::error::{ActimateError, Result};
use chrono::NaiveDateTime;
use std::process::Command;
use tracing::{debug, info};

/// Accepted `--date` format.
pub const INPUT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format written to `GIT_AUTHOR_DATE` and `GIT_COMMITTER_DATE`.
pub const GIT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Trait for executing system commands.
///
/// Object-safe and Send + Sync. Enables testability by allowing mock
/// implementations.
pub trait CommandExecutor: Send + Sync {
    /// Run `command` with `args` and extra environment variables.
    ///
    /// Returns the stdout of the command on success.
    fn execute(&self, command: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<String>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<String> {
        let output = Command::new(command)
            .args(args)
            .envs(envs.iter().copied())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ActimateError::GitToolNotFound {
                        tool: command.to_string(),
                    }
                } else {
                    ActimateError::GitCommand {
                        message: format!("Failed to execute {}: {}", command, e),
                    }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(ActimateError::GitCommand {
                message: format!(
                    "{} {} failed with status {:?}: {}",
                    command,
                    args.first().copied().unwrap_or_default(),
                    output.status.code(),
                    detail
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp, rejecting impossible dates.
pub fn parse_commit_date(input: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input.trim(), INPUT_DATE_FORMAT).map_err(|e| {
        ActimateError::CommitDateFormat {
            input: input.to_string(),
            message: e.to_string(),
        }
    })
}

/// What to commit and as whom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitRequest {
    pub message: String,
    pub date: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

/// Stage everything and commit it with both dates set to `request.date`.
///
/// The date is validated before any git command runs. Each step stops the
/// sequence on failure.
pub fn commit_with_date<E: CommandExecutor>(executor: &E, request: &CommitRequest) -> Result<()> {
    let when = parse_commit_date(&request.date)?;
    let git_date = when.format(GIT_DATE_FORMAT).to_string();

    if let Some(name) = &request.author_name {
        debug!("Setting user.name to {}", name);
        executor.execute("git", &["config", "user.name", name], &[])?;
    }
    if let Some(email) = &request.author_email {
        debug!("Setting user.email to {}", email);
        executor.execute("git", &["config", "user.email", email], &[])?;
    }

    executor.execute("git", &["add", "."], &[])?;
    executor.execute(
        "git",
        &["commit", "-m", &request.message],
        &[
            ("GIT_AUTHOR_DATE", git_date.as_str()),
            ("GIT_COMMITTER_DATE", git_date.as_str()),
        ],
    )?;
    info!("Committed with date {}", git_date);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Call = (String, Vec<String>, Vec<(String, String)>);

    /// Records every call and replays queued responses.
    #[derive(Debug, Default)]
    struct MockCommandExecutor {
        calls: Mutex<Vec<Call>>,
        responses: Mutex<VecDeque<Result<String>>>,
    }

    impl MockCommandExecutor {
        fn new() -> Self {
            Self::default()
        }

        fn with_response(self, response: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(response.to_string()));
            self
        }

        fn with_error(self, error: ActimateError) -> Self {
            self.responses.lock().unwrap().push_back(Err(error));
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandExecutor for MockCommandExecutor {
        fn execute(&self, command: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<String> {
            self.calls.lock().unwrap().push((
                command.to_string(),
                args.iter().map(|s| s.to_string()).collect(),
                envs.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn request(date: &str) -> CommitRequest {
        CommitRequest {
            message: "Add walking samples".to_string(),
            date: date.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_valid_timestamp() {
        let parsed = parse_commit_date("2024-03-15 14:30:00").unwrap();
        assert_eq!(parsed.format(GIT_DATE_FORMAT).to_string(), "2024-03-15T14:30:00");
    }

    #[test]
    fn rejects_impossible_calendar_date() {
        let err = parse_commit_date("2024-02-30 10:00:00").unwrap_err();
        assert!(matches!(err, ActimateError::CommitDateFormat { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rejects_wrong_layout() {
        assert!(parse_commit_date("15/03/2024 14:30").is_err());
        assert!(parse_commit_date("2024-03-15").is_err());
        assert!(parse_commit_date("").is_err());
    }

    #[test]
    fn bad_date_runs_no_git_command() {
        let executor = MockCommandExecutor::new();
        let result = commit_with_date(&executor, &request("2024-02-30 10:00:00"));
        assert!(matches!(result, Err(ActimateError::CommitDateFormat { .. })));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn stages_then_commits_with_both_dates() {
        let executor = MockCommandExecutor::new();
        commit_with_date(&executor, &request("2024-03-15 14:30:00")).unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, vec!["add", "."]);
        assert_eq!(calls[1].0, "git");
        assert_eq!(calls[1].1, vec!["commit", "-m", "Add walking samples"]);
        assert_eq!(
            calls[1].2,
            vec![
                ("GIT_AUTHOR_DATE".to_string(), "2024-03-15T14:30:00".to_string()),
                ("GIT_COMMITTER_DATE".to_string(), "2024-03-15T14:30:00".to_string()),
            ]
        );
    }

    #[test]
    fn author_identity_is_configured_first() {
        let executor = MockCommandExecutor::new();
        let req = CommitRequest {
            author_name: Some("Ada".to_string()),
            author_email: Some("ada@example.com".to_string()),
            ..request("2024-03-15 14:30:00")
        };
        commit_with_date(&executor, &req).unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].1, vec!["config", "user.name", "Ada"]);
        assert_eq!(calls[1].1, vec!["config", "user.email", "ada@example.com"]);
        assert_eq!(calls[2].1, vec!["add", "."]);
    }

    #[test]
    fn failing_step_stops_the_sequence() {
        let executor = MockCommandExecutor::new().with_error(ActimateError::GitCommand {
            message: "git add failed".to_string(),
        });
        let err = commit_with_date(&executor, &request("2024-03-15 14:30:00")).unwrap_err();
        assert!(matches!(err, ActimateError::GitCommand { .. }));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(executor.calls().len(), 1);
    }

    #[test]
    fn missing_git_is_reported() {
        let executor = MockCommandExecutor::new()
            .with_response("")
            .with_error(ActimateError::GitToolNotFound {
                tool: "git".to_string(),
            });
        let req = CommitRequest {
            author_name: Some("Ada".to_string()),
            ..request("2024-03-15 14:30:00")
        };
        let err = commit_with_date(&executor, &req).unwrap_err();
        assert!(matches!(err, ActimateError::GitToolNotFound { .. }));
        assert_eq!(executor.calls().len(), 2);
    }
}
