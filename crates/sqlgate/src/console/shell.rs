//! Raw host command execution

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::constants::CONSOLE_NULL;

fn platform_shell(command: &str) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C");
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c");
        cmd
    };
    cmd.arg(command);
    cmd
}

/// Run `command` through the platform shell and describe what it produced:
/// stdout if any, else stderr, else the failure.
pub async fn run(command: &str, cwd: Option<&Path>) -> String {
    let mut cmd = platform_shell(command);
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = match cmd.output().await {
        Ok(output) => output,
        Err(e) => return format!("[{:?}] - {e}", e.kind()),
    };

    if !output.stdout.is_empty() {
        return String::from_utf8_lossy(&output.stdout).into_owned();
    }
    if !output.stderr.is_empty() {
        return String::from_utf8_lossy(&output.stderr).into_owned();
    }
    if !output.status.success() {
        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        return format!("[{code}] - Command failed: {command}");
    }

    CONSOLE_NULL.to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_wins() {
        assert_eq!(run("echo hello; echo oops 1>&2", None).await, "hello\n");
    }

    #[tokio::test]
    async fn test_stderr_when_no_stdout() {
        assert_eq!(run("echo oops 1>&2", None).await, "oops\n");
    }

    #[tokio::test]
    async fn test_silent_failure_reports_code() {
        assert_eq!(run("exit 3", None).await, "[3] - Command failed: exit 3");
    }

    #[tokio::test]
    async fn test_silent_success_is_null() {
        assert_eq!(run("true", None).await, "null");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().canonicalize().unwrap();

        let output = run("pwd -P", Some(dir.path())).await;
        assert_eq!(output.trim_end(), canonical.to_string_lossy());
    }

    #[tokio::test]
    async fn test_missing_directory_reports_error() {
        let output = run("pwd", Some(Path::new("/definitely/not/here"))).await;
        assert!(output.starts_with("[NotFound] - "));
    }
}
