//! Invocation of the panel's named command-line tools.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::process::Command;

use crate::exec::error::{ExecError, ExecResult};
use crate::observability::metrics;

/// Trailing argument asking panel commands for JSON output.
pub const JSON_FLAG: &str = "json";

/// Runs named external commands with positional arguments and returns stdout.
pub trait CommandRunner: Send + Sync + std::fmt::Debug {
    fn invoke<'a>(
        &'a self,
        command: &'a str,
        args: &'a [String],
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, ExecResult<String>>;
}

/// Invoke with the JSON flag appended and parse stdout.
///
/// Unparseable output yields an empty object rather than an error.
pub async fn invoke_json(
    runner: &dyn CommandRunner,
    command: &str,
    args: &[String],
) -> ExecResult<Value> {
    let mut args = args.to_vec();
    args.push(JSON_FLAG.to_string());
    let stdout = runner.invoke(command, &args, None).await?;
    Ok(serde_json::from_str(&stdout).unwrap_or_else(|e| {
        tracing::debug!(command, error = %e, "Command returned non-JSON output");
        Value::Object(Default::default())
    }))
}

/// Run a prepared command with a deadline, killing it on timeout.
pub(crate) async fn run_with_timeout(
    mut cmd: Command,
    label: &str,
    timeout: Duration,
) -> ExecResult<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|source| ExecError::Spawn {
        command: label.to_string(),
        source,
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(ExecError::Spawn {
            command: label.to_string(),
            source,
        }),
        Err(_) => Err(ExecError::Timeout {
            command: label.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Runs commands from the panel's `bin` directory.
#[derive(Debug, Clone)]
pub struct PanelRunner {
    root: PathBuf,
    default_timeout: Duration,
}

impl PanelRunner {
    pub fn new(root: impl Into<PathBuf>, default_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            default_timeout,
        }
    }

    fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    fn search_path(&self) -> String {
        let inherited = std::env::var("PATH")
            .unwrap_or_else(|_| "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".into());
        format!("{}:{}", self.bin_dir().display(), inherited)
    }

    async fn run(&self, command: &str, args: &[String], timeout: Option<Duration>) -> ExecResult<String> {
        if command.is_empty() || command.contains('/') {
            return Err(ExecError::Failed {
                command: command.to_string(),
                code: None,
                message: format!("Invalid command name '{command}'"),
            });
        }

        let timeout = timeout.unwrap_or(self.default_timeout);
        let mut cmd = Command::new(self.bin_dir().join(command));
        cmd.args(args)
            .env("HESTIA", &self.root)
            .env("PATH", self.search_path());

        let start = Instant::now();
        let result = run_with_timeout(cmd, command, timeout).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(command, elapsed_ms, error = %e, "Panel command did not complete");
                metrics::record_command(command, if e.is_timeout() { "timeout" } else { "spawn_error" }, start);
                return Err(e);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            tracing::debug!(command, elapsed_ms, "Panel command succeeded");
            metrics::record_command(command, "ok", start);
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() };
        let code = output.status.code();
        tracing::warn!(command, elapsed_ms, code, "Panel command failed");
        metrics::record_command(command, "failed", start);
        Err(ExecError::Failed {
            command: command.to_string(),
            code,
            message: if message.is_empty() {
                format!("Command '{command}' exited with status {code:?}")
            } else {
                message.to_string()
            },
        })
    }
}

impl CommandRunner for PanelRunner {
    fn invoke<'a>(
        &'a self,
        command: &'a str,
        args: &'a [String],
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, ExecResult<String>> {
        Box::pin(self.run(command, args, timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn install_script(root: &std::path::Path, name: &str, body: &str) {
        let bin = root.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let path = bin.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_invoke_returns_stdout() {
        let root = tempfile::tempdir().unwrap();
        install_script(root.path(), "v-echo", "echo \"$1-$2\"");
        let runner = PanelRunner::new(root.path(), Duration::from_secs(5));

        let out = runner
            .invoke("v-echo", &["a b".to_string(), "c".to_string()], None)
            .await
            .unwrap();
        assert_eq!(out, "a b-c\n");
    }

    #[tokio::test]
    async fn test_invoke_failure_carries_stderr() {
        let root = tempfile::tempdir().unwrap();
        install_script(root.path(), "v-fail", "echo 'Error: user missing' >&2; exit 3");
        let runner = PanelRunner::new(root.path(), Duration::from_secs(5));

        let err = runner.invoke("v-fail", &[], None).await.unwrap_err();
        match err {
            ExecError::Failed { code, message, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(message, "Error: user missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invoke_timeout_is_distinct() {
        let root = tempfile::tempdir().unwrap();
        install_script(root.path(), "v-hang", "sleep 5");
        let runner = PanelRunner::new(root.path(), Duration::from_secs(5));

        let err = runner
            .invoke("v-hang", &[], Some(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_invoke_json_falls_back_to_empty_object() {
        let root = tempfile::tempdir().unwrap();
        install_script(root.path(), "v-list", "if [ \"$1\" = json ]; then echo '{\"a\":1}'; else echo nope; fi");
        install_script(root.path(), "v-text", "echo not json");
        let runner = PanelRunner::new(root.path(), Duration::from_secs(5));

        let value = invoke_json(&runner, "v-list", &[]).await.unwrap();
        assert_eq!(value["a"], 1);
        let value = invoke_json(&runner, "v-text", &[]).await.unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_rejects_path_in_command_name() {
        let runner = PanelRunner::new("/nonexistent", Duration::from_secs(1));
        assert!(runner.invoke("../../bin/sh", &[], None).await.is_err());
    }
}
