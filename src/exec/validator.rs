//! Authoritative syntax check through `haproxy -c -f <file>`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::process::Command;

use crate::exec::error::ExecResult;
use crate::exec::runner::run_with_timeout;
use crate::observability::metrics;

/// Outcome of a syntax check. Tool failures (spawn, timeout) are errors,
/// not an invalid verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum Validation {
    Valid { output: String },
    Invalid { diagnostics: String },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }

    pub fn output(&self) -> &str {
        match self {
            Validation::Valid { output } => output,
            Validation::Invalid { diagnostics } => diagnostics,
        }
    }
}

pub trait ConfigValidator: Send + Sync + std::fmt::Debug {
    fn validate<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, ExecResult<Validation>>;
}

/// Runs the HAProxy binary in check mode.
#[derive(Debug, Clone)]
pub struct HaproxyValidator {
    binary: PathBuf,
    timeout: Duration,
}

impl HaproxyValidator {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn check(&self, path: &Path) -> ExecResult<Validation> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-c").arg("-f").arg(path);

        let start = Instant::now();
        let output = run_with_timeout(cmd, "haproxy -c", self.timeout)
            .await
            .inspect_err(|e| metrics::record_command("haproxy -c", if e.is_timeout() { "timeout" } else { "spawn_error" }, start))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let text = text.trim().to_string();

        if output.status.success() {
            metrics::record_command("haproxy -c", "ok", start);
            let output = if text.is_empty() {
                "Configuration is valid".to_string()
            } else {
                text
            };
            Ok(Validation::Valid { output })
        } else {
            metrics::record_command("haproxy -c", "failed", start);
            tracing::info!(path = %path.display(), code = output.status.code(), "Config rejected by validator");
            Ok(Validation::Invalid { diagnostics: text })
        }
    }
}

impl ConfigValidator for HaproxyValidator {
    fn validate<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, ExecResult<Validation>> {
        Box::pin(self.check(path))
    }
}
