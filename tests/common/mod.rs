//! Shared fakes and fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use haproxy_admin::config::AppConfig;
use haproxy_admin::exec::{
    CommandRunner, ConfigValidator, ExecError, ExecResult, ServiceControl, Validation,
};
use haproxy_admin::haproxy::{FileStore, MutationPipeline};
use haproxy_admin::http::{AppState, HttpServer};
use tempfile::TempDir;

pub const API_KEY: &str = "test-key";

pub const SAMPLE_CONFIG: &str = "\
global
    log /dev/log local0
    maxconn 4096

defaults
    mode http
    timeout connect 5s

frontend fe
    bind *:80
    default_backend be1

backend be1
    server s1 10.0.0.1:8080
";

/// Rejects any file containing the word "bogus", like a real checker
/// rejecting an unknown keyword.
#[derive(Debug, Default)]
pub struct FakeValidator {
    pub calls: AtomicUsize,
    pub unresponsive: AtomicBool,
    /// Reject everything, whatever the content.
    pub rejecting: AtomicBool,
    pub seen: Mutex<Vec<PathBuf>>,
}

impl ConfigValidator for FakeValidator {
    fn validate<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, ExecResult<Validation>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(path.to_path_buf());
            if self.unresponsive.load(Ordering::SeqCst) {
                return Err(ExecError::Timeout {
                    command: "haproxy -c".into(),
                    secs: 30,
                });
            }
            if self.rejecting.load(Ordering::SeqCst) {
                return Ok(Validation::Invalid {
                    diagnostics: "[ALERT] proxy 'fe2': unable to find required use_backend".into(),
                });
            }
            let text = std::fs::read_to_string(path).unwrap_or_default();
            if text.contains("bogus") {
                Ok(Validation::Invalid {
                    diagnostics: "[ALERT] unknown keyword 'bogus'".into(),
                })
            } else {
                Ok(Validation::Valid {
                    output: "Configuration file is valid".into(),
                })
            }
        })
    }
}

#[derive(Debug, Default)]
pub struct FakeService {
    pub restarts: AtomicUsize,
    pub failing: AtomicBool,
}

impl ServiceControl for FakeService {
    fn restart<'a>(&'a self, service: &'a str) -> BoxFuture<'a, ExecResult<()>> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ExecError::Failed {
                    command: "v-restart-service".into(),
                    code: Some(1),
                    message: format!("Error: {service} failed to start"),
                });
            }
            self.restarts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Answers panel commands from a table keyed by `"<command> <args...>"`.
/// Unknown commands fail.
#[derive(Debug, Default)]
pub struct FakeRunner {
    pub responses: Mutex<HashMap<String, Result<String, String>>>,
}

impl FakeRunner {
    pub fn respond(&self, invocation: &str, stdout: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(invocation.to_string(), Ok(stdout.to_string()));
    }

    pub fn fail(&self, invocation: &str, stderr: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(invocation.to_string(), Err(stderr.to_string()));
    }
}

impl CommandRunner for FakeRunner {
    fn invoke<'a>(
        &'a self,
        command: &'a str,
        args: &'a [String],
        _timeout: Option<Duration>,
    ) -> BoxFuture<'a, ExecResult<String>> {
        Box::pin(async move {
            let key = std::iter::once(command.to_string())
                .chain(args.iter().cloned())
                .collect::<Vec<_>>()
                .join(" ");
            match self.responses.lock().unwrap().get(&key).cloned() {
                Some(Ok(stdout)) => Ok(stdout),
                Some(Err(message)) => Err(ExecError::Failed {
                    command: command.to_string(),
                    code: Some(1),
                    message,
                }),
                None => Err(ExecError::Failed {
                    command: command.to_string(),
                    code: Some(127),
                    message: format!("{key}: not scripted"),
                }),
            }
        })
    }
}

/// A pipeline over a config file in a fresh temp directory.
pub struct Harness {
    pub dir: TempDir,
    pub path: PathBuf,
    pub validator: Arc<FakeValidator>,
    pub service: Arc<FakeService>,
    pub runner: Arc<FakeRunner>,
    pub pipeline: Arc<MutationPipeline>,
}

impl Harness {
    pub fn new(initial: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haproxy.cfg");
        if let Some(content) = initial {
            std::fs::write(&path, content).unwrap();
        }
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();

        let validator = Arc::new(FakeValidator::default());
        let service = Arc::new(FakeService::default());
        let runner = Arc::new(FakeRunner::default());
        let pipeline = Arc::new(MutationPipeline::new(
            Arc::new(FileStore::new(&path)),
            validator.clone(),
            service.clone(),
            "haproxy",
            scratch,
        ));

        Self {
            dir,
            path,
            validator,
            service,
            runner,
            pipeline,
        }
    }

    pub fn live(&self) -> String {
        std::fs::read_to_string(&self.path).unwrap()
    }

    /// Backup files next to the live config.
    pub fn backups(&self) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("haproxy.cfg.backup."))
            })
            .collect();
        found.sort();
        found
    }

    pub fn scratch_files(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("scratch")).unwrap().count()
    }

    pub fn state(&self) -> AppState {
        AppState {
            pipeline: self.pipeline.clone(),
            runner: self.runner.clone(),
            api_key: Arc::from(API_KEY),
        }
    }

    pub fn router(&self) -> axum::Router {
        HttpServer::with_state(&AppConfig::default(), self.state()).router()
    }
}
