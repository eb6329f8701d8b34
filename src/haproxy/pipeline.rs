//! Safe mutate-validate-restart pipeline.
//!
//! ```text
//! START → BACKED_UP → WRITTEN → VALIDATING ─┬─ VALID → RESTARTING → DONE
//!                                           └─ INVALID → RESTORED → FAILED
//! ```
//!
//! Input errors and missing sections are detected before the backup step,
//! so they never touch the filesystem. Any failure after the write restores
//! the backup before returning; if the restore itself fails the caller gets
//! an I/O error, never the validator's verdict. A restart failure after a valid write is a
//! partial success: the config is persisted and the restart can be retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::exec::{ConfigValidator, ExecError, ServiceControl, Validation};
use crate::haproxy::model::SectionKind;
use crate::haproxy::render::{check_name, render_backend, render_frontend, BackendSpec, FrontendSpec};
use crate::haproxy::store::ConfigStore;
use crate::haproxy::surgery;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller input rejected before any write.
    #[error("{0}")]
    Validation(String),

    /// Config file or target section absent.
    #[error("{0}")]
    NotFound(String),

    /// The external validator rejected the new content; the backup was restored.
    #[error("Invalid configuration")]
    Syntax { diagnostics: String },

    #[error(transparent)]
    Tool(#[from] ExecError),

    #[error("Config file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result of a persisted mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub restarted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
}

/// Serialises every mutation of one config path.
pub struct MutationPipeline {
    store: Arc<dyn ConfigStore>,
    validator: Arc<dyn ConfigValidator>,
    service: Arc<dyn ServiceControl>,
    service_name: String,
    scratch_dir: PathBuf,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for MutationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationPipeline")
            .field("store", &self.store)
            .field("service_name", &self.service_name)
            .field("scratch_dir", &self.scratch_dir)
            .finish()
    }
}

impl MutationPipeline {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        validator: Arc<dyn ConfigValidator>,
        service: Arc<dyn ServiceControl>,
        service_name: impl Into<String>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            validator,
            service,
            service_name: service_name.into(),
            scratch_dir: scratch_dir.into(),
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Replace the whole file with caller-supplied text.
    pub async fn replace_config(&self, content: &str) -> PipelineResult<MutationOutcome> {
        if content.trim().is_empty() {
            return Err(PipelineError::Validation("Config content is required".into()));
        }
        self.commit("replace", false, |_| Ok(content.to_string())).await
    }

    /// Append a generated frontend block.
    pub async fn add_frontend(&self, spec: &FrontendSpec) -> PipelineResult<MutationOutcome> {
        spec.validate().map_err(|e| PipelineError::Validation(e.to_string()))?;
        self.commit("add_frontend", true, |current| {
            let current = current.unwrap_or_default();
            if surgery::mentions_section(&current, SectionKind::Frontend, &spec.name) {
                return Err(PipelineError::Validation(
                    "Frontend with this name already exists".into(),
                ));
            }
            Ok(current + &render_frontend(spec))
        })
        .await
    }

    /// Append a generated backend block.
    pub async fn add_backend(&self, spec: &BackendSpec) -> PipelineResult<MutationOutcome> {
        spec.validate().map_err(|e| PipelineError::Validation(e.to_string()))?;
        self.commit("add_backend", true, |current| {
            let current = current.unwrap_or_default();
            if surgery::mentions_section(&current, SectionKind::Backend, &spec.name) {
                return Err(PipelineError::Validation(
                    "Backend with this name already exists".into(),
                ));
            }
            Ok(current + &render_backend(spec))
        })
        .await
    }

    /// Remove a named section. A missing section is `NotFound`, not a no-op success.
    pub async fn remove_section(&self, kind: SectionKind, name: &str) -> PipelineResult<MutationOutcome> {
        self.commit("remove_section", true, |current| {
            surgery::remove_section(&current.unwrap_or_default(), kind, name)
                .ok_or_else(|| PipelineError::NotFound(format!("{} not found", capitalized(kind))))
        })
        .await
    }

    /// Replace a section's header and directives, optionally renaming it.
    pub async fn replace_section(
        &self,
        kind: SectionKind,
        name: &str,
        new_name: Option<&str>,
        body: &str,
    ) -> PipelineResult<MutationOutcome> {
        let new_name = new_name.filter(|n| !n.is_empty()).unwrap_or(name);
        check_name(kind.keyword(), new_name).map_err(|e| PipelineError::Validation(e.to_string()))?;
        if surgery::contains_header(body) {
            return Err(PipelineError::Validation(
                "Section body must not start another section".into(),
            ));
        }

        self.commit("replace_section", true, |current| {
            let current = current.unwrap_or_default();
            if new_name != name && surgery::find_section(&current, kind, new_name).is_some() {
                return Err(PipelineError::Validation(format!(
                    "{} with this name already exists",
                    capitalized(kind)
                )));
            }
            surgery::replace_section(&current, kind, name, new_name, body)
                .ok_or_else(|| PipelineError::NotFound(format!("{} not found", capitalized(kind))))
        })
        .await
    }

    /// Raw directive text of a section.
    pub fn read_section(&self, kind: SectionKind, name: &str) -> PipelineResult<String> {
        if !self.store.exists() {
            return Err(PipelineError::NotFound("Config file not found".into()));
        }
        let text = self.store.read_raw()?;
        surgery::section_body(&text, kind, name)
            .ok_or_else(|| PipelineError::NotFound(format!("{} not found", capitalized(kind))))
    }

    /// Check content against the validator using a scratch file; the live
    /// config is not touched and nothing is restarted.
    pub async fn validate_only(&self, content: &str) -> PipelineResult<Validation> {
        if content.trim().is_empty() {
            return Err(PipelineError::Validation("Config content is required".into()));
        }
        let scratch = self
            .scratch_dir
            .join(format!("haproxy-validate-{}.cfg", uuid::Uuid::new_v4().simple()));
        std::fs::write(&scratch, content)?;

        let verdict = self.validator.validate(&scratch).await;
        if let Err(e) = std::fs::remove_file(&scratch) {
            tracing::warn!(path = %scratch.display(), error = %e, "Failed to remove scratch config");
        }
        Ok(verdict?)
    }

    /// Restart the load balancer without touching the config.
    pub async fn restart(&self) -> PipelineResult<()> {
        self.service.restart(&self.service_name).await?;
        Ok(())
    }

    async fn commit<F>(&self, op: &'static str, require_existing: bool, compute: F) -> PipelineResult<MutationOutcome>
    where
        F: FnOnce(Option<String>) -> PipelineResult<String>,
    {
        let path = self.store.location().to_path_buf();
        let lock = self.lock_for(&path);
        let _guard = lock.lock().await;

        let current = if self.store.exists() {
            Some(self.store.read_raw()?)
        } else if require_existing {
            return Err(PipelineError::NotFound("Config file not found".into()));
        } else {
            None
        };

        let next = match compute(current) {
            Ok(next) => next,
            Err(e) => {
                metrics::record_mutation(op, "rejected");
                return Err(e);
            }
        };

        // BACKED_UP
        let backup = self.store.backup()?;
        // WRITTEN
        if let Err(e) = self.store.write_raw(&next) {
            tracing::error!(op, path = %path.display(), error = %e, "Config write failed");
            self.rollback(op, backup.as_deref())?;
            metrics::record_mutation(op, "io_error");
            return Err(e.into());
        }
        tracing::info!(
            op,
            path = %path.display(),
            backup = ?backup,
            bytes = next.len(),
            "Config written, validating"
        );

        // VALIDATING
        match self.validator.validate(&path).await {
            Ok(Validation::Valid { .. }) => {}
            Ok(Validation::Invalid { diagnostics }) => {
                self.rollback(op, backup.as_deref())?;
                metrics::record_mutation(op, "invalid");
                return Err(PipelineError::Syntax { diagnostics });
            }
            Err(e) => {
                self.rollback(op, backup.as_deref())?;
                metrics::record_mutation(op, "tool_error");
                return Err(e.into());
            }
        }

        // RESTARTING
        let restart_error = match self.service.restart(&self.service_name).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(op, service = %self.service_name, error = %e, "Config valid but restart failed");
                Some(e.to_string())
            }
        };
        metrics::record_mutation(op, if restart_error.is_none() { "applied" } else { "restart_failed" });
        tracing::info!(op, restarted = restart_error.is_none(), "Config mutation complete");

        Ok(MutationOutcome {
            restarted: restart_error.is_none(),
            restart_error,
            backup,
        })
    }

    /// Undo a write. A failed undo leaves rejected content live, so it
    /// takes precedence over whatever error triggered the rollback.
    fn rollback(&self, op: &'static str, backup: Option<&Path>) -> std::io::Result<()> {
        let result = match backup {
            Some(backup) => self.store.restore(backup),
            None => self.store.discard(),
        };
        match &result {
            Ok(()) => tracing::warn!(op, backup = ?backup, "Config rolled back"),
            Err(e) => {
                tracing::error!(
                    op,
                    path = %self.store.location().display(),
                    backup = ?backup,
                    error = ?e,
                    "Config rollback failed, live file holds unvalidated content"
                );
                metrics::record_mutation(op, "rollback_failed");
            }
        }
        result
    }
}

fn capitalized(kind: SectionKind) -> String {
    let keyword = kind.keyword();
    let mut chars = keyword.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
