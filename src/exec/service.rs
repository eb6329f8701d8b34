//! Service control through the panel's restart command.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::exec::error::ExecResult;
use crate::exec::runner::CommandRunner;

pub const RESTART_SERVICE: &str = "v-restart-service";

pub trait ServiceControl: Send + Sync + std::fmt::Debug {
    fn restart<'a>(&'a self, service: &'a str) -> BoxFuture<'a, ExecResult<()>>;
}

/// Restarts services with `v-restart-service <name>`.
#[derive(Debug, Clone)]
pub struct PanelServiceControl {
    runner: Arc<dyn CommandRunner>,
}

impl PanelServiceControl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl ServiceControl for PanelServiceControl {
    fn restart<'a>(&'a self, service: &'a str) -> BoxFuture<'a, ExecResult<()>> {
        Box::pin(async move {
            let args = [service.to_string()];
            self.runner.invoke(RESTART_SERVICE, &args, None).await?;
            tracing::info!(service, "Service restarted");
            Ok(())
        })
    }
}
