//! Lifecycle tools: worker_install, worker_activate, worker_status.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{ActivateOutcome, ClientInfo, GenerationId, InstallOutcome, RouteRule, WorkerState};

use crate::state::AppState;
use crate::tools::json_result;

/// Output from the worker_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerInstallOutput {
    pub install: InstallOutcome,
    /// Present when install asked to skip waiting and activation ran.
    pub activate: Option<ActivateOutcome>,
}

/// Output from the worker_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatusOutput {
    pub generation: GenerationId,
    pub state: WorkerState,
    pub routes: Vec<RouteRule>,
    pub clients: Vec<ClientInfo>,
    /// Background cache writes that failed since start.
    pub store_failures: u64,
}

/// Implementation of the worker_install tool.
pub async fn install_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let (install, activate) = state.worker.start().await?;
    json_result(&WorkerInstallOutput { install, activate })
}

/// Implementation of the worker_activate tool.
pub async fn activate_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let outcome = state.worker.activate().await?;
    json_result(&outcome)
}

/// Implementation of the worker_status tool.
pub async fn status_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let worker = &state.worker;
    let output = WorkerStatusOutput {
        generation: worker.generation().clone(),
        state: worker.state().await,
        routes: worker.router().routes().rules().to_vec(),
        clients: worker.clients().list().await,
        store_failures: worker.router().store_failures(),
    };
    json_result(&output)
}
