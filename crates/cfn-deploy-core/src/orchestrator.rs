//! One deployment run: fetch inputs, assemble parameters, locate the stack,
//! dispatch a create or update, and watch it settle.

use crate::artifact::{fetch_inputs, ArtifactStore};
use crate::cancel::CancelToken;
use crate::config::DeployConfig;
use crate::dispatch::dispatch;
use crate::engine::ProvisioningEngine;
use crate::error::{DeployError, Result};
use crate::locator::{locate, StackState};
use crate::params::assemble;
use crate::types::{DeploymentOutcome, DeploymentRequest, Parameter, StackName, StackStatus};
use crate::watch::Watcher;
use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// DeploymentReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub stack: StackName,
    pub stack_id: String,
    pub image: String,
    pub parameters: Vec<Parameter>,
    /// `Created` or `Updated`.
    pub action: DeploymentOutcome,
    pub outcome: DeploymentOutcome,
    pub final_status: Option<StackStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    pub polls: u32,
    /// Time spent watching, excluding artifact retrieval and dispatch.
    pub watch_elapsed_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DeploymentReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == DeploymentOutcome::Succeeded
    }

    /// Turn a non-successful watch outcome into the matching error.
    pub fn into_result(self) -> Result<Self> {
        let last_status = self
            .final_status
            .map_or("DOES_NOT_EXIST", StackStatus::as_str)
            .to_string();
        match self.outcome {
            DeploymentOutcome::Failed(status) => Err(DeployError::ProvisioningFailed {
                stack: self.stack.to_string(),
                status,
                reason: self.status_reason,
            }),
            DeploymentOutcome::TimedOut => Err(DeployError::TimedOut {
                stack: self.stack.to_string(),
                elapsed_secs: self.watch_elapsed_ms / 1000,
                last_status,
            }),
            DeploymentOutcome::Cancelled => Err(DeployError::Cancelled {
                stack: self.stack.to_string(),
                last_status,
            }),
            DeploymentOutcome::Succeeded
            | DeploymentOutcome::Created
            | DeploymentOutcome::Updated => Ok(self),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<'a, E, S> {
    config: &'a DeployConfig,
    engine: &'a E,
    store: &'a S,
    cancel: CancelToken,
}

impl<'a, E: ProvisioningEngine, S: ArtifactStore> Orchestrator<'a, E, S> {
    pub fn new(config: &'a DeployConfig, engine: &'a E, store: &'a S) -> Self {
        Self {
            config,
            engine,
            store,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the deployment to a terminal state. A failed, timed-out, or
    /// cancelled watch is still an `Ok` report; call
    /// [`DeploymentReport::into_result`] to turn it into an error.
    ///
    /// Cancellation before dispatch is an error and nothing is sent to the
    /// engine.
    pub fn run(&self) -> Result<DeploymentReport> {
        let config = self.config;
        let started_at = Utc::now();
        self.ensure_not_cancelled("DOES_NOT_EXIST")?;

        let inputs = fetch_inputs(
            self.store,
            &config.source_bundle,
            &config.image_name_tag,
            &config.template_path,
        )?;
        let parameters = assemble(&config.user_params, &inputs.image, &config.image_parameter)?;
        tracing::info!(
            stack = %config.stack,
            parameters = %parameters.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", "),
            "stack parameters"
        );

        let state = locate(self.engine, &config.stack)?;
        tracing::info!(stack = %config.stack, status = state.label(), "current stack state");

        let request = DeploymentRequest::new(
            config.stack.clone(),
            inputs.template_body,
            parameters,
            config.capabilities.clone(),
        );
        self.ensure_not_cancelled(state.label())?;
        let dispatched = dispatch(self.engine, &state, &request)?;
        tracing::info!(stack = %config.stack, stack_id = %dispatched.stack_id, action = %dispatched.outcome, "operation accepted");

        let watcher = Watcher::new(config.poll_interval, config.timeout, self.cancel.clone());
        let watched = watcher.watch(self.engine, &config.stack)?;

        let (final_status, status_reason) = match watched.last_state {
            StackState::Present { status, reason, .. } => (Some(status), reason),
            StackState::Absent => (None, None),
        };

        Ok(DeploymentReport {
            stack: config.stack.clone(),
            stack_id: dispatched.stack_id,
            image: inputs.image,
            parameters: request.parameters,
            action: dispatched.outcome,
            outcome: watched.outcome,
            final_status,
            status_reason,
            polls: watched.polls,
            watch_elapsed_ms: watched.elapsed.as_millis() as u64,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn ensure_not_cancelled(&self, last_status: &str) -> Result<()> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }
        tracing::warn!(stack = %self.config.stack, "cancelled before dispatch, no operation sent");
        Err(DeployError::Cancelled {
            stack: self.config.stack.to_string(),
            last_status: last_status.to_string(),
        })
    }
}
