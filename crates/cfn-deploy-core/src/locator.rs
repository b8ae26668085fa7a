use crate::engine::{EngineError, ProvisioningEngine};
use crate::error::{DeployError, Result};
use crate::types::{StackName, StackStatus};

/// Whether a stack exists and, if it does, where it stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackState {
    Absent,
    Present {
        status: StackStatus,
        stack_id: Option<String>,
        reason: Option<String>,
    },
}

impl StackState {
    pub fn status(&self) -> Option<StackStatus> {
        match self {
            StackState::Absent => None,
            StackState::Present { status, .. } => Some(*status),
        }
    }

    /// Engine-style label, `DOES_NOT_EXIST` when absent.
    pub fn label(&self) -> &'static str {
        self.status().map_or("DOES_NOT_EXIST", StackStatus::as_str)
    }
}

/// Describe `stack`. A not-found answer is `Absent`; any other engine error
/// is fatal here, retries belong to the engine client.
pub fn locate<E: ProvisioningEngine>(engine: &E, stack: &StackName) -> Result<StackState> {
    let description = match engine.describe(stack) {
        Ok(d) => d,
        Err(EngineError::StackNotFound) => {
            tracing::debug!(stack = %stack, "stack does not exist");
            return Ok(StackState::Absent);
        }
        Err(e) => {
            return Err(DeployError::Transport {
                stack: stack.to_string(),
                operation: "describe",
                message: e.to_string(),
            })
        }
    };

    let status = description
        .status
        .parse::<StackStatus>()
        .map_err(|e| DeployError::UnrecognizedStatus {
            stack: stack.to_string(),
            status: e.0,
        })?;

    Ok(StackState::Present {
        status,
        stack_id: description.stack_id,
        reason: description.status_reason.filter(|r| !r.is_empty()),
    })
}
