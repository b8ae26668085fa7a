use crate::engine::{EngineError, ProvisioningEngine};
use crate::error::{DeployError, Result};
use crate::locator::StackState;
use crate::types::{DeploymentOutcome, DeploymentRequest, StatusClass};

/// What was dispatched and the stack id the engine answered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub outcome: DeploymentOutcome,
    pub stack_id: String,
}

/// Issue exactly one create or update for `request`, chosen from `state`.
///
/// A stack that is mid-operation or sitting in a failure status is refused
/// before any call is made. Rejections from the engine are returned as-is,
/// including "No updates are to be performed".
pub fn dispatch<E: ProvisioningEngine>(
    engine: &E,
    state: &StackState,
    request: &DeploymentRequest,
) -> Result<Dispatched> {
    let stack = &request.stack;
    match state {
        StackState::Absent => {
            tracing::info!(stack = %stack, parameters = request.parameters.len(), "creating stack");
            let stack_id = engine
                .create(request)
                .map_err(|e| rejected(request, "create", e))?;
            Ok(Dispatched {
                outcome: DeploymentOutcome::Created,
                stack_id,
            })
        }
        StackState::Present { status, reason, .. } => match status.class() {
            StatusClass::Succeeded => {
                tracing::info!(stack = %stack, from = %status, parameters = request.parameters.len(), "updating stack");
                let stack_id = engine
                    .update(request)
                    .map_err(|e| rejected(request, "update", e))?;
                Ok(Dispatched {
                    outcome: DeploymentOutcome::Updated,
                    stack_id,
                })
            }
            StatusClass::Failed => Err(DeployError::Precondition {
                stack: stack.to_string(),
                status: *status,
                reason: match reason {
                    Some(r) => format!("refusing to update a stack in a failed state ({r})"),
                    None => "refusing to update a stack in a failed state".to_string(),
                },
            }),
            StatusClass::InProgress => Err(DeployError::Precondition {
                stack: stack.to_string(),
                status: *status,
                reason: "another operation is already running against this stack".to_string(),
            }),
        },
    }
}

fn rejected(request: &DeploymentRequest, operation: &'static str, err: EngineError) -> DeployError {
    match err {
        EngineError::Transport(message) => DeployError::Transport {
            stack: request.stack.to_string(),
            operation,
            message,
        },
        EngineError::Rejected(message) => DeployError::DispatchRejected {
            stack: request.stack.to_string(),
            operation,
            message,
        },
        EngineError::StackNotFound => DeployError::DispatchRejected {
            stack: request.stack.to_string(),
            operation,
            message: "stack does not exist".to_string(),
        },
    }
}
