//! The provisioning engine seam.
//!
//! The core never talks to CloudFormation directly; it calls these three
//! operations and interprets the answers. The CLI crate supplies the AWS SDK
//! implementation.

use crate::types::{DeploymentRequest, StackName};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine has no stack by that name.
    #[error("stack does not exist")]
    StackNotFound,

    /// The engine understood the request and refused it.
    #[error("{0}")]
    Rejected(String),

    /// The engine could not be reached or the call failed in flight.
    #[error("{0}")]
    Transport(String),
}

/// What `describe` returns for an existing stack. `status` is the engine's
/// raw string; classification happens in the locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescription {
    pub stack_id: Option<String>,
    pub status: String,
    pub status_reason: Option<String>,
}

pub trait ProvisioningEngine {
    fn describe(&self, stack: &StackName) -> Result<StackDescription, EngineError>;

    /// Start a create. Returns the new stack id.
    fn create(&self, request: &DeploymentRequest) -> Result<String, EngineError>;

    /// Start an update. Returns the stack id.
    fn update(&self, request: &DeploymentRequest) -> Result<String, EngineError>;
}
