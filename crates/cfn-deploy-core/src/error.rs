use crate::types::StackStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error during {operation} for stack '{stack}': {message}")]
    Transport {
        stack: String,
        operation: &'static str,
        message: String,
    },

    #[error("stack '{stack}' is in status {status}: {reason}")]
    Precondition {
        stack: String,
        status: StackStatus,
        reason: String,
    },

    #[error("{operation} request for stack '{stack}' was rejected: {message}")]
    DispatchRejected {
        stack: String,
        operation: &'static str,
        message: String,
    },

    #[error("stack '{stack}' finished in status {status}{}", reason_suffix(.reason))]
    ProvisioningFailed {
        stack: String,
        status: StackStatus,
        reason: Option<String>,
    },

    #[error("timed out after {elapsed_secs}s waiting for stack '{stack}' (last status: {last_status})")]
    TimedOut {
        stack: String,
        elapsed_secs: u64,
        last_status: String,
    },

    #[error("cancelled while waiting for stack '{stack}' (last status: {last_status})")]
    Cancelled { stack: String, last_status: String },

    #[error("stack '{stack}' reported unrecognized status '{status}'")]
    UnrecognizedStatus { stack: String, status: String },

    #[error("artifact transfer failed for s3://{bucket}/{key}: {message}")]
    Artifact {
        bucket: String,
        key: String,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) if !r.is_empty() => format!(" ({r})"),
        _ => String::new(),
    }
}

impl DeployError {
    /// Process exit code for this failure. Zero is reserved for success.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::ProvisioningFailed { .. } => 1,
            DeployError::Configuration(_) => 2,
            DeployError::Precondition { .. } => 3,
            DeployError::Transport { .. }
            | DeployError::DispatchRejected { .. }
            | DeployError::UnrecognizedStatus { .. }
            | DeployError::Artifact { .. }
            | DeployError::Io(_)
            | DeployError::Json(_)
            | DeployError::Zip(_) => 4,
            DeployError::TimedOut { .. } => 5,
            DeployError::Cancelled { .. } => 130,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        DeployError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioning_failure_names_stack_and_status() {
        let err = DeployError::ProvisioningFailed {
            stack: "web".into(),
            status: StackStatus::UpdateRollbackComplete,
            reason: Some("Resource creation cancelled".into()),
        };
        assert_eq!(
            err.to_string(),
            "stack 'web' finished in status UPDATE_ROLLBACK_COMPLETE (Resource creation cancelled)"
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn every_error_exits_non_zero() {
        let errors = [
            DeployError::config("missing cfnStackName"),
            DeployError::Precondition {
                stack: "web".into(),
                status: StackStatus::RollbackComplete,
                reason: "delete it first".into(),
            },
            DeployError::Cancelled {
                stack: "web".into(),
                last_status: "CREATE_IN_PROGRESS".into(),
            },
        ];
        for err in &errors {
            assert_ne!(err.exit_code(), 0, "{err}");
        }
    }
}
