use crate::error::{DeployError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// StackName
// ---------------------------------------------------------------------------

static STACK_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn stack_name_re() -> &'static Regex {
    STACK_NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9\-]*$").unwrap())
}

/// Name of the target stack within one region/account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StackName(String);

impl StackName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > 128 || !stack_name_re().is_match(&name) {
            return Err(DeployError::config(format!(
                "invalid stack name '{name}': must start with a letter, contain only \
                 letters, digits and hyphens, and be at most 128 characters"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// StackStatus
// ---------------------------------------------------------------------------

/// Every status CloudFormation reports for a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    CreateInProgress,
    CreateFailed,
    CreateComplete,
    RollbackInProgress,
    RollbackFailed,
    RollbackComplete,
    DeleteInProgress,
    DeleteFailed,
    DeleteComplete,
    UpdateInProgress,
    UpdateCompleteCleanupInProgress,
    UpdateComplete,
    UpdateFailed,
    UpdateRollbackInProgress,
    UpdateRollbackFailed,
    UpdateRollbackCompleteCleanupInProgress,
    UpdateRollbackComplete,
    ReviewInProgress,
    ImportInProgress,
    ImportComplete,
    ImportRollbackInProgress,
    ImportRollbackFailed,
    ImportRollbackComplete,
}

/// The three disjoint partitions of [`StackStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Succeeded,
    Failed,
    InProgress,
}

impl StackStatus {
    pub fn all() -> &'static [StackStatus] {
        use StackStatus::*;
        &[
            CreateInProgress,
            CreateFailed,
            CreateComplete,
            RollbackInProgress,
            RollbackFailed,
            RollbackComplete,
            DeleteInProgress,
            DeleteFailed,
            DeleteComplete,
            UpdateInProgress,
            UpdateCompleteCleanupInProgress,
            UpdateComplete,
            UpdateFailed,
            UpdateRollbackInProgress,
            UpdateRollbackFailed,
            UpdateRollbackCompleteCleanupInProgress,
            UpdateRollbackComplete,
            ReviewInProgress,
            ImportInProgress,
            ImportComplete,
            ImportRollbackInProgress,
            ImportRollbackFailed,
            ImportRollbackComplete,
        ]
    }

    /// Rollback and delete progress statuses count as in-progress: they
    /// always settle into one of the failure statuses, and the watcher
    /// reports that final status.
    pub fn class(self) -> StatusClass {
        use StackStatus::*;
        match self {
            CreateComplete | UpdateComplete | ImportComplete => StatusClass::Succeeded,

            CreateFailed
            | RollbackFailed
            | RollbackComplete
            | DeleteFailed
            | DeleteComplete
            | UpdateFailed
            | UpdateRollbackFailed
            | UpdateRollbackComplete
            | ImportRollbackFailed
            | ImportRollbackComplete => StatusClass::Failed,

            CreateInProgress
            | RollbackInProgress
            | DeleteInProgress
            | UpdateInProgress
            | UpdateCompleteCleanupInProgress
            | UpdateRollbackInProgress
            | UpdateRollbackCompleteCleanupInProgress
            | ReviewInProgress
            | ImportInProgress
            | ImportRollbackInProgress => StatusClass::InProgress,
        }
    }

    pub fn as_str(self) -> &'static str {
        use StackStatus::*;
        match self {
            CreateInProgress => "CREATE_IN_PROGRESS",
            CreateFailed => "CREATE_FAILED",
            CreateComplete => "CREATE_COMPLETE",
            RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            RollbackFailed => "ROLLBACK_FAILED",
            RollbackComplete => "ROLLBACK_COMPLETE",
            DeleteInProgress => "DELETE_IN_PROGRESS",
            DeleteFailed => "DELETE_FAILED",
            DeleteComplete => "DELETE_COMPLETE",
            UpdateInProgress => "UPDATE_IN_PROGRESS",
            UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            UpdateComplete => "UPDATE_COMPLETE",
            UpdateFailed => "UPDATE_FAILED",
            UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            ReviewInProgress => "REVIEW_IN_PROGRESS",
            ImportInProgress => "IMPORT_IN_PROGRESS",
            ImportComplete => "IMPORT_COMPLETE",
            ImportRollbackInProgress => "IMPORT_ROLLBACK_IN_PROGRESS",
            ImportRollbackFailed => "IMPORT_ROLLBACK_FAILED",
            ImportRollbackComplete => "IMPORT_ROLLBACK_COMPLETE",
        }
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized stack status '{0}'")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for StackStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        StackStatus::all()
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Parameter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

impl Parameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "CAPABILITY_IAM")]
    Iam,
    #[serde(rename = "CAPABILITY_NAMED_IAM")]
    NamedIam,
    #[serde(rename = "CAPABILITY_AUTO_EXPAND")]
    AutoExpand,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Iam => "CAPABILITY_IAM",
            Capability::NamedIam => "CAPABILITY_NAMED_IAM",
            Capability::AutoExpand => "CAPABILITY_AUTO_EXPAND",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CAPABILITY_IAM" | "iam" => Ok(Capability::Iam),
            "CAPABILITY_NAMED_IAM" | "named-iam" => Ok(Capability::NamedIam),
            "CAPABILITY_AUTO_EXPAND" | "auto-expand" => Ok(Capability::AutoExpand),
            _ => Err(DeployError::config(format!("unknown capability '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// DeploymentRequest
// ---------------------------------------------------------------------------

/// Everything the engine needs for one create or update call.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub stack: StackName,
    pub template_body: String,
    pub parameters: Vec<Parameter>,
    pub capabilities: Vec<Capability>,
    /// Idempotency token; a transport-level retry of the same call cannot
    /// start a second operation.
    pub client_request_token: String,
}

impl DeploymentRequest {
    pub fn new(
        stack: StackName,
        template_body: String,
        parameters: Vec<Parameter>,
        capabilities: Vec<Capability>,
    ) -> Self {
        Self {
            stack,
            template_body,
            parameters,
            capabilities,
            client_request_token: format!("cfn-deploy-{}", uuid::Uuid::new_v4()),
        }
    }
}

// ---------------------------------------------------------------------------
// DeploymentOutcome
// ---------------------------------------------------------------------------

/// `Created` and `Updated` come from dispatch; the rest from the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "status", rename_all = "snake_case")]
pub enum DeploymentOutcome {
    Created,
    Updated,
    Succeeded,
    Failed(StackStatus),
    TimedOut,
    Cancelled,
}

impl fmt::Display for DeploymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentOutcome::Created => f.write_str("created"),
            DeploymentOutcome::Updated => f.write_str("updated"),
            DeploymentOutcome::Succeeded => f.write_str("succeeded"),
            DeploymentOutcome::Failed(status) => write!(f, "failed ({status})"),
            DeploymentOutcome::TimedOut => f.write_str("timed out"),
            DeploymentOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_stack_names() {
        for name in ["web", "my-app-prod", "A1", "x"] {
            StackName::new(name).unwrap_or_else(|_| panic!("expected valid: {name}"));
        }
    }

    #[test]
    fn invalid_stack_names() {
        let too_long = "a".repeat(129);
        for name in ["", "1abc", "-web", "has space", "under_score", too_long.as_str()] {
            assert!(StackName::new(name).is_err(), "expected invalid: {name}");
        }
    }

    #[test]
    fn status_strings_round_trip_through_from_str() {
        for status in StackStatus::all() {
            let parsed: StackStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, *status);
        }
    }

    #[test]
    fn serde_name_matches_engine_string() {
        for status in StackStatus::all() {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "UPDATE_SOMETHING_NEW".parse::<StackStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("UPDATE_SOMETHING_NEW".into()));
        assert!("create_complete".parse::<StackStatus>().is_err());
    }

    #[test]
    fn partitions() {
        assert_eq!(StackStatus::CreateComplete.class(), StatusClass::Succeeded);
        assert_eq!(StackStatus::UpdateComplete.class(), StatusClass::Succeeded);
        assert_eq!(StackStatus::RollbackComplete.class(), StatusClass::Failed);
        assert_eq!(StackStatus::UpdateRollbackComplete.class(), StatusClass::Failed);
        assert_eq!(StackStatus::CreateFailed.class(), StatusClass::Failed);
        assert_eq!(StackStatus::UpdateRollbackInProgress.class(), StatusClass::InProgress);
        assert_eq!(
            StackStatus::UpdateCompleteCleanupInProgress.class(),
            StatusClass::InProgress
        );
    }

    #[test]
    fn every_in_progress_status_is_named_so() {
        for status in StackStatus::all() {
            let in_progress = status.as_str().ends_with("_IN_PROGRESS");
            assert_eq!(
                status.class() == StatusClass::InProgress,
                in_progress,
                "{status}"
            );
        }
    }

    #[test]
    fn capability_parsing() {
        assert_eq!("CAPABILITY_IAM".parse::<Capability>().unwrap(), Capability::Iam);
        assert_eq!("named-iam".parse::<Capability>().unwrap(), Capability::NamedIam);
        assert!("CAPABILITY_ROOT".parse::<Capability>().is_err());
    }

    #[test]
    fn request_tokens_are_unique() {
        let stack = StackName::new("web").unwrap();
        let a = DeploymentRequest::new(stack.clone(), String::new(), vec![], vec![]);
        let b = DeploymentRequest::new(stack, String::new(), vec![], vec![]);
        assert_ne!(a.client_request_token, b.client_request_token);
        assert!(a.client_request_token.len() <= 128);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(
            DeploymentOutcome::Failed(StackStatus::RollbackComplete).to_string(),
            "failed (ROLLBACK_COMPLETE)"
        );
        assert_eq!(DeploymentOutcome::Succeeded.to_string(), "succeeded");
    }
}
