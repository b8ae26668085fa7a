//! AWS SDK implementations of the core's engine and artifact-store traits.
//!
//! The SDK is async; the core is not. Both adapters share one tokio runtime
//! and `block_on` each call, so the core still sees plain blocking methods.

use aws_config::BehaviorVersion;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::{Capability as CfnCapability, Parameter as CfnParameter};
use cfn_deploy_core::artifact::{ArtifactStore, S3Location};
use cfn_deploy_core::config::ArtifactCredentials;
use cfn_deploy_core::types::DeploymentRequest;
use cfn_deploy_core::{DeployError, EngineError, ProvisioningEngine, StackDescription, StackName};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

// ---------------------------------------------------------------------------
// CloudFormationEngine
// ---------------------------------------------------------------------------

pub struct CloudFormationEngine {
    client: aws_sdk_cloudformation::Client,
    runtime: Arc<Runtime>,
}

impl CloudFormationEngine {
    /// Build a client from the default credential chain, pinned to `region`.
    pub fn new(runtime: Arc<Runtime>, region: &str) -> Self {
        let sdk_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(aws_config::Region::new(region.to_string()))
                .load(),
        );
        Self {
            client: aws_sdk_cloudformation::Client::new(&sdk_config),
            runtime,
        }
    }

    fn parameters(request: &DeploymentRequest) -> Vec<CfnParameter> {
        request
            .parameters
            .iter()
            .map(|p| {
                CfnParameter::builder()
                    .parameter_key(&p.key)
                    .parameter_value(&p.value)
                    .build()
            })
            .collect()
    }

    fn capabilities(request: &DeploymentRequest) -> Vec<CfnCapability> {
        request
            .capabilities
            .iter()
            .map(|c| CfnCapability::from(c.as_str()))
            .collect()
    }
}

impl ProvisioningEngine for CloudFormationEngine {
    fn describe(&self, stack: &StackName) -> Result<StackDescription, EngineError> {
        let output = self
            .runtime
            .block_on(self.client.describe_stacks().stack_name(stack.as_str()).send())
            .map_err(engine_error)?;

        let found = output.stacks().first().ok_or(EngineError::StackNotFound)?;
        Ok(StackDescription {
            stack_id: found.stack_id().map(str::to_string),
            status: found
                .stack_status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            status_reason: found.stack_status_reason().map(str::to_string),
        })
    }

    fn create(&self, request: &DeploymentRequest) -> Result<String, EngineError> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .create_stack()
                    .stack_name(request.stack.as_str())
                    .template_body(&request.template_body)
                    .set_parameters(Some(Self::parameters(request)))
                    .set_capabilities(Some(Self::capabilities(request)))
                    .client_request_token(&request.client_request_token)
                    .send(),
            )
            .map_err(engine_error)?;
        Ok(output
            .stack_id()
            .map_or_else(|| request.stack.to_string(), str::to_string))
    }

    fn update(&self, request: &DeploymentRequest) -> Result<String, EngineError> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .update_stack()
                    .stack_name(request.stack.as_str())
                    .template_body(&request.template_body)
                    .set_parameters(Some(Self::parameters(request)))
                    .set_capabilities(Some(Self::capabilities(request)))
                    .client_request_token(&request.client_request_token)
                    .send(),
            )
            .map_err(engine_error)?;
        Ok(output
            .stack_id()
            .map_or_else(|| request.stack.to_string(), str::to_string))
    }
}

/// CloudFormation signals a missing stack as a `ValidationError` whose
/// message ends in "does not exist".
fn engine_error<E, R>(err: SdkError<E, R>) -> EngineError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if err.as_service_error().is_none() {
        return EngineError::Transport(DisplayErrorContext(&err).to_string());
    }
    let code = err.code().unwrap_or("Unknown");
    let message = err.message().unwrap_or_default();
    if code == "ValidationError" && message.contains("does not exist") {
        EngineError::StackNotFound
    } else {
        EngineError::Rejected(format!("{code}: {message}"))
    }
}

// ---------------------------------------------------------------------------
// S3ArtifactStore
// ---------------------------------------------------------------------------

/// Reads pipeline artifacts with the job's own short-lived credentials,
/// never the ambient ones.
pub struct S3ArtifactStore {
    client: aws_sdk_s3::Client,
    runtime: Arc<Runtime>,
}

impl S3ArtifactStore {
    pub fn new(runtime: Arc<Runtime>, region: &str, credentials: &ArtifactCredentials) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            credentials.session_token.clone(),
            None,
            "codepipeline-job",
        );
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .credentials_provider(credentials)
            .build();
        Self {
            client: aws_sdk_s3::Client::from_conf(config),
            runtime,
        }
    }
}

impl ArtifactStore for S3ArtifactStore {
    fn download(&self, location: &S3Location, dest: &Path) -> cfn_deploy_core::Result<()> {
        let fetched = self.runtime.block_on(async {
            let object = self
                .client
                .get_object()
                .bucket(&location.bucket_name)
                .key(&location.object_key)
                .send()
                .await
                .map_err(|e| aws_sdk_s3::error::DisplayErrorContext(&e).to_string())?;
            let body = object.body.collect().await.map_err(|e| e.to_string())?;
            Ok::<_, String>(body.into_bytes())
        });
        let bytes = fetched.map_err(|message| DeployError::Artifact {
            bucket: location.bucket_name.clone(),
            key: location.object_key.clone(),
            message,
        })?;
        std::fs::write(dest, bytes)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Runtime shared by both adapters and the Ctrl-C listener.
pub fn runtime() -> anyhow::Result<Arc<Runtime>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;
    Ok(Arc::new(rt))
}
