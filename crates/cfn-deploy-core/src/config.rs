use crate::artifact::{self, Artifact, IMAGE_NAME_TAG, SOURCE_BUNDLE};
use crate::error::{DeployError, Result};
use crate::params::{UserParams, DEFAULT_IMAGE_PARAMETER};
use crate::types::{Capability, StackName};
use crate::watch::DEFAULT_POLL_INTERVAL;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const PARAM_REGION: &str = "awsRegion";
pub const PARAM_STACK_NAME: &str = "cfnStackName";
pub const PARAM_TEMPLATE: &str = "cfnStackTemplate";

// ---------------------------------------------------------------------------
// ArtifactCredentials
// ---------------------------------------------------------------------------

/// Short-lived credentials the pipeline hands out for its artifact bucket.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl fmt::Debug for ArtifactCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PipelineInputs
// ---------------------------------------------------------------------------

/// The job inputs exactly as the pipeline supplies them, before parsing.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub credentials: String,
    pub user_params: String,
    pub input_artifacts: String,
    pub output_artifacts: Option<String>,
}

/// Knobs that do not come from the pipeline job itself.
#[derive(Debug, Clone)]
pub struct Overrides {
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
    pub capabilities: Vec<Capability>,
    pub image_parameter: String,
}

impl Default for Overrides {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            capabilities: vec![Capability::Iam],
            image_parameter: DEFAULT_IMAGE_PARAMETER.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// DeployConfig
// ---------------------------------------------------------------------------

/// Everything one run needs, parsed once at the process boundary.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub region: String,
    pub stack: StackName,
    pub template_path: PathBuf,
    pub user_params: UserParams,
    pub credentials: ArtifactCredentials,
    pub source_bundle: Artifact,
    pub image_name_tag: Artifact,
    pub output_artifacts: Vec<Artifact>,
    pub capabilities: Vec<Capability>,
    pub image_parameter: String,
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
}

impl DeployConfig {
    /// Validate the pipeline job. Nothing here touches the network, so every
    /// configuration problem surfaces before the first remote call.
    pub fn from_pipeline(inputs: &PipelineInputs, overrides: Overrides) -> Result<Self> {
        let credentials: ArtifactCredentials = serde_json::from_str(&inputs.credentials)
            .map_err(|e| DeployError::config(format!("artifact credentials are malformed: {e}")))?;

        let user_params = UserParams::parse(&unquote(&inputs.user_params))?;
        let region = user_params.require(PARAM_REGION)?.to_string();
        let stack = StackName::new(user_params.require(PARAM_STACK_NAME)?)?;
        let template_path = PathBuf::from(user_params.require(PARAM_TEMPLATE)?);

        let input_artifacts = parse_artifacts("input", &inputs.input_artifacts)?;
        let source_bundle = artifact::find(&input_artifacts, SOURCE_BUNDLE)?.clone();
        let image_name_tag = artifact::find(&input_artifacts, IMAGE_NAME_TAG)?.clone();
        let output_artifacts = match &inputs.output_artifacts {
            Some(raw) if !raw.trim().is_empty() => parse_artifacts("output", raw)?,
            _ => Vec::new(),
        };

        if overrides.poll_interval.is_zero() {
            return Err(DeployError::config("poll interval must be greater than zero"));
        }
        if overrides.image_parameter.trim().is_empty() {
            return Err(DeployError::config("image parameter name must not be empty"));
        }
        let mut capabilities: Vec<Capability> = Vec::new();
        for capability in overrides.capabilities {
            if !capabilities.contains(&capability) {
                capabilities.push(capability);
            }
        }

        Ok(Self {
            region,
            stack,
            template_path,
            user_params,
            credentials,
            source_bundle,
            image_name_tag,
            output_artifacts,
            capabilities,
            image_parameter: overrides.image_parameter,
            poll_interval: overrides.poll_interval,
            timeout: overrides.timeout,
        })
    }
}

/// User params arrive JSON-encoded as a string literal; raw text is accepted
/// too.
fn unquote(raw: &str) -> String {
    match serde_json::from_str::<String>(raw) {
        Ok(s) => s,
        Err(_) => raw.to_string(),
    }
}

fn parse_artifacts(kind: &str, raw: &str) -> Result<Vec<Artifact>> {
    serde_json::from_str(raw)
        .map_err(|e| DeployError::config(format!("{kind} artifacts are malformed: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const CREDS: &str =
        r#"{"accessKeyId":"AKIAEXAMPLE","secretAccessKey":"s3cr3t","sessionToken":"FwoGZXIvYXdzEXAMPLE"}"#;

    fn artifacts(names: &[&str]) -> String {
        let items: Vec<serde_json::Value> = names
            .iter()
            .map(|n| {
                serde_json::json!({
                    "name": n,
                    "revision": null,
                    "location": {
                        "type": "S3",
                        "s3Location": { "bucketName": "pipeline-bucket", "objectKey": format!("{n}/obj") }
                    }
                })
            })
            .collect();
        serde_json::to_string(&items).unwrap()
    }

    fn inputs(user_params: &str, names: &[&str]) -> PipelineInputs {
        PipelineInputs {
            credentials: CREDS.to_string(),
            user_params: user_params.to_string(),
            input_artifacts: artifacts(names),
            output_artifacts: Some("[]".to_string()),
        }
    }

    const PARAMS: &str = "awsRegion=us-east-1,cfnStackName=web,cfnStackTemplate=stack.json";

    #[test]
    fn builds_from_raw_user_params() {
        let cfg = DeployConfig::from_pipeline(
            &inputs(PARAMS, &[SOURCE_BUNDLE, IMAGE_NAME_TAG]),
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.region, "us-east-1");
        assert_eq!(cfg.stack.as_str(), "web");
        assert_eq!(cfg.template_path, PathBuf::from("stack.json"));
        assert_eq!(cfg.source_bundle.s3().object_key, "SourceBundle/obj");
        assert_eq!(cfg.capabilities, vec![Capability::Iam]);
        assert_eq!(cfg.poll_interval, Duration::from_secs(15));
        assert_eq!(cfg.credentials.session_token.as_deref(), Some("FwoGZXIvYXdzEXAMPLE"));
    }

    #[test]
    fn accepts_json_encoded_user_params() {
        let encoded = serde_json::to_string(PARAMS).unwrap();
        let cfg = DeployConfig::from_pipeline(
            &inputs(&encoded, &[SOURCE_BUNDLE, IMAGE_NAME_TAG]),
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.stack.as_str(), "web");
    }

    #[test]
    fn missing_image_artifact_is_a_configuration_error() {
        let err = DeployConfig::from_pipeline(&inputs(PARAMS, &[SOURCE_BUNDLE]), Overrides::default())
            .unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
        assert!(err.to_string().contains(IMAGE_NAME_TAG));
    }

    #[test]
    fn missing_required_user_params() {
        for params in [
            "cfnStackName=web,cfnStackTemplate=t.json",
            "awsRegion=us-east-1,cfnStackTemplate=t.json",
            "awsRegion=us-east-1,cfnStackName=web",
        ] {
            let err = DeployConfig::from_pipeline(
                &inputs(params, &[SOURCE_BUNDLE, IMAGE_NAME_TAG]),
                Overrides::default(),
            )
            .unwrap_err();
            assert!(matches!(err, DeployError::Configuration(_)), "{params}");
        }
    }

    #[test]
    fn malformed_inputs() {
        let mut bad = inputs(PARAMS, &[SOURCE_BUNDLE, IMAGE_NAME_TAG]);
        bad.credentials = "{".into();
        assert!(DeployConfig::from_pipeline(&bad, Overrides::default()).is_err());

        let mut bad = inputs(PARAMS, &[SOURCE_BUNDLE, IMAGE_NAME_TAG]);
        bad.input_artifacts = "{}".into();
        assert!(DeployConfig::from_pipeline(&bad, Overrides::default()).is_err());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let overrides = Overrides {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(DeployConfig::from_pipeline(
            &inputs(PARAMS, &[SOURCE_BUNDLE, IMAGE_NAME_TAG]),
            overrides
        )
        .is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let creds: ArtifactCredentials = serde_json::from_str(CREDS).unwrap();
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("AKIAEXAMPLE"));
        assert!(!dbg.contains("s3cr3t"));
        assert!(!dbg.contains("FwoGZXIvYXdzEXAMPLE"));
    }
}
