use crate::aws::{self, CloudFormationEngine, S3ArtifactStore};
use crate::output::{print_fields, print_json};
use anyhow::Context;
use cfn_deploy_core::params::DEFAULT_IMAGE_PARAMETER;
use cfn_deploy_core::{
    CancelToken, Capability, DeployConfig, DeploymentReport, Orchestrator, Overrides,
    PipelineInputs,
};
use clap::Args;
use std::time::Duration;

/// Pipeline job inputs arrive as environment variables; each can also be
/// passed as a flag when running by hand.
#[derive(Args)]
pub struct DeployArgs {
    /// Job artifact credentials (JSON with accessKeyId, secretAccessKey, sessionToken)
    #[arg(long, env = "CODEPIPELINE_ARTIFACT_CREDENTIALS", hide_env_values = true)]
    pub credentials: String,

    /// Action user parameters (comma-separated key=value pairs)
    #[arg(long, env = "CODEPIPELINE_USER_PARAMS")]
    pub user_params: String,

    /// Input artifacts (JSON array)
    #[arg(long, env = "CODEPIPELINE_INPUT_ARTIFACTS")]
    pub input_artifacts: String,

    /// Output artifacts (JSON array)
    #[arg(long, env = "CODEPIPELINE_OUTPUT_ARTIFACTS")]
    pub output_artifacts: Option<String>,

    /// Seconds between status checks while waiting for the stack
    #[arg(long, env = "CFN_DEPLOY_POLL_INTERVAL_SECS", default_value_t = 15)]
    pub poll_interval_secs: u64,

    /// Give up waiting after this many seconds (default: wait indefinitely)
    #[arg(long, env = "CFN_DEPLOY_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Capability to acknowledge; repeat for several
    #[arg(long = "capability", default_value = "CAPABILITY_IAM")]
    pub capabilities: Vec<Capability>,

    /// Template parameter that receives the image name
    #[arg(long, default_value = DEFAULT_IMAGE_PARAMETER)]
    pub image_parameter: String,
}

impl DeployArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            timeout: self.timeout_secs.map(Duration::from_secs),
            capabilities: self.capabilities.clone(),
            image_parameter: self.image_parameter.clone(),
        }
    }

    fn pipeline_inputs(&self) -> PipelineInputs {
        PipelineInputs {
            credentials: self.credentials.clone(),
            user_params: self.user_params.clone(),
            input_artifacts: self.input_artifacts.clone(),
            output_artifacts: self.output_artifacts.clone(),
        }
    }
}

pub fn run(args: DeployArgs, json: bool) -> anyhow::Result<()> {
    // Validate everything before any client exists.
    let config = DeployConfig::from_pipeline(&args.pipeline_inputs(), args.overrides())?;
    tracing::info!(
        stack = %config.stack,
        region = %config.region,
        template = %config.template_path.display(),
        "starting deployment"
    );

    let runtime = aws::runtime().context("failed to start async runtime")?;
    let engine = CloudFormationEngine::new(runtime.clone(), &config.region);
    let store = S3ArtifactStore::new(runtime.clone(), &config.region, &config.credentials);

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling deployment");
            on_signal.cancel();
        }
    });

    let report = Orchestrator::new(&config, &engine, &store)
        .with_cancel(cancel)
        .run()?;

    if json {
        print_json(&report)?;
    } else {
        print_summary(&report);
    }

    report.into_result()?;
    Ok(())
}

fn print_summary(report: &DeploymentReport) {
    let mut fields = vec![
        ("stack", report.stack.to_string()),
        ("stack id", report.stack_id.clone()),
        ("image", report.image.clone()),
        ("action", report.action.to_string()),
        ("outcome", report.outcome.to_string()),
        (
            "status",
            report
                .final_status
                .map_or("DOES_NOT_EXIST", |s| s.as_str())
                .to_string(),
        ),
    ];
    if let Some(reason) = &report.status_reason {
        fields.push(("reason", reason.clone()));
    }
    fields.push(("polls", report.polls.to_string()));
    print_fields(&fields);
}
