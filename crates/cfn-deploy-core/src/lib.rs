//! `cfn-deploy-core`: create-or-update orchestration for CloudFormation
//! stacks driven from a pipeline job.
//!
//! ```text
//! DeployConfig ── fetch_inputs ──► template + image
//!      │                                  │
//!      ▼                                  ▼
//!   locate ──► StackState ──► dispatch ──► Watcher ──► DeploymentReport
//! ```
//!
//! The provisioning engine and artifact store are traits; the AWS SDK
//! implementations live in the CLI crate.

pub mod artifact;
pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod locator;
pub mod orchestrator;
pub mod params;
pub mod types;
pub mod watch;


pub use cancel::CancelToken;
pub use config::{DeployConfig, Overrides, PipelineInputs};
pub use engine::{EngineError, ProvisioningEngine, StackDescription};
pub use error::{DeployError, Result};
pub use locator::{locate, StackState};
pub use orchestrator::{DeploymentReport, Orchestrator};
pub use types::{Capability, DeploymentOutcome, StackName, StackStatus, StatusClass};
