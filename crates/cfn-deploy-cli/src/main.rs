mod aws;
mod cmd;
mod output;

use cfn_deploy_core::DeployError;
use clap::{Parser, Subcommand};
use cmd::deploy::DeployArgs;

#[derive(Parser)]
#[command(
    name = "cfn-deploy",
    about = "Create or update a CloudFormation stack from a pipeline job and wait for it to settle",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the stack described by the pipeline job
    Deploy(DeployArgs),

    /// Show the current status of a stack
    Status {
        /// Stack to describe
        #[arg(long)]
        stack_name: String,

        /// AWS region of the stack
        #[arg(long, env = "AWS_REGION")]
        region: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Deploy(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Deploy(args) => cmd::deploy::run(args, cli.json),
        Commands::Status { stack_name, region } => cmd::status::run(&stack_name, &region, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        let code = e
            .downcast_ref::<DeployError>()
            .map_or(1, DeployError::exit_code);
        std::process::exit(code);
    }
}
