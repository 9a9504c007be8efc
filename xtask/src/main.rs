use anyhow::{
    Context,
    Result,
    ensure,
};
use clap::{
    Parser,
    Subcommand,
    ValueEnum,
};
use deployments::{
    DEPLOYMENTS_ROOT,
    DeploymentEnv,
    record_deployment,
};
use std::{
    path::Path,
    process::Command,
};

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Dashmetrics helper tasks (bindings, clippy, tests, deployment records)",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Network {
    AuroraTestnet,
    Local,
}

impl From<Network> for DeploymentEnv {
    fn from(network: Network) -> Self {
        match network {
            Network::AuroraTestnet => DeploymentEnv::AuroraTestnet,
            Network::Local => DeploymentEnv::Local,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Recompile generated_abi after editing the contract interfaces
    Abi,
    /// Run clippy for the entire workspace with warnings-as-errors
    Clippy,
    /// Run unit and integration tests with the test helpers enabled
    Test,
    /// Write the contract addresses of a deployment to .deployments/
    RecordDeployment {
        #[arg(long, value_enum, default_value = "aurora-testnet")]
        network: Network,
        #[arg(long)]
        betting: String,
        #[arg(long)]
        launchpad: Option<String>,
        /// RPC URL the contracts were deployed through (defaults per network)
        #[arg(long)]
        rpc_url: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = repo_root()?;

    match cli.command {
        Commands::Abi => build_generated_abi(&root)?,
        Commands::Clippy => run_clippy(&root)?,
        Commands::Test => run_tests(&root)?,
        Commands::RecordDeployment {
            network,
            betting,
            launchpad,
            rpc_url,
        } => {
            let env = DeploymentEnv::from(network);
            let url = rpc_url.unwrap_or_else(|| env.default_rpc_url().to_string());
            record_deployment(
                &root.join(DEPLOYMENTS_ROOT),
                env,
                &betting,
                launchpad.as_deref(),
                &url,
            )?;
            println!("Recorded {env} deployment (betting {betting})");
        }
    }

    Ok(())
}

fn repo_root() -> Result<std::path::PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask has no parent directory")
}

fn build_generated_abi(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("check")
        .arg("-p")
        .arg("generated_abi")
        .arg("--quiet")
        .current_dir(root);
    run_command(cmd, "cargo check -p generated_abi")?;
    Ok(())
}

fn run_clippy(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("clippy")
        .arg("--workspace")
        .arg("--all-targets")
        .arg("--all-features")
        .arg("--")
        .arg("-D")
        .arg("warnings")
        .current_dir(root);
    run_command(cmd, "cargo clippy")?;
    Ok(())
}

fn run_tests(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("test")
        .arg("--workspace")
        .arg("--features")
        .arg("dashmetrics/test-helpers")
        .current_dir(root);
    run_command(cmd, "cargo test --workspace")?;
    Ok(())
}

fn run_command(mut cmd: Command, label: &str) -> Result<()> {
    println!("Running: {}", label);
    let status = cmd
        .status()
        .with_context(|| format!("failed to run {label}"))?;
    ensure!(status.success(), "{label} failed with status {status}");
    Ok(())
}
