//! weft controller - compile workflow steps into pods and submit them

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use kube::{Api, Client, CustomResourceExt};

use weft_common::crd::Workflow;
use weft_common::telemetry::{init_tracing, TelemetryConfig};
use weft_common::ControllerConfig;
use weft_pod::{compile_and_submit, KubePodClient, PodCompiler, WorkflowContext};

/// weft - synthesize and submit pods for workflow steps
#[derive(Parser, Debug)]
#[command(name = "weft-controller", version, about, long_about = None)]
struct Cli {
    /// Print the Workflow CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "WEFT_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile one step offline and print the pod as YAML
    Compile {
        /// Controller configuration file
        #[arg(long, env = "WEFT_CONFIG")]
        config: PathBuf,

        /// Workflow manifest (must carry name, namespace and uid)
        #[arg(long)]
        workflow: PathBuf,

        /// Template to compile
        #[arg(long)]
        template: String,

        /// Node name the pod is synthesized for
        #[arg(long)]
        node: String,
    },

    /// Compile one step of a live workflow and create its pod
    Submit {
        /// Controller configuration file
        #[arg(long, env = "WEFT_CONFIG")]
        config: PathBuf,

        /// Name of the Workflow resource
        #[arg(long)]
        workflow: String,

        /// Namespace of the Workflow resource
        #[arg(long, default_value = "default")]
        namespace: String,

        /// Template to compile
        #[arg(long)]
        template: String,

        /// Node name the pod is synthesized for
        #[arg(long)]
        node: String,

        /// Bound on the create call
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&Workflow::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_tracing(TelemetryConfig {
        json: cli.json_logs,
    })?;

    match cli.command {
        Some(Commands::Compile {
            config,
            workflow,
            template,
            node,
        }) => run_compile(&config, &workflow, &template, &node),
        Some(Commands::Submit {
            config,
            workflow,
            namespace,
            template,
            node,
            timeout_secs,
        }) => {
            run_submit(
                &config,
                &workflow,
                &namespace,
                &template,
                &node,
                Duration::from_secs(timeout_secs),
            )
            .await
        }
        None => Err(anyhow::anyhow!(
            "no command given (try `compile`, `submit` or `--crd`)"
        )),
    }
}

/// Compile a step from a workflow manifest on disk and print the pod
fn run_compile(config: &Path, workflow: &Path, template: &str, node: &str) -> anyhow::Result<()> {
    let config = ControllerConfig::load(config)?;
    let raw = std::fs::read_to_string(workflow)
        .with_context(|| format!("failed to read workflow {}", workflow.display()))?;
    let wf: Workflow = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse workflow {}", workflow.display()))?;

    let tmpl = wf
        .spec
        .template(template)
        .ok_or_else(|| anyhow::anyhow!("template '{}' not found in workflow", template))?;
    let ctx = WorkflowContext::new(&wf, &config)?;
    let unit = PodCompiler::new(node, tmpl, ctx).compile()?;

    print!("{}", serde_yaml::to_string(&unit)?);
    Ok(())
}

/// Fetch a live workflow, compile the step and create its pod
async fn run_submit(
    config: &Path,
    workflow: &str,
    namespace: &str,
    template: &str,
    node: &str,
    timeout: Duration,
) -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        anyhow::bail!("failed to install crypto provider: {:?}", e);
    }

    let config = ControllerConfig::load(config)?;
    let client = Client::try_default()
        .await
        .context("failed to create kubernetes client")?;

    let workflows: Api<Workflow> = Api::namespaced(client.clone(), namespace);
    let wf = workflows
        .get(workflow)
        .await
        .with_context(|| format!("failed to get workflow {}/{}", namespace, workflow))?;

    let tmpl = wf
        .spec
        .template(template)
        .ok_or_else(|| anyhow::anyhow!("template '{}' not found in workflow", template))?;
    let ctx = WorkflowContext::new(&wf, &config)?;

    let pods = KubePodClient::new(client);
    let outcome = compile_and_submit(&pods, node, tmpl, ctx, timeout).await?;

    tracing::info!(pod = %outcome.name(), ?outcome, "submitted");
    println!("{}", outcome.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn submit_defaults_namespace_and_timeout() {
        let cli = Cli::try_parse_from([
            "weft-controller",
            "submit",
            "--config",
            "/etc/weft/config.yaml",
            "--workflow",
            "ci",
            "--template",
            "build",
            "--node",
            "ci[0].build",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Submit {
                namespace,
                timeout_secs,
                ..
            }) => {
                assert_eq!(namespace, "default");
                assert_eq!(timeout_secs, 30);
            }
            other => panic!("expected submit, got {:?}", other),
        }
    }

    #[test]
    fn crd_flag_needs_no_subcommand() {
        let cli = Cli::try_parse_from(["weft-controller", "--crd"]).unwrap();
        assert!(cli.crd);
        assert!(cli.command.is_none());
    }
}
