use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

use meshctl::cluster::SnapshotConnector;
use meshctl::config::Config;
use meshctl::config_loader;
use meshctl::orchestrator::{validate_deployment, DiagnoseOptions};
use meshctl::psk::{ensure_psk_secret, DEFAULT_PSK_LEN, PSK_SECRET_NAME};
use meshctl::registry::{NetworkRegistry, RegistryStore};
use meshctl::store::FileRecordStore;

/// Global CIDR registry and overlap diagnostics for multi-cluster network meshes
#[derive(Parser, Debug)]
#[command(name = "meshctl", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the meshctl configuration YAML file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding registry and secret records
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Mesh namespace holding the registry and the PSK secret
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run diagnostic checks on the mesh and report any issues
    Diagnose {
        #[command(subcommand)]
        target: DiagnoseTarget,
    },

    /// Manage the global CIDR registry
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },

    /// Manage the IPsec pre-shared key
    Psk {
        #[command(subcommand)]
        action: PskAction,
    },
}

#[derive(Subcommand, Debug)]
enum DiagnoseTarget {
    /// Check that mesh components are running with no overlapping CIDRs
    Deployment(DeploymentArgs),
}

#[derive(Args, Debug)]
struct DeploymentArgs {
    /// Cluster contexts to diagnose
    #[arg(long = "context", required = true, num_args = 1.., value_delimiter = ',')]
    contexts: Vec<String>,

    /// Directory holding one <context>.yaml snapshot per cluster
    #[arg(long)]
    contexts_dir: Option<PathBuf>,

    /// Number of contexts diagnosed in parallel (0 = one at a time)
    #[arg(short = 'j', long, default_value = "0")]
    jobs: usize,

    /// Also write the report as JSON to this path
    #[arg(long)]
    json_report: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum RegistryAction {
    /// Create the registry unless it already exists
    Init {
        /// Track global CIDR allocation
        #[arg(long)]
        globalnet: bool,

        /// Mesh-wide global CIDR range
        #[arg(long)]
        cidr_range: Option<String>,

        /// Number of global addresses per cluster
        #[arg(long)]
        cluster_size: Option<u64>,
    },

    /// Record the global CIDRs claimed by a cluster
    Join {
        #[arg(long)]
        cluster_id: String,

        #[arg(long = "cidr", value_delimiter = ',')]
        cidrs: Vec<String>,
    },

    /// Print the registry as JSON
    Show,
}

#[derive(Subcommand, Debug)]
enum PskAction {
    /// Create the PSK secret unless it already exists
    Create {
        /// Key length in bytes
        #[arg(long, default_value_t = DEFAULT_PSK_LEN)]
        length: usize,
    },
}

fn main() -> Result<ExitCode> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let cli = Cli::parse();

    let mut config = config_loader::load_or_default(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli)?;

    let log_level = config.general.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("Mesh namespace: {}", config.general.namespace);
    info!("State directory: {:?}", config.general.state_dir);

    match cli.command {
        Commands::Diagnose { target: DiagnoseTarget::Deployment(args) } => diagnose_deployment(&config, args),
        Commands::Registry { action } => {
            run_registry(&config, action)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Psk { action: PskAction::Create { length } } => {
            let store = FileRecordStore::new(&config.general.state_dir);
            let created = ensure_psk_secret(&store, &config.general.namespace, length)
                .wrap_err("Failed to create PSK secret")?;
            if created {
                println!("Created PSK secret {} ({} bytes)", PSK_SECRET_NAME, length);
            } else {
                println!("PSK secret {} already exists", PSK_SECRET_NAME);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Apply command-line settings on top of the configuration file
fn apply_cli_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(state_dir) = &cli.state_dir {
        config.general.state_dir = state_dir.clone();
    }
    if let Some(namespace) = &cli.namespace {
        config.general.namespace = namespace.clone();
    }
    if let Some(level) = &cli.log_level {
        config.general.log_level = Some(level.clone());
    }

    match &cli.command {
        Commands::Registry { action: RegistryAction::Init { globalnet, cidr_range, cluster_size } } => {
            if *globalnet {
                config.globalnet.enabled = true;
            }
            if let Some(range) = cidr_range {
                config.globalnet.cidr_range = range.clone();
            }
            if let Some(size) = cluster_size {
                config.globalnet.cluster_size = *size;
            }
        }
        Commands::Diagnose { target: DiagnoseTarget::Deployment(args) } => {
            if let Some(dir) = &args.contexts_dir {
                config.diagnose.contexts_dir = dir.clone();
            }
        }
        _ => {}
    }

    // Re-validate after applying overrides
    config.validate()?;
    Ok(())
}

fn diagnose_deployment(config: &Config, args: DeploymentArgs) -> Result<ExitCode> {
    info!("Diagnosing contexts {:?} from {:?}", args.contexts, config.diagnose.contexts_dir);

    let connector = SnapshotConnector::new(&config.diagnose.contexts_dir);
    let options = DiagnoseOptions { health: config.health_options(), jobs: args.jobs };
    let diagnosis = validate_deployment(&connector, &args.contexts, &options)?;

    println!("{}", diagnosis.report.render_text());

    if let Some(path) = &args.json_report {
        diagnosis.report.write_json(path)?;
    }

    if diagnosis.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn run_registry(config: &Config, action: RegistryAction) -> Result<()> {
    let registry = RegistryStore::new(FileRecordStore::new(&config.general.state_dir))
        .with_retry_policy(config.retry_policy());
    let namespace = config.general.namespace.as_str();

    match action {
        RegistryAction::Init { .. } => {
            let initial = if config.globalnet.enabled {
                NetworkRegistry::globalnet(&config.globalnet.cidr_range, config.globalnet.cluster_size)
            } else {
                NetworkRegistry::disabled()
            };
            let stored = registry
                .create_if_absent(namespace, &initial)
                .wrap_err_with(|| format!("Failed to create registry in namespace '{}'", namespace))?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        RegistryAction::Join { cluster_id, cidrs } => {
            let joined = registry
                .join_cluster(namespace, &cluster_id, &cidrs)
                .wrap_err_with(|| format!("Failed to record global CIDRs for cluster '{}'", cluster_id))?;
            println!("{}", serde_json::to_string_pretty(&joined)?);
        }
        RegistryAction::Show => {
            let current = registry
                .fetch(namespace)
                .wrap_err_with(|| format!("Failed to read registry in namespace '{}'", namespace))?;
            println!("{}", serde_json::to_string_pretty(&current)?);
        }
    }

    Ok(())
}
