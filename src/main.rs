use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use harvestr::cli::{Cli, Commands, LootCommands};
use harvestr::config::Config;
use harvestr::domain::{AggregateResult, CollectOptions, JobState, OverallStatus, Target};
use harvestr::executor::{JobExecutor, ProcessBackend};
use harvestr::id::generate_invocation_id;
use harvestr::loot::LootStore;
use harvestr::orchestrator::Orchestrator;
use harvestr::resolver;
use harvestr::server::{ToolHandler, ToolServer};

fn setup_logging(verbose: bool, config_level: Option<&str>) -> Result<()> {
    // RUST_LOG wins, then --verbose, then the config file
    let default_level = if verbose {
        "debug"
    } else {
        config_level.unwrap_or("info")
    };

    // try_init installs the tracing-log bridge, so log:: records from the
    // library land in the same subscriber.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}

/// Wire up the store, backend, and orchestrator from config
fn build_orchestrator(config: &Config) -> Result<Arc<Orchestrator>> {
    let store = Arc::new(
        LootStore::open(&config.loot.output_path).context("Failed to open loot store")?,
    );
    let backend = Arc::new(ProcessBackend::new(&config.backend, &store.work_root()));
    let executor = JobExecutor::new(
        backend,
        Duration::from_secs(config.jobs.kill_grace_seconds),
    );
    Ok(Arc::new(Orchestrator::new(executor, store)))
}

/// Cancel the given token on the first interrupt
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, draining");
            cancel.cancel();
        }
    });
}

async fn run_serve(mut config: Config, port: Option<u16>, bind: Option<String>) -> Result<()> {
    if let Some(port) = port {
        config.server.listen_port = port;
    }
    if let Some(bind) = bind {
        config.server.bind_addr = bind;
    }

    let orchestrator = build_orchestrator(&config)?;
    let shutdown = CancellationToken::new();
    let handler = Arc::new(ToolHandler::new(
        orchestrator,
        config.jobs.clone(),
        shutdown.clone(),
    ));
    let server = ToolServer::new(config.server.clone(), handler);

    cancel_on_ctrl_c(shutdown.clone());

    println!(
        "{} {}:{}",
        "Serving on".cyan(),
        config.server.bind_addr,
        config.server.listen_port
    );
    println!("  loot: {}", config.loot.output_path.display());

    server.run(shutdown).await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_collect(
    mut config: Config,
    targets_spec: String,
    username: Option<String>,
    password: Option<String>,
    domain: Option<String>,
    hashes: Option<String>,
    kerberos: bool,
    collectors: Option<String>,
    timeout: Option<u64>,
    concurrency: Option<usize>,
    output: Option<std::path::PathBuf>,
) -> Result<()> {
    if let Some(output) = output {
        config.loot.output_path = output;
    }

    let targets = resolver::resolve(&targets_spec, config.jobs.max_targets)?;

    let mut options = CollectOptions::from_defaults(&config.jobs);
    options.username = username;
    options.password = password;
    options.domain = domain;
    options.hashes = hashes;
    options.kerberos = kerberos;
    options.collectors = collectors;
    if let Some(timeout) = timeout {
        options.timeout_seconds = timeout.max(1);
    }
    if let Some(concurrency) = concurrency {
        options.concurrency = concurrency.max(1);
    }

    let orchestrator = build_orchestrator(&config)?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    println!(
        "{} {} target{}",
        "Collecting from".cyan(),
        targets.len(),
        if targets.len() == 1 { "" } else { "s" }
    );

    let invocation_id = generate_invocation_id();
    let aggregate = orchestrator
        .run(&invocation_id, targets, options, cancel)
        .await?;

    print_aggregate(&aggregate);
    Ok(())
}

fn print_aggregate(aggregate: &AggregateResult) {
    let status = aggregate.status.as_str();
    let status = match aggregate.status {
        OverallStatus::AllSucceeded => status.green(),
        OverallStatus::Partial => status.yellow(),
        OverallStatus::AllFailed => status.red(),
    };
    println!("{} {} ({})", "Status:".bold(), status, aggregate.invocation_id);

    for outcome in &aggregate.results {
        let state = match outcome.state {
            JobState::Succeeded => outcome.state.as_str().green(),
            JobState::Cancelled => outcome.state.as_str().yellow(),
            _ => outcome.state.as_str().red(),
        };
        match &outcome.error {
            Some(error) => println!(
                "  {:<40} {} loot={} ({})",
                outcome.target.as_str(),
                state,
                outcome.loot_count,
                error
            ),
            None => println!(
                "  {:<40} {} loot={}",
                outcome.target.as_str(),
                state,
                outcome.loot_count
            ),
        }
    }

    println!(
        "{} {} records under {}",
        "Loot:".bold(),
        aggregate.total_loot(),
        aggregate.loot_path.display()
    );
}

fn run_targets(config: &Config, spec: &str) -> Result<()> {
    let targets = resolver::resolve(spec, config.jobs.max_targets)?;
    for target in &targets {
        println!("{}", target);
    }
    println!(
        "{} {} target{}",
        "Resolved".green(),
        targets.len(),
        if targets.len() == 1 { "" } else { "s" }
    );
    Ok(())
}

fn run_loot_list(config: &Config) -> Result<()> {
    let store = LootStore::open(&config.loot.output_path)?;
    let listing = store.targets()?;
    if listing.is_empty() {
        println!("{}", "No loot collected yet".yellow());
        return Ok(());
    }
    for (target, count) in listing {
        println!("{:<40} {}", target, count);
    }
    Ok(())
}

fn run_loot_show(config: &Config, target: &str) -> Result<()> {
    let store = LootStore::open(&config.loot.output_path)?;
    let target = Target::parse(target)?;
    let records = store.records_for(&target)?;
    if records.is_empty() {
        println!("{} {}", "No records for".yellow(), target);
        return Ok(());
    }
    for record in &records {
        println!(
            "{} {:<12} {:<24} {}",
            record.digest().dimmed(),
            record.kind.as_str(),
            record.label,
            record.payload
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.is_verbose(), config.log_level.as_deref())
        .context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    match cli.command {
        None => run_serve(config, None, None).await,
        Some(Commands::Serve { port, bind }) => run_serve(config, port, bind).await,
        Some(Commands::Collect {
            targets,
            username,
            password,
            domain,
            hashes,
            kerberos,
            collectors,
            timeout,
            concurrency,
            output,
        }) => {
            run_collect(
                config, targets, username, password, domain, hashes, kerberos, collectors,
                timeout, concurrency, output,
            )
            .await
        }
        Some(Commands::Targets { spec }) => run_targets(&config, &spec),
        Some(Commands::Loot { command }) => match command {
            LootCommands::List => run_loot_list(&config),
            LootCommands::Show { target } => run_loot_show(&config, &target),
        },
    }
}
