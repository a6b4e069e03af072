//! sp-preflight CLI
//!
//! Credential and deployment preflight checks for Selling Partner API
//! integrations

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use sp_preflight::core::config_loader::{ConfigLoadOptions, ConfigLoader};
use sp_preflight::core::{PreflightConfig, PreflightError, RunContext, Stage, ValidationReport};
use sp_preflight::orchestration::{
    ChatCompletionProcessor, PipelineRunner, ReportPresenter, RequestProcessor, report_query,
};
use sp_preflight::probe::EndpointProbe;
use sp_preflight::security::CredentialFormatChecker;
use sp_preflight::stages::{
    ComponentStatus, ResourceAccessStage, ServiceHealthStage, TokenExchangeStage, component_status,
    core_architecture_up,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status for configuration errors
const EXIT_CONFIG_ERROR: i32 = 2;

/// Default probes in flight with --concurrent
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Credential and deployment preflight checks
#[derive(Parser)]
#[command(name = "sp-preflight")]
#[command(version)]
#[command(about = "Credential and deployment preflight checks for SP-API integrations", long_about = None)]
struct Cli {
    /// Config file (defaults to ./.preflight.yaml if present)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate LWA credentials: format, token exchange, API access
    Credentials {
        /// Region override (us-east-1, eu-west-1, us-west-2)
        #[arg(short, long)]
        region: Option<String>,
    },

    /// Probe every service of the deployment
    Health {
        /// Run probes concurrently
        #[arg(long)]
        concurrent: bool,

        /// Maximum probes in flight with --concurrent
        #[arg(long, requires = "concurrent")]
        max_concurrency: Option<usize>,
    },

    /// Credentials, then health
    All {
        /// Region override (us-east-1, eu-west-1, us-west-2)
        #[arg(short, long)]
        region: Option<String>,
    },

    /// Ask the analysis backend for a sales report
    Report {
        /// Report period in days
        #[arg(short, long, default_value = "30")]
        days: u32,

        /// Free-form query (replaces the generated one)
        #[arg(short, long)]
        query: Option<String>,

        /// Chat-completion endpoint override
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sp_preflight=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sp_preflight=warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let region = match &cli.command {
        Commands::Credentials { region } | Commands::All { region } => region.clone(),
        _ => None,
    };

    let mut options = ConfigLoadOptions::from_process_env(cli.config.clone());
    options.region_override = region;
    let config = match ConfigLoader::load(options).await {
        Ok(config) => config,
        Err(e) => return Ok(config_error(&e)),
    };

    let probe = EndpointProbe::default();

    match cli.command {
        Commands::Credentials { .. } => credentials_command(&config, &probe, cli.json).await,
        Commands::Health {
            concurrent,
            max_concurrency,
        } => health_command(&config, &probe, concurrent, max_concurrency, cli.json).await,
        Commands::All { .. } => all_command(&config, &probe, cli.json).await,
        Commands::Report {
            days,
            query,
            endpoint,
        } => report_command(&config, &probe, days, query, endpoint).await,
    }
}

fn config_error(error: &PreflightError) -> i32 {
    eprintln!("\n❌ Configuration error [{}]", error.code());
    eprintln!("{}", error);
    for action in error.suggested_actions() {
        eprintln!("  💡 {}", action);
    }
    EXIT_CONFIG_ERROR
}

fn exit_code(success: bool) -> i32 {
    if success { 0 } else { 1 }
}

async fn run_credentials(
    config: &PreflightConfig,
    probe: &EndpointProbe,
) -> Result<ValidationReport, PreflightError> {
    let credentials = config
        .credentials
        .clone()
        .unwrap_or_default()
        .resolve()?;

    let stages: Vec<Box<dyn Stage>> = vec![
        Box::new(CredentialFormatChecker::new()),
        Box::new(TokenExchangeStage::new(probe.clone())),
        Box::new(ResourceAccessStage::new(probe.clone())),
    ];

    let mut ctx = RunContext::with_credentials(Arc::new(credentials));
    Ok(PipelineRunner::new().run(&stages, &mut ctx).await)
}

async fn run_health(
    config: &PreflightConfig,
    probe: &EndpointProbe,
    concurrent: bool,
    max_concurrency: Option<usize>,
) -> Result<(ValidationReport, Vec<ComponentStatus>), PreflightError> {
    let health = config.health.clone().unwrap_or_default();
    let specs = health.endpoint_specs()?;

    let concurrency = if concurrent {
        max_concurrency
            .or(health.max_concurrency)
            .unwrap_or(DEFAULT_MAX_CONCURRENCY)
    } else {
        health.max_concurrency.unwrap_or(1)
    };

    let results = ServiceHealthStage::new(probe.clone())
        .with_max_concurrency(concurrency)
        .check_all(&specs)
        .await;
    let statuses = component_status(&health.components, &results);

    Ok((ValidationReport::from_results(results), statuses))
}

async fn credentials_command(
    config: &PreflightConfig,
    probe: &EndpointProbe,
    json: bool,
) -> Result<i32> {
    let report = match run_credentials(config, probe).await {
        Ok(report) => report,
        Err(e) => return Ok(config_error(&e)),
    };

    if json {
        println!("{}", ReportPresenter::render_json(&report)?);
    } else {
        println!("\n🔑 SP-API credential validation\n");
        println!("{}", ReportPresenter::render(&report));
        println!("\n{}", ReportPresenter::security_recommendations());
    }

    Ok(exit_code(report.overall_success))
}

async fn health_command(
    config: &PreflightConfig,
    probe: &EndpointProbe,
    concurrent: bool,
    max_concurrency: Option<usize>,
    json: bool,
) -> Result<i32> {
    let (report, statuses) = match run_health(config, probe, concurrent, max_concurrency).await {
        Ok(outcome) => outcome,
        Err(e) => return Ok(config_error(&e)),
    };

    if json {
        let output = json!({
            "report": report,
            "components": statuses,
            "core_architecture_up": core_architecture_up(&statuses),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("\n🩺 Deployment health check\n");
        println!("{}", ReportPresenter::render(&report));
        println!("\n{}", ReportPresenter::render_components(&statuses));
    }

    Ok(exit_code(report.overall_success))
}

async fn all_command(config: &PreflightConfig, probe: &EndpointProbe, json: bool) -> Result<i32> {
    let mut report = match run_credentials(config, probe).await {
        Ok(report) => report,
        Err(e) => return Ok(config_error(&e)),
    };
    let (health, statuses) = match run_health(config, probe, false, None).await {
        Ok(outcome) => outcome,
        Err(e) => return Ok(config_error(&e)),
    };
    report.extend(health.results);

    if json {
        let output = json!({
            "report": report,
            "components": statuses,
            "core_architecture_up": core_architecture_up(&statuses),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("\n🔎 SP-API preflight\n");
        println!("{}", ReportPresenter::render(&report));
        println!("\n{}", ReportPresenter::render_components(&statuses));
        println!("\n{}", ReportPresenter::security_recommendations());
    }

    Ok(exit_code(report.overall_success))
}

async fn report_command(
    config: &PreflightConfig,
    probe: &EndpointProbe,
    days: u32,
    query: Option<String>,
    endpoint: Option<String>,
) -> Result<i32> {
    let mut analysis = config.analysis.clone().unwrap_or_default();
    if let Some(endpoint) = endpoint {
        analysis.endpoint = endpoint;
    }

    let query = query.unwrap_or_else(|| report_query(days));
    println!("\n📊 Requesting report: {}\n", query);

    let processor = ChatCompletionProcessor::new(probe.clone(), &analysis);
    match processor.process(&query).await {
        Ok(output) => {
            println!("{}", output);
            println!("\n✅ Report completed");
            Ok(0)
        }
        Err(e) => {
            eprintln!("\n❌ Report failed: {:#}", e);
            Ok(1)
        }
    }
}
