//! CLI command implementations

use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Subcommand};
use tracing::{info, warn};
use trafficgen_core::{
    CampaignReport, ClientConfig, ClientFactory, GeneratorConfig, HttpClientFactory,
    TrafficGenerator,
};
use trafficgen_sim::{NetworkConditions, SimulatedAccountService, SimulatedClientFactory};
use url::Url;

use crate::duration::{parse_duration, parse_millis_range};
use crate::user_map::load_user_map;

/// How long workers get to finish after the campaign is stopped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const SIMULATED_ADMIN_NAME: &str = "admin";
const SIMULATED_ADMIN_PASSWORD: &str = "simulated-admin-password";

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a campaign against a live account service
    Run(RunArgs),
    /// Run a campaign against an in-memory simulated service
    Simulate(SimulateArgs),
}

/// Pacing and duration options shared by both commands.
#[derive(Args)]
pub struct CampaignArgs {
    /// Properties file mapping user names to passwords
    #[arg(long)]
    pub user_map: PathBuf,
    /// Fixed pause after every user action
    #[arg(long, value_parser = parse_duration, default_value = "1s")]
    pub user_pause_duration: Duration,
    /// Upper bound of the random extra pause (0 disables it)
    #[arg(long, value_parser = parse_duration, default_value = "0")]
    pub user_pause_jitter: Duration,
    /// Stop after this long instead of waiting for Ctrl-C
    #[arg(long, value_parser = parse_duration)]
    pub run_for: Option<Duration>,
    /// Seed for reproducible jitter
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Base URL of the administrative API
    #[arg(long)]
    pub admin_api: Url,
    /// Administrator used to create accounts
    #[arg(long)]
    pub admin_name: String,
    /// Administrator password
    #[arg(long, env = "TRAFFICGEN_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: String,
    /// Base URL of the user API
    #[arg(long)]
    pub user_api: Url,
    /// Appended to each user name to form its email address
    #[arg(long)]
    pub user_email_suffix: String,
    /// Timeout for each API request
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub request_timeout: Duration,
    #[command(flatten)]
    pub campaign: CampaignArgs,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Probability (0.0-1.0) that a simulated call fails
    #[arg(long, default_value_t = 0.0)]
    pub failure_rate: f64,
    /// Simulated latency per call, in milliseconds
    #[arg(long, value_parser = parse_millis_range, default_value = "0..0")]
    pub latency_ms: Range<u64>,
    /// Appended to each user name to form its email address
    #[arg(long, default_value = "@simulated.invalid")]
    pub user_email_suffix: String,
    #[command(flatten)]
    pub campaign: CampaignArgs,
}

/// Handle the CLI command
///
/// # Errors
/// Returns an error if configuration is invalid or the campaign fails to
/// bootstrap
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => run_live(args).await,
        Commands::Simulate(args) => run_simulated(args).await,
    }
}

fn generator_config(
    campaign: &CampaignArgs,
    admin: (&str, &str),
    endpoints: (Url, Url),
    user_email_suffix: String,
) -> anyhow::Result<GeneratorConfig> {
    let (admin_name, admin_password) = admin;
    let (admin_api, user_api) = endpoints;

    let config = GeneratorConfig {
        admin_name: admin_name.to_string(),
        admin_password: admin_password.to_string(),
        admin_api,
        user_api,
        user_email_suffix,
        pause_between_actions: campaign.user_pause_duration,
        pause_jitter_bound: campaign.user_pause_jitter,
        users: load_user_map(&campaign.user_map)?,
        seed: campaign.seed,
    };
    config.validate().context("Invalid campaign configuration")?;
    Ok(config)
}

/// Run a campaign against the configured service endpoints
///
/// # Errors
/// - Configuration could not be loaded or is invalid
/// - Bootstrap failed
pub async fn run_live(args: RunArgs) -> anyhow::Result<()> {
    let config = generator_config(
        &args.campaign,
        (args.admin_name.as_str(), args.admin_password.as_str()),
        (args.admin_api.clone(), args.user_api.clone()),
        args.user_email_suffix.clone(),
    )?;

    let factory = HttpClientFactory::new(ClientConfig {
        request_timeout: args.request_timeout,
        ..ClientConfig::default()
    });

    info!(
        users = config.users.len(),
        admin_api = %config.admin_api,
        user_api = %config.user_api,
        "Starting traffic generator"
    );
    let report = run_campaign(TrafficGenerator::new(config, factory), args.campaign.run_for).await?;
    print_summary(&report);
    finish(&report)
}

/// Run a campaign against an in-memory service
///
/// # Errors
/// - Configuration could not be loaded or is invalid
/// - Bootstrap failed
pub async fn run_simulated(args: SimulateArgs) -> anyhow::Result<()> {
    let endpoint = Url::parse("http://simulated.invalid/").context("Invalid simulated endpoint")?;
    let config = generator_config(
        &args.campaign,
        (SIMULATED_ADMIN_NAME, SIMULATED_ADMIN_PASSWORD),
        (endpoint.clone(), endpoint),
        args.user_email_suffix.clone(),
    )?;

    let network = NetworkConditions::builder()
        .latency(args.latency_ms.clone())
        .failure_rate(args.failure_rate)
        .seed(args.campaign.seed.unwrap_or(42))
        .build();
    let service = SimulatedAccountService::new(SIMULATED_ADMIN_NAME, SIMULATED_ADMIN_PASSWORD)?
        .with_network(network);
    let factory = SimulatedClientFactory::new(service.clone());

    info!(
        users = config.users.len(),
        failure_rate = args.failure_rate,
        latency_ms = ?args.latency_ms,
        "Starting simulated traffic generator"
    );
    let report = run_campaign(TrafficGenerator::new(config, factory), args.campaign.run_for).await?;
    print_summary(&report);

    let stats = service.stats();
    println!("\nSimulated service");
    println!("{:-<60}", "");
    println!("  Accounts created:   {}", stats.accounts_created);
    println!("  Duplicate creates:  {}", stats.duplicate_creates);
    println!("  User logins:        {}", stats.user_logins);
    println!("  Rejected logins:    {}", stats.rejected_logins);
    println!("  Password updates:   {}", stats.password_updates);
    println!("  Injected failures:  {}", stats.injected_failures);

    finish(&report)
}

async fn run_campaign<F: ClientFactory>(
    generator: TrafficGenerator<F>,
    run_for: Option<Duration>,
) -> anyhow::Result<CampaignReport> {
    generator.start();

    let deadline = async {
        match run_for {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Cannot listen for Ctrl-C")?;
            info!("Interrupted, stopping");
        }
        () = deadline => info!("Run time elapsed, stopping"),
        () = generator.stopped() => warn!("Traffic generator stopped on its own"),
    }

    generator
        .shutdown(SHUTDOWN_GRACE)
        .await
        .ok_or_else(|| anyhow!("Workers did not finish within {SHUTDOWN_GRACE:?}"))
}

fn print_summary(report: &CampaignReport) {
    let elapsed = report.finished_at - report.started_at;

    println!("Campaign summary");
    println!("{:-<60}", "");
    println!(
        "  Duration:           {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    if let Some(bootstrap) = &report.bootstrap {
        println!("  Accounts created:   {}", bootstrap.created.len());
        println!("  Accounts existing:  {}", bootstrap.existing.len());
        println!("  Users skipped:      {}", bootstrap.skipped.len());
        println!("  Users abandoned:    {}", bootstrap.abandoned.len());
    }
    println!(
        "  Workers active:     {}/{}",
        report.active_workers(),
        report.workers.len()
    );
    println!("  Updates succeeded:  {}", report.updates_succeeded());
    println!("  Updates failed:     {}", report.updates_failed());

    for worker in &report.workers {
        println!(
            "    {:<24} logins {:>4}  updates {:>6}  failures {:>6}",
            worker.user_name.as_str(),
            worker.login_attempts,
            worker.updates_succeeded,
            worker.updates_failed
        );
    }
}

fn finish(report: &CampaignReport) -> anyhow::Result<()> {
    if let Some(error) = &report.error {
        bail!("Campaign aborted: {error}");
    }
    Ok(())
}
