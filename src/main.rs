//! route53-ddns - keeps Route 53 A records on the current public IP.

use clap::{Parser, Subcommand};
use route53_ddns::config::Config;
use route53_ddns::reconciler::{select_zone, Route53Reconciler};
use route53_ddns::resolver::{HttpIpResolver, IpResolver};
use route53_ddns::route53::{Credentials, Route53Api, Route53Client, Route53Endpoint};
use route53_ddns::scheduler::{Scheduler, TickOutcome};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "route53-ddns")]
#[command(about = "Keeps Route 53 A records pointed at this machine's public IP")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll and update DNS until stopped (default)
    Run {
        /// Check interval in seconds (overrides the config file)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Reconcile every domain once and exit
    Update,

    /// Show the public IP and current DNS records
    Status,

    /// Validate configuration and hosted zone access
    Validate,

    /// Write an example configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn get_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    // Default locations
    let candidates = [
        dirs::config_dir().map(|p| p.join("route53-ddns/config.toml")),
        Some(PathBuf::from("/etc/route53-ddns/config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return candidate;
        }
    }

    // Return default even if it doesn't exist
    dirs::config_dir()
        .map(|p| p.join("route53-ddns/config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = get_config_path(cli.config);
    let command = cli.command.unwrap_or(Commands::Run { interval: None });

    match command {
        Commands::Run { interval } => {
            let config = load_config(&config_path)?;
            cmd_run(config, interval).await?;
        }
        Commands::Update => {
            let config = load_config(&config_path)?;
            cmd_update(config).await?;
        }
        Commands::Status => {
            let config = load_config(&config_path)?;
            cmd_status(config).await?;
        }
        Commands::Validate => {
            let config = Config::load_from(&config_path)?;
            cmd_validate(config).await?;
        }
        Commands::Init { force } => {
            cmd_init(&config_path, force)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load_from(path)?;
    config.validate()?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn build_client(config: &Config) -> Route53Client {
    let credentials = Credentials::new(
        config.aws.access_key_id(),
        config.aws.secret_access_key(),
    );
    let region = config.aws.region();

    match &config.aws.endpoint {
        Some(url) => Route53Client::with_endpoint(
            credentials,
            Route53Endpoint::custom(url.clone(), &region),
        ),
        None => Route53Client::new(credentials, &region),
    }
}

fn build_scheduler(
    config: &Config,
    interval: Duration,
) -> Scheduler<HttpIpResolver, Route53Reconciler<Route53Client>> {
    Scheduler::new(
        HttpIpResolver::with_url(config.ip_lookup_url.clone()),
        Route53Reconciler::new(build_client(config)),
        config.domains.clone(),
        interval,
    )
}

/// Flip `tx` on Ctrl-C, or SIGTERM on unix.
async fn wait_for_shutdown(tx: watch::Sender<bool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Could not install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = tx.send(true);
}

async fn cmd_run(config: Config, interval: Option<u64>) -> anyhow::Result<()> {
    let interval = Duration::from_secs(interval.unwrap_or(config.check_interval_secs).max(1));
    let mut scheduler = build_scheduler(&config, interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(wait_for_shutdown(shutdown_tx));

    scheduler.run(shutdown_rx).await;
    Ok(())
}

async fn cmd_update(config: Config) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(&config, Duration::from_secs(config.check_interval_secs));

    match scheduler.tick().await? {
        TickOutcome::Reconciled { ip, results, .. } => {
            println!("Current IP: {}", ip);
            println!();
            for (domain, outcome) in results {
                println!("  {}: {}", domain, outcome);
            }
        }
        TickOutcome::Unchanged { ip } => println!("Current IP: {} (unchanged)", ip),
    }

    Ok(())
}

async fn cmd_status(config: Config) -> anyhow::Result<()> {
    let resolver = HttpIpResolver::with_url(config.ip_lookup_url.clone());
    let reconciler = Route53Reconciler::new(build_client(&config));

    println!("route53-ddns Status");
    println!("===================\n");

    let current_ip = match resolver.resolve().await {
        Ok(ip) => {
            println!("Current Public IP: {}", ip);
            Some(ip.to_string())
        }
        Err(e) => {
            println!("Failed to detect IP: {}", e);
            None
        }
    };

    println!("\nDomains:");
    println!("--------");

    for domain in &config.domains {
        print!("  {}: ", domain);

        match reconciler.lookup(domain).await {
            Ok(Some(values)) => {
                let in_sync = current_ip
                    .as_ref()
                    .is_some_and(|ip| values.iter().all(|v| v == ip));
                let marker = if in_sync { "" } else { " (out of date)" };
                println!("{}{}", values.join(", "), marker);
            }
            Ok(None) => println!("(no A record)"),
            Err(e) => println!("error: {}", e),
        }
    }

    Ok(())
}

async fn cmd_validate(config: Config) -> anyhow::Result<()> {
    println!("Validating configuration...\n");

    if let Err(e) = config.validate() {
        println!("  configuration: FAILED - {}", e);
        std::process::exit(1);
    }
    println!("  configuration: OK");

    let client = build_client(&config);
    let zones = match client.list_hosted_zones().await {
        Ok(zones) => {
            println!("  route53: OK ({} hosted zone(s))", zones.len());
            zones
        }
        Err(e) => {
            println!("  route53: FAILED - {}", e);
            std::process::exit(1);
        }
    };

    let mut all_valid = true;

    for domain in &config.domains {
        print!("  {}: ", domain);

        match select_zone(&zones, domain) {
            Some(zone) => println!("OK ({} {})", zone.name, zone.bare_id()),
            None => {
                println!("FAILED - no hosted zone");
                all_valid = false;
            }
        }
    }

    println!();

    if all_valid {
        println!("All domains validated successfully.");
    } else {
        println!("Some domains failed validation.");
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::example().save_to(path)?;
    println!("Wrote example configuration to {}", path.display());
    Ok(())
}
