// # cfddns - Cloudflare dynamic DNS updater
//
// A thin, cron-friendly front end over `cfddns-core`. One invocation either
// appends a domain entry to the config file (`--add`) or performs a single
// pass over every configured domain and exits.
//
// The binary is responsible for:
// 1. Parsing the command line and resolving default paths
// 2. Setting up logging (stderr + bounded log file)
// 3. Building the runtime and wiring the IP source, provider and cache
// 4. Mapping the outcome to an exit code
//
// Comparison, retry and cache decisions all live in `UpdateEngine`.
//
// ## Example
//
// ```bash
// cfddns --add home.example.com --token "$TOKEN" --zone-id "$ZONE" --ttl 300
// */5 * * * * cfddns -t A -t AAAA
// ```

mod logfile;

use anyhow::{Context, Result};
use cfddns_core::config::TTL_AUTO;
use cfddns_core::{
    ConfigFile, DomainConfig, EngineConfig, FileStateStore, RecordType, UpdateEngine,
};
use cfddns_ip_http::HttpIpSource;
use cfddns_provider_cloudflare::CloudflareFactory;
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::*;

use logfile::{BoundedLogFile, DEFAULT_MAX_LINES};

/// Directory under `$HOME` holding config, cache and log
const STATE_DIR_NAME: &str = ".cloudflare-ddns";

/// Timestamp format for log lines
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Exit codes for the possible run results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CfddnsExitCode {
    /// Everything that could be checked was in sync or updated
    Success = 0,
    /// Config missing, malformed or invalid (including duplicate on --add)
    ConfigError = 1,
    /// At least one record update failed after all retries
    UpdateFailed = 2,
    /// Home directory, HTTP client, runtime or log file unavailable
    MissingDependency = 3,
}

impl From<CfddnsExitCode> for ExitCode {
    fn from(code: CfddnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "cfddns", version)]
#[command(about = "Keep Cloudflare A/AAAA records pointed at this host's public IP")]
struct Args {
    /// Append a domain entry to the config file and exit
    #[arg(short, long, value_name = "DOMAIN", conflicts_with = "domain")]
    add: Option<String>,

    /// API token stored with --add (falls back to CF_API_TOKEN at run time)
    #[arg(long, value_name = "TOKEN", requires = "add")]
    token: Option<String>,

    /// Zone ID stored with --add (falls back to CF_ZONE_ID at run time)
    #[arg(long, value_name = "ID", requires = "add")]
    zone_id: Option<String>,

    /// Proxy traffic through Cloudflare (with --add)
    #[arg(long, requires = "add")]
    proxied: bool,

    /// Record TTL in seconds, 1 for automatic (with --add)
    #[arg(long, value_name = "SECS", requires = "add")]
    ttl: Option<u32>,

    /// Only process this configured domain
    #[arg(short, long, value_name = "DOMAIN")]
    domain: Option<String>,

    /// Config file [default: ~/.cloudflare-ddns/config.json]
    #[arg(short, long, env = "CFDDNS_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Record type to sync; repeat for both
    #[arg(short = 't', long = "record-type", value_name = "A|AAAA", default_value = "A")]
    record_types: Vec<RecordType>,

    /// IP cache directory [default: ~/.cloudflare-ddns/cache]
    #[arg(long, value_name = "PATH")]
    cache_dir: Option<PathBuf>,

    /// Log file [default: ~/.cloudflare-ddns/cfddns.log]
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Maximum number of lines kept in the log file
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_LINES)]
    max_log_lines: usize,

    /// Attempts per API call phase
    #[arg(long, value_name = "N", default_value_t = 3)]
    retries: usize,

    /// Seconds between attempts
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    retry_delay: u64,

    /// Log intended updates without changing DNS or the cache
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// More output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Files and directories used by one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
struct Paths {
    config: PathBuf,
    cache_dir: PathBuf,
    log_file: PathBuf,
}

impl Paths {
    /// Explicit paths win; the rest live under `home`/.cloudflare-ddns
    fn resolve(args: &Args, home: Option<PathBuf>) -> Result<Self> {
        let base = home.map(|h| h.join(STATE_DIR_NAME));

        let pick = |explicit: &Option<PathBuf>, default: &str| -> Result<PathBuf> {
            match explicit {
                Some(path) => Ok(path.clone()),
                None => base.as_ref().map(|b| b.join(default)).context(
                    "cannot determine home directory; pass --config, --cache-dir and --log-file",
                ),
            }
        };

        Ok(Self {
            config: pick(&args.config, "config.json")?,
            cache_dir: pick(&args.cache_dir, "cache")?,
            log_file: pick(&args.log_file, "cfddns.log")?,
        })
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let paths = match Paths::resolve(&args, home::home_dir()) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("cfddns: {:#}", e);
            return CfddnsExitCode::MissingDependency.into();
        }
    };

    if let Err(e) = init_logging(args.verbose, &paths.log_file, args.max_log_lines) {
        eprintln!("cfddns: {:#}", e);
        return CfddnsExitCode::MissingDependency.into();
    }

    // One pass, no internal concurrency
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CfddnsExitCode::MissingDependency.into();
        }
    };

    let code = rt.block_on(async {
        match &args.add {
            Some(domain) => add_domain(&args, domain, &paths.config).await,
            None => run_updates(&args, &paths).await,
        }
    });

    code.into()
}

/// Console on stderr at the chosen verbosity, INFO and above to the log file
fn init_logging(verbose: u8, log_path: &Path, max_lines: usize) -> Result<()> {
    let console_level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let log_file = BoundedLogFile::open(log_path, max_lines)
        .with_context(|| format!("cannot open log file {}", log_path.display()))?;

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_filter(console_level);

    let file = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_filter(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("failed to set tracing subscriber")?;

    Ok(())
}

/// Build the entry from the --add flags
fn entry_from_args(args: &Args, domain: &str) -> DomainConfig {
    let mut entry = DomainConfig::new(domain)
        .with_proxied(args.proxied)
        .with_ttl(args.ttl.unwrap_or(TTL_AUTO));

    if let Some(token) = &args.token {
        entry = entry.with_api_token(token.as_str());
    }
    if let Some(zone_id) = &args.zone_id {
        entry = entry.with_zone_id(zone_id.as_str());
    }
    entry
}

async fn add_domain(args: &Args, domain: &str, config_path: &Path) -> CfddnsExitCode {
    let entry = entry_from_args(args, domain);

    match ConfigFile::add_domain(config_path, entry).await {
        Ok(config) => {
            info!(
                "Added {} to {} ({} domain(s) configured)",
                domain,
                config_path.display(),
                config.domains.len()
            );
            CfddnsExitCode::Success
        }
        Err(e) => {
            error!("Cannot add {}: {}", domain, e);
            CfddnsExitCode::ConfigError
        }
    }
}

async fn run_updates(args: &Args, paths: &Paths) -> CfddnsExitCode {
    let domains = match load_domains(&paths.config, args.domain.as_deref()).await {
        Ok(domains) => domains,
        Err(e) => {
            error!("{:#}", e);
            return CfddnsExitCode::ConfigError;
        }
    };

    if domains.is_empty() {
        warn!(
            "No domains configured in {}. Add one with --add",
            paths.config.display()
        );
        return CfddnsExitCode::Success;
    }

    let ip_source = match HttpIpSource::new() {
        Ok(source) => source,
        Err(e) => {
            error!("Cannot initialise IP source: {}", e);
            return CfddnsExitCode::MissingDependency;
        }
    };

    let engine_config = EngineConfig {
        max_attempts: args.retries,
        retry_delay_secs: args.retry_delay,
        dry_run: args.dry_run,
    };

    let engine = match UpdateEngine::new(
        Box::new(ip_source),
        Box::new(CloudflareFactory::new()),
        Box::new(FileStateStore::new(&paths.cache_dir)),
        engine_config,
    ) {
        Ok(engine) => engine,
        Err(e) => {
            error!("{}", e);
            return CfddnsExitCode::ConfigError;
        }
    };

    let report = engine.run(&domains, &dedup(&args.record_types)).await;

    if report.is_success() {
        CfddnsExitCode::Success
    } else {
        CfddnsExitCode::UpdateFailed
    }
}

/// Load, narrow, validate and complete the domain entries for this run
async fn load_domains(config_path: &Path, only: Option<&str>) -> Result<Vec<DomainConfig>> {
    let config = ConfigFile::load(config_path).await?;

    let selected = match only {
        Some(domain) => config.select(domain)?,
        None => config.domains,
    };

    selected
        .iter()
        .map(|entry| -> Result<DomainConfig> {
            entry.validate()?;
            Ok(entry.resolve_credentials_from_env()?)
        })
        .collect()
}

/// Record types in first-seen order without repeats
fn dedup(record_types: &[RecordType]) -> Vec<RecordType> {
    let mut unique = Vec::with_capacity(record_types.len());
    for &record_type in record_types {
        if !unique.contains(&record_type) {
            unique.push(record_type);
        }
    }
    unique
}
