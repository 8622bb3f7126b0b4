use barrelmon_client::{ApiClient, ClientConfig};
use barrelmon_common::config::HarnessConfig;
use barrelmon_load_tests::data::TestDataFactory;
use barrelmon_load_tests::report::{print_report, render_comparison, Verdict};
use barrelmon_load_tests::scenarios::{run_batch, run_batch_measurements, run_burst};
use barrelmon_load_tests::worker::{self, LoadSettings};
use barrelmon_load_tests::workload::WorkloadProfile;
use barrelmon_metrics::{benchmark, store, PerformanceReport};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for anything that prevents a scenario from running or being recorded.
const EXIT_SETUP_FAILURE: i32 = 3;

#[derive(Parser)]
#[command(name = "barrelmon-load", about = "Barrel Monitor API load test harness")]
struct Args {
    /// YAML configuration file; missing means defaults
    #[arg(long, default_value = "config/harness.yaml")]
    config: PathBuf,

    /// Override api.base_url (takes priority over API_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Target an in-process stub server instead of the configured API
    #[arg(long)]
    local: bool,

    /// Artificial per-response delay for the stub server (milliseconds)
    #[arg(long, default_value_t = 0, requires = "local")]
    latency_ms: u64,

    /// Directory for JSON reports
    #[arg(long, default_value = "reports/performance")]
    report_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sustained concurrent load with a workload mix
    Run {
        /// How long to run (seconds)
        #[arg(long)]
        duration: Option<u64>,

        /// Number of concurrent workers
        #[arg(long)]
        workers: Option<usize>,

        /// Workload profile: read-heavy | balanced | write-heavy | create-only
        #[arg(long)]
        workload: Option<String>,

        /// Aggregate request rate across all workers; unpaced when omitted
        #[arg(long)]
        target_rps: Option<f64>,

        /// Test name used in the report
        #[arg(long)]
        name: Option<String>,
    },
    /// One sustained run per entry of performance.concurrent_users
    Concurrency {
        /// Seconds per step
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Paced single-producer bursts from ddos_protection.rate_limit_tests
    Burst {
        /// Run even when ddos_protection.enabled is false
        #[arg(long)]
        force: bool,
    },
    /// Concurrent barrel or measurement creation in batches of the given sizes
    Batch {
        /// Comma-separated batch sizes; defaults to performance.batch_sizes
        #[arg(long, value_delimiter = ',')]
        sizes: Vec<usize>,

        /// Batch measurements against a few freshly created barrels instead of barrels
        #[arg(long)]
        measurements: bool,
    },
    /// Compare every persisted report in the report directory
    Compare {
        /// Only include tests whose name contains this string
        #[arg(long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "barrelmon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(&args).unwrap_or_else(|e| setup_failure("Failed to load configuration", e));

    let exit_code = match &args.command {
        Command::Compare { filter } => compare(&args.report_dir, filter.as_deref()),
        Command::Run { duration, workers, workload, target_rps, name } => {
            let workload = workload.as_deref().unwrap_or(&config.load_testing.workload);
            let profile = WorkloadProfile::from_name(workload).unwrap_or_else(|| {
                eprintln!("Unknown workload {workload:?}. Valid values: read-heavy, balanced, write-heavy, create-only");
                process::exit(EXIT_SETUP_FAILURE);
            });
            let settings = LoadSettings {
                workers: workers.unwrap_or(config.load_testing.workers).max(1),
                duration: Duration::from_secs(duration.unwrap_or(config.load_testing.duration_secs)),
                profile,
                target_rps: *target_rps,
                progress_interval: Duration::from_secs(config.load_testing.progress_interval_secs),
            };
            if let Err(e) = worker::pace_per_worker(settings.workers, settings.target_rps) {
                setup_failure("Invalid --target-rps", e);
            }
            let test_name = name.clone().unwrap_or_else(|| format!("load_{}", profile.as_name()));
            let client = connect(&args, &config).await;
            run(client, data(&config), &test_name, &settings, &config, &args.report_dir).await
        }
        Command::Concurrency { duration } => {
            let client = connect(&args, &config).await;
            concurrency(client, duration.unwrap_or(config.load_testing.duration_secs), &config, &args.report_dir).await
        }
        Command::Burst { force } => {
            let client = connect(&args, &config).await;
            burst(client, data(&config), *force, &config, &args.report_dir).await
        }
        Command::Batch { sizes, measurements } => {
            let sizes = if sizes.is_empty() { config.performance.batch_sizes.clone() } else { sizes.clone() };
            let client = connect(&args, &config).await;
            batch(client, data(&config), &sizes, *measurements, &config, &args.report_dir).await
        }
    };

    process::exit(exit_code);
}

fn load_config(args: &Args) -> barrelmon_common::Result<HarnessConfig> {
    let mut config = HarnessConfig::load(&args.config)?;
    config.apply_env_overrides()?;
    if let Some(url) = &args.base_url {
        config.api.base_url = url.clone();
    }
    Ok(config)
}

fn data(config: &HarnessConfig) -> TestDataFactory {
    TestDataFactory::new(config.test_data.clone())
}

/// Build the API client, starting the stub server first when `--local` is set.
async fn connect(args: &Args, config: &HarnessConfig) -> ApiClient {
    let mut client_config = ClientConfig::from_api(&config.api);
    if args.local {
        client_config.base_url = barrelmon_stub_server::spawn_local(Duration::from_millis(args.latency_ms))
            .await
            .unwrap_or_else(|e| setup_failure("Failed to start stub server", e));
        println!("Stub server ready:  {}", client_config.base_url);
    }
    ApiClient::new(client_config)
}

async fn run(
    client: ApiClient,
    data: TestDataFactory,
    test_name: &str,
    settings: &LoadSettings,
    config: &HarnessConfig,
    report_dir: &Path,
) -> i32 {
    println!(
        "Running {}s {} workload with {} workers against {}",
        settings.duration.as_secs(),
        settings.profile.as_name(),
        settings.workers,
        client.config.base_url,
    );

    let outcome = worker::run(client, data, test_name, settings)
        .await
        .unwrap_or_else(|e| setup_failure("Failed to start load run", e));

    print_report(&outcome.report, Some(&outcome.concurrency), &config.performance.thresholds);
    persist(&outcome.report, report_dir);
    Verdict::evaluate(&outcome.report, &config.performance.thresholds).exit_code()
}

async fn concurrency(client: ApiClient, duration_secs: u64, config: &HarnessConfig, report_dir: &Path) -> i32 {
    let Some(profile) = WorkloadProfile::from_name(&config.load_testing.workload) else {
        setup_failure("Unknown workload", &config.load_testing.workload);
    };
    let thresholds = &config.performance.thresholds;
    let mut verdict = Verdict::default();

    for &users in &config.performance.concurrent_users {
        let settings = LoadSettings {
            workers: users.max(1),
            duration: Duration::from_secs(duration_secs),
            profile,
            target_rps: None,
            progress_interval: Duration::from_secs(config.load_testing.progress_interval_secs),
        };
        let test_name = format!("concurrent_{users}_users");
        println!("Running {duration_secs}s {} workload with {users} concurrent users", profile.as_name());
        let outcome = worker::run(client.clone(), data(config), &test_name, &settings)
            .await
            .unwrap_or_else(|e| setup_failure("Failed to start load run", e));
        print_report(&outcome.report, Some(&outcome.concurrency), thresholds);
        println!();
        persist(&outcome.report, report_dir);
        verdict = verdict.combine(Verdict::evaluate(&outcome.report, thresholds));
    }
    verdict.exit_code()
}

async fn burst(client: ApiClient, data: TestDataFactory, force: bool, config: &HarnessConfig, report_dir: &Path) -> i32 {
    let ddos = &config.ddos_protection;
    if !ddos.enabled && !force {
        println!("Burst testing disabled in configuration (ddos_protection.enabled); pass --force to run anyway");
        return 0;
    }
    if ddos.rate_limit_tests.is_empty() {
        println!("No burst tests configured");
        return 0;
    }

    let mut verdict = Verdict::default();
    for test in &ddos.rate_limit_tests {
        println!("Burst {}: {} rps for {}s", test.name, test.requests_per_second, test.duration_secs);
        let report = run_burst(&client, &data, test).await;
        print_report(&report, None, &config.performance.thresholds);
        println!();
        persist(&report, report_dir);
        verdict = verdict.combine(Verdict::evaluate(&report, &config.performance.thresholds));
    }
    verdict.exit_code()
}

async fn batch(
    client: ApiClient,
    data: TestDataFactory,
    sizes: &[usize],
    measurements: bool,
    config: &HarnessConfig,
    report_dir: &Path,
) -> i32 {
    let client = Arc::new(client);
    let thresholds = &config.performance.thresholds;
    let mut verdict = Verdict::default();

    for &size in sizes {
        let outcome = if measurements {
            run_batch_measurements(client.clone(), &data, size)
                .await
                .unwrap_or_else(|e| setup_failure("Failed to create barrels for measurement batch", e))
        } else {
            run_batch(client.clone(), &data, size).await
        };
        print_report(&outcome.report, None, thresholds);
        println!("Created:               {}/{} ({:.1}%)", outcome.created, outcome.requested, outcome.creation_rate());
        println!();
        persist(&outcome.report, report_dir);
        verdict = verdict.combine(Verdict::evaluate(&outcome.report, thresholds));
    }
    verdict.exit_code()
}

fn compare(report_dir: &Path, filter: Option<&str>) -> i32 {
    let records = store::load_reports(report_dir).unwrap_or_else(|e| setup_failure("Failed to read reports", e));
    if records.is_empty() {
        println!("No reports found in {}", report_dir.display());
        return 0;
    }
    let comparison = benchmark::compare(&records, filter, chrono::Utc::now());
    println!("{}", render_comparison(&comparison));
    match benchmark::write_comparison(&comparison, &benchmark::benchmark_dir(report_dir)) {
        Ok(path) => println!("Comparison written to {}", path.display()),
        Err(e) => setup_failure("Failed to write comparison", e),
    }
    0
}

fn persist(report: &PerformanceReport, report_dir: &Path) {
    match store::write_json_report(report, report_dir, None) {
        Ok(path) => println!("Report written to {}", path.display()),
        Err(e) => setup_failure("Failed to write report", e),
    }
}

fn setup_failure(context: &str, error: impl std::fmt::Display) -> ! {
    eprintln!("{context}: {error}");
    process::exit(EXIT_SETUP_FAILURE);
}
