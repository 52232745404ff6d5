use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use etl_monitor::api::{self, middleware::SecurityConfig};
use etl_monitor::client::{EtlBackend, EtlClient};
use etl_monitor::config::MonitorConfig;
use etl_monitor::models::LogPage;
use etl_monitor::orchestrator::{
    DashboardSnapshot, Orchestrator, RunAllOutcome, RunStep, StopOutcome,
};
use etl_monitor::summary::SummaryService;

#[derive(Parser)]
#[command(name = "etlmon")]
#[command(about = "Trigger and monitor the CeLOE and Monev ETL jobs")]
struct Cli {
    /// JSON config file (default: <config dir>/etl-monitor/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the summary proxy server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Run CeLOE then Monev and follow both to completion
    RunAll {
        /// First day to extract (YYYY-MM-DD)
        #[arg(long)]
        start_date: String,

        /// Parallel extraction workers (1-10)
        #[arg(short, long, default_value = "4")]
        concurrency: u8,
    },
    /// Trigger the CeLOE job only
    RunCeloe {
        /// First day to extract (YYYY-MM-DD)
        #[arg(long)]
        start_date: String,

        /// Parallel extraction workers (1-10)
        #[arg(short, long, default_value = "4")]
        concurrency: u8,
    },
    /// Trigger the Monev job only
    RunMonev,
    /// Show the status of both jobs
    Status,
    /// Print recent log rows of one job as JSON
    Logs {
        job: Job,

        #[arg(long, default_value = "10")]
        limit: u32,

        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Stop every running pipeline process
    Stop,
    /// Refresh both jobs in the background and print changes until Ctrl-C
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum Job {
    Celoe,
    Monev,
}

/// Initialize tracing with output to stderr (for commands that print results) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "etl_monitor=debug,tower_http=debug".into()),
    );

    if use_stderr {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = !matches!(cli.command, None | Some(Commands::Serve { .. }));
    init_tracing(use_stderr);

    let config = MonitorConfig::load(cli.config.as_deref());
    let client = EtlClient::new(&config.backend_url, config.backend_token.clone());
    tracing::debug!("ETL backend at {}", client.base_url());

    match cli.command {
        Some(Commands::Serve { port, host }) => serve(&config, &host, port).await?,
        None => serve(&config, "127.0.0.1", 3000).await?,
        Some(Commands::RunAll {
            start_date,
            concurrency,
        }) => {
            let orchestrator = Orchestrator::new(Arc::new(client), config.poll);
            run_all(&orchestrator, &start_date, concurrency).await?;
        }
        Some(Commands::RunCeloe {
            start_date,
            concurrency,
        }) => {
            let orchestrator = Orchestrator::new(Arc::new(client), config.poll);
            let response = orchestrator.run_celoe(&start_date, concurrency).await?;
            println!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| "CeLOE ETL started".to_string())
            );
            if let Some(log_id) = response.log_id {
                println!("log id: {}", log_id);
            }
            print_snapshot(&orchestrator.snapshot());
        }
        Some(Commands::RunMonev) => {
            let orchestrator = Orchestrator::new(Arc::new(client), config.poll);
            let response = orchestrator.run_monev().await?;
            println!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| "Monev ETL started".to_string())
            );
            print_snapshot(&orchestrator.snapshot());
        }
        Some(Commands::Status) => {
            let (celoe, monev) = tokio::join!(client.celoe_status(), client.monev_status());
            let celoe = celoe?;
            let monev = monev?;
            print_celoe(&celoe);
            print_monev(&monev.status);
        }
        Some(Commands::Logs { job, limit, offset }) => {
            let page = LogPage { limit, offset };
            let json = match job {
                Job::Celoe => serde_json::to_string_pretty(&client.celoe_logs(page).await?)?,
                Job::Monev => {
                    serde_json::to_string_pretty(&client.monev_history(page).await?.data.logs)?
                }
            };
            println!("{}", json);
        }
        Some(Commands::Stop) => {
            let orchestrator = Orchestrator::new(Arc::new(client), config.poll);
            match orchestrator.stop().await? {
                StopOutcome::Stopped { stopped_count } => {
                    println!("Stopped {} pipeline process(es)", stopped_count);
                    print_snapshot(&orchestrator.snapshot());
                }
                StopOutcome::Refused { message } => anyhow::bail!(message),
            }
        }
        Some(Commands::Watch) => {
            let orchestrator = Orchestrator::new(Arc::new(client), config.poll);
            watch(&orchestrator).await;
        }
    }

    Ok(())
}

async fn serve(config: &MonitorConfig, host: &str, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting summary proxy on port {}", port);
    if config.mock_fallback {
        tracing::warn!("Mock fallback enabled: upstream failures are answered with mock data");
    }

    let app = api::create_router(
        SummaryService::from_config(config),
        SecurityConfig::from_config(config),
    );

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("Summary proxy listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_all(
    orchestrator: &Orchestrator,
    start_date: &str,
    concurrency: u8,
) -> anyhow::Result<()> {
    let mut updates = orchestrator.subscribe();

    match orchestrator.run_all(start_date, concurrency).await? {
        RunAllOutcome::Started { orchestration_id } => {
            println!(
                "Orchestration {} started",
                orchestration_id.as_deref().unwrap_or("-")
            );
        }
        RunAllOutcome::Rejected { message } => {
            for step in &orchestrator.snapshot().remote_steps {
                println!(
                    "  {} {} {}",
                    step.step.as_deref().unwrap_or("?"),
                    step.status.as_deref().unwrap_or("?"),
                    step.message.as_deref().unwrap_or("")
                );
            }
            anyhow::bail!("Orchestration rejected: {}", message);
        }
        RunAllOutcome::AlreadyRunning => {
            println!("An orchestration is already running");
            return Ok(());
        }
        RunAllOutcome::Cancelled => {
            println!("Orchestration stopped before it started");
            return Ok(());
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last = (RunStep::Idle, u32::MAX);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if (snapshot.step, snapshot.attempts) != last {
                    last = (snapshot.step, snapshot.attempts);
                    print_progress(&snapshot);
                }
                if snapshot.step.is_terminal() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                orchestrator.shutdown();
                println!("Interrupted; remote jobs keep running");
                return Ok(());
            }
        }
    }

    let snapshot = orchestrator.snapshot();
    print_snapshot(&snapshot);
    if snapshot.step == RunStep::Error {
        anyhow::bail!(snapshot
            .error
            .unwrap_or_else(|| "Orchestration failed".to_string()));
    }
    Ok(())
}

async fn watch(orchestrator: &Orchestrator) {
    let mut updates = orchestrator.subscribe();
    orchestrator.watch();
    print_snapshot(&orchestrator.refresh().await);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                print_progress(&snapshot);
            }
            _ = &mut ctrl_c => {
                orchestrator.shutdown();
                break;
            }
        }
    }
}

fn print_progress(snapshot: &DashboardSnapshot) {
    let celoe = snapshot
        .celoe
        .status
        .as_ref()
        .and_then(|s| s.status_code())
        .map(|c| c.as_str())
        .unwrap_or("-");
    let monev = snapshot
        .monev
        .status
        .as_ref()
        .map(|s| {
            if s.is_running {
                "running"
            } else {
                s.last_status().unwrap_or("-")
            }
        })
        .unwrap_or("-");
    println!(
        "[{}] attempt {} | celoe: {} | monev: {}",
        snapshot.step, snapshot.attempts, celoe, monev
    );
}

fn print_snapshot(snapshot: &DashboardSnapshot) {
    println!("step: {}", snapshot.step);
    if let Some(id) = &snapshot.orchestration_id {
        println!("orchestration: {}", id);
    }
    if let Some(status) = &snapshot.celoe.status {
        print_celoe(status);
    }
    if let Some(status) = &snapshot.monev.status {
        print_monev(status);
    }
    for (label, message) in [
        ("info", &snapshot.info),
        ("result", &snapshot.result),
        ("error", &snapshot.error),
    ] {
        if let Some(message) = message {
            println!("{}: {}", label, message);
        }
    }
}

fn print_celoe(status: &etl_monitor::models::CeloeStatusResponse) {
    let run = status.data.last_run.as_ref();
    let state = match status.status_code() {
        Some(code) => format!("{} [{}]", code.as_str(), code.code()),
        None => "no run".to_string(),
    };
    println!(
        "celoe: {} (rows: {})",
        state,
        run.and_then(|r| r.numrow)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    if let Some(watermark) = &status.data.watermark {
        println!(
            "  watermark: last {} / next {}",
            watermark.last_extracted_date.as_deref().unwrap_or("-"),
            watermark.next_extract_date.as_deref().unwrap_or("-")
        );
    }
}

fn print_monev(status: &etl_monitor::models::MonevStatus) {
    println!(
        "monev: {} (last run: {})",
        if status.is_running { "running" } else { "idle" },
        status.last_status().unwrap_or("none")
    );
}
