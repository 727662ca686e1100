use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use satchel::{
    session_id, CollectorClient, PendingStore, RateLimiter, Recovery, Selection,
    SubmissionGuard, SubmissionRequest, SubmitConfig, Submitter,
};

#[derive(Parser)]
#[command(name = "satchel")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, env = "SATCHEL_DATA_DIR", default_value = "./data")]
    data_dir: String,
    #[arg(long, env = "SATCHEL_ENDPOINT")]
    endpoint: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a training-needs response to the collector
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        area: String,
        /// Course selection as COURSE=REASON (repeat up to 3 times)
        #[arg(long = "select", value_name = "COURSE=REASON")]
        selections: Vec<String>,
        #[arg(long, default_value = "")]
        comments: String,
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Re-drive recent failed submissions from the local store
    Recover,
    /// List submissions still held in the local store
    Pending,
}

fn parse_selections(raw: &[String]) -> Result<Vec<Selection>, String> {
    raw.iter()
        .map(|entry| match entry.split_once('=') {
            Some((course, reason)) => Ok(Selection {
                course: course.trim().to_string(),
                reason: reason.trim().to_string(),
            }),
            None => Err(format!(
                "invalid --select value '{}': expected COURSE=REASON",
                entry
            )),
        })
        .collect()
}

fn user_agent() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("satchel-cli/{} ({})", env!("CARGO_PKG_VERSION"), host)
}

async fn run_submit(
    config: &SubmitConfig,
    name: String,
    area: String,
    raw_selections: Vec<String>,
    comments: String,
    session: Option<String>,
) -> i32 {
    let selections = match parse_selections(&raw_selections) {
        Ok(selections) => selections,
        Err(msg) => {
            eprintln!("ERROR: {}", msg);
            return 2;
        }
    };

    let session = session.unwrap_or_else(session_id);
    let request = match SubmissionRequest::new(
        &name,
        &area,
        selections,
        &comments,
        &session,
        &user_agent(),
    ) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            return 2;
        }
    };

    let store = Arc::new(PendingStore::open(&config.data_dir));
    let mut limiter = RateLimiter::open(&config.data_dir);
    if let Err(err) = limiter.check() {
        eprintln!("ERROR: {}", err);
        return 2;
    }
    let mut guard = SubmissionGuard::new();
    if let Err(err) = guard.begin() {
        eprintln!("ERROR: {}", err);
        return 2;
    }

    let transport = match CollectorClient::from_config(config) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            guard.finish(false);
            eprintln!("ERROR: {}", err);
            return 2;
        }
    };

    let submitter = Submitter::new(store, transport, config.clone())
        .with_progress(Arc::new(|msg: &str| eprintln!("{}", msg)));

    match submitter.submit(request).await {
        Ok(receipt) => {
            guard.finish(true);
            limiter.record();
            println!(
                "Delivered {} after {} attempt(s)",
                receipt.id, receipt.attempts
            );
            0
        }
        Err(err) => {
            guard.finish(false);
            eprintln!("ERROR: {}", err);
            if err.is_exhaustion() {
                eprintln!("Your answers were saved locally and will be retried on the next run.");
            }
            1
        }
    }
}

async fn run_recover(config: &SubmitConfig) -> i32 {
    let store = Arc::new(PendingStore::open(&config.data_dir));
    let transport = match CollectorClient::from_config(config) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            eprintln!("ERROR: {}", err);
            return 2;
        }
    };
    let submitter = Submitter::new(store, transport, config.clone())
        .with_progress(Arc::new(|msg: &str| eprintln!("{}", msg)));

    let mut recovery = Recovery::new(&submitter);
    let report = recovery.sweep().await;
    println!(
        "Recovered {} | failed again {} | evicted {} | pruned {}",
        report.recovered.len(),
        report.refailed.len(),
        report.evicted,
        report.pruned
    );
    if report.refailed.is_empty() {
        0
    } else {
        1
    }
}

fn run_pending(config: &SubmitConfig) -> i32 {
    let store = PendingStore::open(&config.data_dir);
    let records = store.load();
    if records.is_empty() {
        println!("No pending submissions");
        return 0;
    }
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    for record in records {
        let age_secs = ((now_ms - record.created_at) / 1000).max(0);
        println!(
            "{}  {}  attempts={}  age={}s",
            record.id, record.status, record.attempts, age_secs
        );
    }
    0
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = SubmitConfig::from_env();
    config.data_dir = cli.data_dir.clone().into();
    if cli.endpoint.is_some() {
        config.endpoint = cli.endpoint.clone();
    }

    let code = match cli.command {
        Command::Submit {
            name,
            area,
            selections,
            comments,
            session_id,
        } => run_submit(&config, name, area, selections, comments, session_id).await,
        Command::Recover => run_recover(&config).await,
        Command::Pending => run_pending(&config),
    };
    if code != 0 {
        std::process::exit(code);
    }
}
