//! beacon-relay: send alarm events and all-clears from the command line.
//!
//! Reads recipient keys and relay settings from the environment (`.env`
//! is honoured), see `RelayConfig::from_env`.

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use beacon_core::config::{load_dotenv, redact_key};
use beacon_core::{AllClearNotice, NotificationEvent, RelayConfig};
use beacon_notify::{DeliveryOutcome, Relay};

// ── CLI ─────────────────────────────────────────────────────────────

/// Relay alarm notifications to the configured recipients.
#[derive(Parser, Debug)]
#[command(name = "beacon-relay", version, about)]
struct Cli {
    /// Config profile (overrides BEACON_PROFILE).
    #[arg(long, env = "BEACON_PROFILE", default_value = "")]
    profile: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one event at every trigger granularity.
    Event {
        #[arg(long)]
        name: String,
        #[arg(long)]
        level: String,
        /// Route to the announcement recipients.
        #[arg(long)]
        announcement: bool,
        #[arg(long)]
        value1: Option<String>,
        #[arg(long)]
        value2: Option<String>,
        #[arg(long)]
        value3: Option<String>,
    },
    /// Send an all-clear (suppressed within the window).
    AllClear {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
    /// Print the redacted configuration.
    Config,
}

fn print_outcome(outcome: &DeliveryOutcome) {
    let line = match &outcome.result {
        Ok(status) => serde_json::json!({
            "trigger": outcome.trigger,
            "key": redact_key(&outcome.key),
            "status": status,
            "duration_ms": outcome.duration_ms,
        }),
        Err(e) => serde_json::json!({
            "trigger": outcome.trigger,
            "key": redact_key(&outcome.key),
            "error": e.to_string(),
            "duration_ms": outcome.duration_ms,
        }),
    };
    println!("{line}");
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = RelayConfig::for_profile(&cli.profile);

    if let Command::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
        return Ok(());
    }

    config.log_summary();
    let Some(relay) = Relay::create(&config)? else {
        warn!("relay disabled (set RELAY_KEY), nothing sent");
        return Ok(());
    };

    match cli.command {
        Command::Event {
            name,
            level,
            announcement,
            value1,
            value2,
            value3,
        } => {
            let event = NotificationEvent {
                name: Some(name),
                level: Some(level),
                is_announcement: announcement,
                value1: value1.map(Into::into),
                value2: value2.map(Into::into),
                value3: value3.map(Into::into),
            };
            let report = relay.send_event_with(event, print_outcome).await?;
            info!(
                delivered = report.succeeded(),
                failed = report.failed(),
                "event relayed"
            );
            if !report.all_delivered() {
                anyhow::bail!("{} of {} deliveries failed", report.failed(), report.len());
            }
        }
        Command::AllClear { title, message } => {
            let notice = AllClearNotice { title, message };
            let status = relay.send_all_clear(Some(notice)).await?;
            println!("{}", serde_json::to_string(&status)?);
        }
        Command::Config => {}
    }

    Ok(())
}
