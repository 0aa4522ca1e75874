//! Command-line interface for leadmail
//!
//! - `send`: run a campaign over a CSV of leads
//! - `results`: browse sent results, toggle or sync replies
//! - `verify-relay`: check the SMTP relay settings without sending

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use leadmail::{Config, app, find_config_file, render};
use leadmail_campaign::ProgressEvent;
use leadmail_common::{PasswordGate, csv::parse_leads, logging};
use leadmail_store::Filter;

/// Personalised cold email campaigns over your own SMTP relay
#[derive(Parser, Debug)]
#[command(name = "leadmail")]
#[command(about = "Send personalised cold emails and track replies", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: $LEADMAIL_CONFIG, ./leadmail.config.ron,
    /// /etc/leadmail/leadmail.config.ron)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one email per lead, with a cooldown between sends
    Send {
        /// CSV with name, email and company columns
        #[arg(long)]
        leads: PathBuf,

        /// What the email should say
        #[arg(long, conflicts_with = "instruction_file")]
        instruction: Option<String>,

        /// Read the instruction from a file
        #[arg(long)]
        instruction_file: Option<PathBuf>,

        /// Operator password (default: $LEADMAIL_PASSWORD)
        #[arg(long)]
        password: Option<String>,

        /// Print a progress line every this many seconds of cooldown
        #[arg(long, default_value = "30")]
        tick_every: u64,
    },
    /// Sent results and replies
    Results {
        #[command(subcommand)]
        action: ResultsAction,
    },
    /// Connect to the relay, authenticate and disconnect
    VerifyRelay,
}

#[derive(Subcommand, Debug)]
enum ResultsAction {
    /// List sent results, newest first
    List {
        /// all, replied or no-reply
        #[arg(long, default_value = "all")]
        filter: Filter,

        /// Match name, company or email
        #[arg(long, default_value = "")]
        search: String,

        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Flip the replied flag of one result
    Toggle {
        /// Result ID
        id: String,
    },
    /// Check the inbox and mark leads that replied
    SyncReplies,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let config_path = find_config_file(cli.config.as_deref())?;
    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::Send {
            leads,
            instruction,
            instruction_file,
            password,
            tick_every,
        } => {
            let instruction = match (instruction, instruction_file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path).with_context(|| {
                    format!("Failed to read instruction from {}", path.display())
                })?,
                (None, None) => {
                    anyhow::bail!("Either --instruction or --instruction-file is required")
                }
            };
            let password = password.or_else(|| std::env::var("LEADMAIL_PASSWORD").ok());
            cmd_send(&config, &leads, &instruction, password.as_deref(), tick_every).await?;
        }
        Commands::Results { action } => match action {
            ResultsAction::List {
                filter,
                search,
                format,
            } => cmd_list(&config, filter, &search, format).await?,
            ResultsAction::Toggle { id } => cmd_toggle(&config, &id).await?,
            ResultsAction::SyncReplies => cmd_sync_replies(&config).await?,
        },
        Commands::VerifyRelay => cmd_verify_relay(&config).await?,
    }

    Ok(())
}

async fn cmd_send(
    config: &Config,
    leads_path: &Path,
    instruction: &str,
    password: Option<&str>,
    tick_every: u64,
) -> anyhow::Result<()> {
    let Some(password) = password else {
        anyhow::bail!("A password is required (--password or LEADMAIL_PASSWORD)");
    };
    if !PasswordGate::from_config(&config.auth).verify(password)? {
        anyhow::bail!("Incorrect password");
    }

    let csv = tokio::fs::read_to_string(leads_path)
        .await
        .with_context(|| format!("Failed to read leads from {}", leads_path.display()))?;
    let leads = parse_leads(&csv)?;

    let campaign = app::campaign(config)?;
    let mut handle = campaign.start_run(leads, instruction)?;
    let snapshots = campaign.subscribe();

    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                let run = snapshots.borrow().clone();
                if let Some(line) = render::event(&event, &run, tick_every) {
                    println!("{line}");
                }
                if matches!(event, ProgressEvent::Finished { .. }) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let run = campaign.snapshot();
                campaign.reset();
                println!("{}", render::interrupted(&run));
                println!("{}", render::summary(&run));
                return Ok(());
            }
        }
    }

    let run = handle.wait().await?;
    println!("{}", render::summary(&run));

    Ok(())
}

async fn cmd_list(
    config: &Config,
    filter: Filter,
    search: &str,
    format: Format,
) -> anyhow::Result<()> {
    let store = app::store(config);
    let records = store.query(filter, search).await?;
    let stats = store.stats().await?;

    match format {
        Format::Json => {
            let out = serde_json::json!({ "stats": stats, "results": records });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Text => {
            println!("{}\n", render::stats(&stats));
            println!("{}", render::results_table(&records, chrono::Utc::now()));
            println!("\nShowing {} of {} result(s)", records.len(), stats.total);
        }
    }

    Ok(())
}

async fn cmd_toggle(config: &Config, id: &str) -> anyhow::Result<()> {
    let record = app::store(config).toggle_replied(id).await?;
    println!(
        "{} <{}> marked {}",
        record.name,
        record.email,
        if record.replied { "replied" } else { "not replied" }
    );
    Ok(())
}

async fn cmd_sync_replies(config: &Config) -> anyhow::Result<()> {
    let store = app::store(config);
    let detector = app::reply_detector(config)?;

    let report = leadmail::sync_replies(store.as_ref(), &detector).await?;
    println!(
        "Checked {} address(es): {} replied, {} result(s) newly marked",
        report.checked, report.found, report.marked
    );
    Ok(())
}

async fn cmd_verify_relay(config: &Config) -> anyhow::Result<()> {
    let transport = app::transport(config)?;
    println!("Connecting to {} ...", config.relay.address());
    transport.verify().await?;
    println!("Relay OK: connected, authenticated and disconnected");
    Ok(())
}
