//! Operator CLI for the call cache: backfill, sync, stats, lookup.

use clap::{Parser, Subcommand};

use dealdesk::config::AppConfig;
use dealdesk::gong::client::GongClient;
use dealdesk::gong::query::{self, QueryOptions};
use dealdesk::gong::store::CacheStore;
use dealdesk::gong::sync::{BackfillOptions, SyncEngine};
use dealdesk::gong::transcripts::fetch_transcript_cached;

#[derive(Parser)]
#[command(name = "dealdesk", version, about = "Local call cache and account lookup")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull the last N months of calls into the local cache
    Backfill {
        /// Historical window in months (default from config)
        #[arg(long)]
        months: Option<u32>,
        /// Delay between page requests in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Pull calls since the last successful sync
    Sync,
    /// Show cache stats, or per-account stats when ACCOUNT is given
    Stats {
        account: Option<String>,
        /// Also match calls by participant email domain
        #[arg(long)]
        domain: Option<String>,
    },
    /// List cached calls for an account, most recent first
    Calls {
        account: String,
        /// Also match calls by participant email domain
        #[arg(long)]
        domain: Option<String>,
        /// Maximum number of calls to show
        #[arg(long)]
        max: Option<usize>,
    },
    /// Fetch one call's transcript (cached after first fetch)
    Transcript {
        call_id: String,
        /// Re-fetch even when a cached copy exists
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let store = CacheStore::new(&config.gong.cache_dir);

    match cli.command {
        Commands::Backfill { months, delay_ms } => {
            let client = connect(&config)?;
            let engine = SyncEngine::new(&client, &store, &config.gong);
            let result = engine.backfill(&BackfillOptions { months, delay_ms }).await?;
            println!(
                "Backfill complete: {} new, {} updated, {} total (synced at {})",
                result.new_calls, result.updated_calls, result.total_calls, result.synced_at
            );
        }
        Commands::Sync => {
            let client = connect(&config)?;
            let engine = SyncEngine::new(&client, &store, &config.gong);
            let result = engine.sync().await?;
            println!(
                "Sync complete: {} new, {} updated, {} total (synced at {})",
                result.new_calls, result.updated_calls, result.total_calls, result.synced_at
            );
        }
        Commands::Stats { account, domain } => {
            let index = store.load();
            match account {
                Some(account) => {
                    let options = QueryOptions {
                        max_results: None,
                        domain,
                    };
                    let calls = query::calls_for_account(&index, &account, &options);
                    println!("{}: {} cached calls", account, calls.len());
                    if let Some(latest) = calls.first() {
                        println!("  most recent: {} ({})", latest.scheduled, latest.title);
                    }
                }
                None => {
                    let stats = query::stats(&index, &config.gong.internal_domains);
                    println!("Total calls:      {}", stats.total_calls);
                    println!("Unique companies: {}", stats.unique_companies);
                    println!("Unique domains:   {}", stats.unique_domains);
                    println!("Last sync:        {}", stats.last_sync_at);
                    println!(
                        "Range:            {} .. {}",
                        stats.oldest_call.as_deref().unwrap_or("-"),
                        stats.newest_call.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Calls {
            account,
            domain,
            max,
        } => {
            let index = store.load();
            let options = QueryOptions {
                max_results: max,
                domain,
            };
            let calls = query::calls_for_account(&index, &account, &options);
            if calls.is_empty() {
                println!("No cached calls for \"{}\"", account);
            }
            for call in calls {
                let companies: Vec<&str> =
                    call.company_names.iter().map(String::as_str).collect();
                println!(
                    "{}  {}  [{}]  {}",
                    call.scheduled,
                    call.id,
                    companies.join(", "),
                    call.title
                );
            }
        }
        Commands::Transcript { call_id, force } => {
            let client = connect(&config)?;
            let transcript =
                fetch_transcript_cached(&client, &call_id, &store.transcripts_dir(), force).await?;
            match transcript {
                Some(t) => {
                    if let Some(summary) = &t.summary {
                        println!("Summary: {}\n", summary);
                    }
                    println!("{}", t.text);
                }
                None => println!("No transcript available for call {}", call_id),
            }
        }
    }

    Ok(())
}

fn connect(config: &AppConfig) -> Result<GongClient, Box<dyn std::error::Error>> {
    let credentials = dealdesk::gong::load_credentials()?;
    Ok(GongClient::new(credentials, config.gong.base_url.as_str()))
}
