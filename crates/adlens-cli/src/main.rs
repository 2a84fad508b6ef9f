mod client;

use clap::{Parser, Subcommand};

use adlens_scraper::{orchestrator, PollConfig, RunEvent, TriggerMode};

use crate::client::{ApiClient, HttpStatusPoll};

#[derive(Debug, Parser)]
#[command(name = "adlens")]
#[command(about = "adlens command line interface")]
struct Cli {
    /// Base URL of the adlens server.
    #[arg(long, env = "ADLENS_SERVER_URL", default_value = "http://localhost:3000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Add brands (optional), trigger a scrape run, and watch it finish.
    Scrape {
        #[arg(long)]
        session_id: String,
        /// Ad-library URLs to register as brands before triggering.
        urls: Vec<String>,
    },
    /// Re-trigger a scrape for a session's existing brands and watch it.
    /// No wait ceiling — cancel with ctrl-c.
    Refresh {
        #[arg(long)]
        session_id: String,
    },
    /// Drive the paginated insights sync until every account is covered.
    SyncInsights {
        #[arg(long)]
        date_preset: Option<String>,
    },
    /// Manage tracked brands.
    Brands {
        #[command(subcommand)]
        command: BrandCommands,
    },
}

#[derive(Debug, Subcommand)]
enum BrandCommands {
    Add {
        #[arg(long)]
        session_id: String,
        url: String,
    },
    Rm {
        #[arg(long)]
        session_id: String,
        brand_id: i64,
    },
    Ls {
        #[arg(long)]
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let api = ApiClient::new(&cli.server)?;

    match cli.command {
        Commands::Scrape { session_id, urls } => {
            for url in &urls {
                let brand = api.add_brand(&session_id, url).await?;
                println!("added brand #{} \"{}\"", brand.id, brand.name);
            }
            let (run_id, targets) = api.trigger_scrape(&session_id).await?;
            println!("run {run_id} started for {targets} brand(s)");
            watch_run(api, session_id, run_id, TriggerMode::Fresh).await;
        }
        Commands::Refresh { session_id } => {
            let (run_id, targets) = api.trigger_scrape(&session_id).await?;
            println!("refresh run {run_id} started for {targets} brand(s)");
            watch_run(api, session_id, run_id, TriggerMode::ForceRefresh).await;
        }
        Commands::SyncInsights { date_preset } => {
            let mut offset = 0;
            loop {
                let page = api
                    .sync_insights_page(date_preset.as_deref(), offset)
                    .await?;
                println!(
                    "synced {} ad(s), next offset {}{}",
                    page.synced,
                    page.account_offset,
                    page.message
                        .as_deref()
                        .map(|m| format!(" — {m}"))
                        .unwrap_or_default()
                );
                if !page.has_more {
                    break;
                }
                offset = page.account_offset;
            }
        }
        Commands::Brands { command } => match command {
            BrandCommands::Add { session_id, url } => {
                let brand = api.add_brand(&session_id, &url).await?;
                println!("added brand #{} \"{}\"", brand.id, brand.name);
            }
            BrandCommands::Rm {
                session_id,
                brand_id,
            } => {
                api.delete_brand(&session_id, brand_id).await?;
                println!("brand #{brand_id} deactivated");
            }
            BrandCommands::Ls { session_id } => {
                for brand in api.list_brands(&session_id).await? {
                    println!(
                        "#{}\t{}\t{}\t{}",
                        brand.id,
                        if brand.is_active { "active" } else { "inactive" },
                        brand.name,
                        brand.ad_library_url
                    );
                }
            }
        },
    }

    Ok(())
}

/// Watches a run through the orchestrator, printing each state change.
async fn watch_run(api: ApiClient, session_id: String, run_id: String, mode: TriggerMode) {
    let poller = HttpStatusPoll::new(api, session_id);
    let mut handle = orchestrator::start(run_id, poller, mode, PollConfig::default());

    while let Some(event) = handle.next_event().await {
        match event {
            RunEvent::Polling => println!("waiting for the scrape to finish..."),
            RunEvent::Completed(ads) => {
                println!("completed: {} ad(s) ingested", ads.len());
                for ad in ads.iter().take(10) {
                    println!("  {}\treach {}\t{}", ad.page_name, ad.reach, ad.heading);
                }
            }
            RunEvent::Failed(message) => println!("scrape failed: {message}"),
            RunEvent::TimedOut => {
                println!("data is delayed — please retry in a few minutes");
            }
        }
    }
}
