use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracklink::config::Config;
use tracklink::storage::{SqliteStorage, Storage};
use tracklink::track::make_track_link;

#[derive(Parser)]
#[command(name = "tracklink-admin")]
#[command(about = "Tracklink database management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tracked links
    #[command(subcommand)]
    Link(LinkCommands),
    /// Click and referral statistics
    #[command(subcommand)]
    Stats(StatsCommands),
    /// Manage notification subscribers
    #[command(subcommand)]
    Subscribers(SubscriberCommands),
}

#[derive(Subcommand)]
enum LinkCommands {
    /// Register a destination URL as a tracked link
    Add {
        /// Destination URL
        url: String,
        /// Owning user id
        #[arg(long)]
        owner: i64,
        /// Optional display title
        #[arg(long, default_value = "")]
        title: String,
    },
    /// List a user's links, newest first
    List {
        #[arg(long)]
        owner: i64,
    },
    /// Change a link's title
    Retitle {
        /// Link id
        id: i64,
        /// New title
        title: String,
    },
}

#[derive(Subcommand)]
enum StatsCommands {
    /// Count clicks recorded against a link
    Clicks { link_id: i64 },
    /// Count referrals attributed to a user
    Referrals { user_id: i64 },
}

#[derive(Subcommand)]
enum SubscriberCommands {
    /// List all subscriber chat ids
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Link(LinkCommands::Add { url, owner, title }) => {
            let link_id = storage.create_link(&url, owner, &title).await?;
            let track_link = make_track_link(&config.base_url, link_id, None, None);
            println!("✓ Created link #{link_id}");
            println!("  {track_link}");
        }
        Commands::Link(LinkCommands::List { owner }) => {
            let links = storage.list_links_by_owner(owner).await?;
            if links.is_empty() {
                println!("No links found for owner {owner}.");
            } else {
                println!("{:<6} {:<50} {}", "ID", "Destination", "Title");
                println!("{}", "-".repeat(80));
                for link in links {
                    println!("{:<6} {:<50} {}", link.id, link.destination_url, link.title);
                }
            }
        }
        Commands::Link(LinkCommands::Retitle { id, title }) => {
            let updated = storage.update_link_title(id, &title).await?;
            if updated {
                println!("✓ Retitled link #{id}");
            } else {
                println!("⚠ No link with id {id}");
            }
        }
        Commands::Stats(StatsCommands::Clicks { link_id }) => {
            let count = storage.count_clicks(link_id).await?;
            println!("Link #{link_id}: {count} click(s)");
        }
        Commands::Stats(StatsCommands::Referrals { user_id }) => {
            let count = storage.count_referrals(user_id).await?;
            println!("User {user_id}: {count} referral(s)");
        }
        Commands::Subscribers(SubscriberCommands::List) => {
            let subscribers = storage.list_subscribers().await?;
            if subscribers.is_empty() {
                println!("No subscribers.");
            } else {
                for chat_id in subscribers {
                    println!("{chat_id}");
                }
            }
        }
    }

    Ok(())
}
