use clap::{Parser, Subcommand};
use dotenv::dotenv;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::watch;

use leadline_rs::botapi::client::BotClient;
use leadline_rs::botapi::outbound::{Messenger, Notifier};
use leadline_rs::leadline::config::{Config, Messages};
use leadline_rs::leadline::handlers::{run_polling, Dispatcher};
use leadline_rs::leadline::reminder::ReminderScheduler;
use leadline_rs::leadline::server;
use leadline_rs::leadline::storage::{Buyer, SessionStore, SqliteStore};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot: long polling plus the reminder scheduler
    Bot,
    /// Serve the read-only admin analytics API
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
    /// Register a paid-traffic buyer and print the tracking deep link
    AddBuyer {
        /// Buyer display name
        #[arg(long)]
        name: String,
        /// Traffic source, e.g. facebook, google, propeller
        #[arg(long, default_value = "facebook")]
        source: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = Config::from_env()?;

    match args.command {
        Commands::Bot => run_bot(config).await?,
        Commands::Serve { port } => {
            let store: Arc<dyn SessionStore> =
                Arc::new(SqliteStore::connect(&config.database_url).await?);
            server::serve(store, port, config.stale_after).await?;
        }
        Commands::AddBuyer { name, source } => add_buyer(config, name, source).await?,
    }

    Ok(())
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn SessionStore> = Arc::new(SqliteStore::connect(&config.database_url).await?);
    let messages = Arc::new(Messages::load_or_default(config.messages_path.as_deref())?);
    let client = Arc::new(BotClient::new(&config.bot_token)?);

    let me = client.get_me().await?;
    log::info!(
        "authorized as @{}",
        me.username.as_deref().unwrap_or("unknown")
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Arc::new(ReminderScheduler::new(
        store.clone(),
        client.clone() as Arc<dyn Notifier>,
        messages.clone(),
        config.reminder_interval,
        config.stale_after,
    ));
    let scheduler_handle = scheduler.spawn(shutdown_rx.clone());

    let dispatcher = Dispatcher::new(
        store,
        client.clone() as Arc<dyn Messenger>,
        client.clone() as Arc<dyn Notifier>,
        messages,
        config.admin_chat_id,
    );

    log::info!("bot started");
    tokio::select! {
        result = run_polling(client, dispatcher, shutdown_rx) => result?,
        _ = tokio::signal::ctrl_c() => log::info!("interrupt received, shutting down"),
    }

    let _ = shutdown_tx.send(true);
    scheduler_handle.await.ok();
    Ok(())
}

async fn add_buyer(config: Config, name: String, source: String) -> anyhow::Result<()> {
    let store = SqliteStore::connect(&config.database_url).await?;
    let code = generate_buyer_code(&name);
    let buyer = Buyer {
        code: code.clone(),
        name,
        source,
        created_at: chrono::Utc::now(),
    };
    store.put_buyer(&buyer).await?;
    println!("Registered buyer code: {}", code);

    // Best effort: the deep link needs the bot's username.
    let username = match BotClient::new(&config.bot_token) {
        Ok(client) => client.get_me().await.ok().and_then(|me| me.username),
        Err(_) => None,
    };
    match username {
        Some(username) => println!(
            "Deep link: https://t.me/{}?start={}_{{click_id}}",
            username, code
        ),
        None => println!(
            "Deep link: https://t.me/<your-bot>?start={}_{{click_id}}",
            code
        ),
    }
    Ok(())
}

fn generate_buyer_code(name: &str) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let prefix: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect();
    let prefix = if prefix.is_empty() {
        "x".to_string()
    } else {
        prefix
    };
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect();
    format!("buyer_{}_{}", prefix, suffix)
}
