use clap::Parser;
use course_bot::discord::{self, DiscordNotifier};
use course_bot::{BotConfig, CourseCommands, SubscriptionStore, Watcher};
use crawler::CourseSystemClient;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BotConfig::parse();
    init_logging(config.log_json);
    config.validate()?;

    let store = Arc::new(SubscriptionStore::open(&config.db_path).await?);
    let (trigger, trigger_rx) = mpsc::channel(1);
    let commands = CourseCommands::new(store.clone(), trigger);
    let availability = CourseSystemClient::new(config.crawler_config())?;

    let mut client = discord::client(&config.discord_token, commands).await?;
    let notifier = DiscordNotifier::new(client.http.clone());
    let watcher = Watcher::new(store, availability, notifier, config.poll_interval());
    let watcher = tokio::spawn(watcher.run(trigger_rx));

    let shard_manager = client.shard_manager.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
        info!("Shutting down");
        shard_manager.shutdown_all().await;
    };
    let outcome = discord::run_until_shutdown(client.start(), shutdown).await;

    watcher.abort();
    if let Err(e) = &outcome {
        error!("Discord client stopped: {}", e);
    }
    outcome?;
    Ok(())
}
