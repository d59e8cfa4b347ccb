use crate::{BotError, BotResult};
use clap::Parser;
use crawler::CrawlerConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read from `BOT_*` environment variables or flags
#[derive(Debug, Clone, Parser)]
#[command(name = "course-bot")]
#[command(about = "Discord bot watching NTNU courses for free seats")]
pub struct BotConfig {
    /// Enrollment system account (student ID)
    #[arg(long, env = "BOT_NTNU_ACCOUNT")]
    pub ntnu_account: String,

    /// Enrollment system password
    #[arg(long, env = "BOT_NTNU_PASSWORD", hide_env_values = true)]
    pub ntnu_password: String,

    /// Enrollment subsite, the N in cosNs.ntnu.edu.tw
    #[arg(long, env = "BOT_NTNU_SUBSITE", default_value_t = 4)]
    pub ntnu_subsite: u32,

    /// Root URL of the captcha OCR service
    #[arg(long, env = "BOT_CAPTCHA_URI", default_value = "http://localhost:8080")]
    pub captcha_service_uri: String,

    /// Retries for course queries and session re-initialisation
    #[arg(long, env = "BOT_NTNU_RETRY", default_value_t = 10)]
    pub api_retry: u32,

    /// Login attempts before giving up
    #[arg(long, env = "BOT_CAPTCHA_RETRY", default_value_t = 20)]
    pub captcha_retry: u32,

    /// Discord bot token
    #[arg(long, env = "BOT_DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: String,

    /// Directory holding the subscription database
    #[arg(long, env = "BOT_DB_PATH", default_value = "./db")]
    pub db_path: PathBuf,

    /// Seconds between scheduled availability checks
    #[arg(long, env = "BOT_POLL_INTERVAL", default_value_t = 300)]
    pub poll_interval_secs: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "BOT_LOG_JSON")]
    pub log_json: bool,
}

impl BotConfig {
    pub fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig::new(self.ntnu_account.clone(), self.ntnu_password.clone())
            .with_subsite(self.ntnu_subsite)
            .with_captcha_url(self.captcha_service_uri.clone())
            .with_api_retry(self.api_retry)
            .with_captcha_retry(self.captcha_retry)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn validate(&self) -> BotResult<()> {
        if self.discord_token.trim().is_empty() {
            return Err(BotError::InvalidConfig {
                message: "Discord token cannot be empty".to_string(),
            });
        }

        if self.poll_interval_secs == 0 {
            return Err(BotError::InvalidConfig {
                message: "Poll interval must be greater than 0".to_string(),
            });
        }

        self.crawler_config()
            .validate()
            .map_err(|message| BotError::InvalidConfig { message })
    }
}
