pub mod commands;
pub mod config;
pub mod course;
pub mod discord;
pub mod store;
pub mod watcher;

use std::path::PathBuf;
use thiserror::Error;

pub use commands::CourseCommands;
pub use config::BotConfig;
pub use course::{CourseId, InvalidCourseId};
pub use store::SubscriptionStore;
pub use watcher::{Notifier, RoundSummary, Watcher};

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Store I/O error at {path}: {source}")]
    StoreIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Store is corrupted: {0}")]
    StoreFormat(#[from] serde_json::Error),

    #[error("Crawler error: {0}")]
    Crawler(#[from] crawler::CrawlerError),

    #[error("Watcher is not running")]
    WatcherStopped,

    #[error("Failed to notify user {user}: {reason}")]
    Notify { user: u64, reason: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

pub type BotResult<T> = Result<T, BotError>;
