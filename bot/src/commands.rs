//! Chat command handlers, independent of the chat transport. Each handler
//! returns the reply text to send back to the invoking user.

use crate::course::CourseId;
use crate::store::SubscriptionStore;
use crate::{BotError, BotResult};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

pub const FORCE_UPDATE_REPLY: &str =
    "Initiate force update...\n (Do not abuse and spam this command!)";
pub const EMPTY_LIST_REPLY: &str = "No course registered!";

#[derive(Clone)]
pub struct CourseCommands {
    store: Arc<SubscriptionStore>,
    trigger: mpsc::Sender<()>,
}

impl CourseCommands {
    pub fn new(store: Arc<SubscriptionStore>, trigger: mpsc::Sender<()>) -> Self {
        Self { store, trigger }
    }

    pub fn store(&self) -> &SubscriptionStore {
        &self.store
    }

    pub async fn add_course(&self, user: u64, raw: &str) -> BotResult<String> {
        let course = match CourseId::parse(raw) {
            Ok(course) => course,
            Err(e) => return Ok(e.to_string()),
        };
        if self.store.add(user, course.clone()).await? {
            info!("User {} subscribed to {}", user, course);
        }
        Ok(format!("Course added for {}.", course))
    }

    pub async fn list_course(&self, user: u64) -> BotResult<String> {
        let courses = self.store.list(user).await;
        if courses.is_empty() {
            return Ok(EMPTY_LIST_REPLY.to_string());
        }
        let lines: Vec<&str> = courses.iter().map(CourseId::as_str).collect();
        Ok(format!("Current registered courses:\n{}", lines.join("\n")))
    }

    pub async fn remove_course(&self, user: u64, raw: &str) -> BotResult<String> {
        let course = match CourseId::parse(raw) {
            Ok(course) => course,
            Err(e) => return Ok(e.to_string()),
        };
        if self.store.remove(user, &course).await? {
            info!("User {} unsubscribed from {}", user, course);
        }
        Ok(format!("Course removed for {}.", course))
    }

    /// Ask the watcher for an immediate round. A round that is already
    /// queued absorbs the request.
    pub fn force_update(&self) -> BotResult<String> {
        match self.trigger.try_send(()) {
            Ok(()) => debug!("Force update queued"),
            Err(TrySendError::Full(())) => debug!("Force update already pending"),
            Err(TrySendError::Closed(())) => return Err(BotError::WatcherStopped),
        }
        Ok(FORCE_UPDATE_REPLY.to_string())
    }
}
