//! Per-user course subscriptions.
//!
//! The whole table lives in memory behind a `RwLock` and is written through
//! to `<db_path>/user_courses.json` on every change. Writes go to a temporary
//! file that is flushed to disk and then renamed over the old one, so a crash
//! never leaves a partially written table behind.

use crate::course::CourseId;
use crate::{BotError, BotResult};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

const STORE_FILE: &str = "user_courses.json";

type Table = BTreeMap<u64, BTreeSet<CourseId>>;

pub struct SubscriptionStore {
    path: PathBuf,
    table: RwLock<Table>,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BotError + '_ {
    move |source| BotError::StoreIo {
        path: path.to_path_buf(),
        source,
    }
}

impl SubscriptionStore {
    /// Open the store under `dir`, creating the directory when missing
    pub async fn open(dir: &Path) -> BotResult<Self> {
        tokio::fs::create_dir_all(dir).await.map_err(io_error(dir))?;
        let path = dir.join(STORE_FILE);

        let table = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Table::new(),
            Err(e) => return Err(io_error(&path)(e)),
        };
        info!(
            "Opened subscription store {} ({} users)",
            path.display(),
            table.len()
        );

        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, table: &Table) -> BotResult<()> {
        let bytes = serde_json::to_vec_pretty(table)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(io_error(&tmp))?;
        file.write_all(&bytes).await.map_err(io_error(&tmp))?;
        file.sync_all().await.map_err(io_error(&tmp))?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(io_error(&self.path))?;
        debug!("Persisted {} users to {}", table.len(), self.path.display());
        Ok(())
    }

    /// Returns false when the user already had the course
    pub async fn add(&self, user: u64, course: CourseId) -> BotResult<bool> {
        let mut table = self.table.write().await;
        if table.get(&user).is_some_and(|set| set.contains(&course)) {
            return Ok(false);
        }

        let mut next = table.clone();
        next.entry(user).or_default().insert(course);
        self.persist(&next).await?;
        *table = next;
        Ok(true)
    }

    /// Returns false when the user did not have the course
    pub async fn remove(&self, user: u64, course: &CourseId) -> BotResult<bool> {
        let mut table = self.table.write().await;
        if !table.get(&user).is_some_and(|set| set.contains(course)) {
            return Ok(false);
        }

        let mut next = table.clone();
        if let Some(set) = next.get_mut(&user) {
            set.remove(course);
            if set.is_empty() {
                next.remove(&user);
            }
        }
        self.persist(&next).await?;
        *table = next;
        Ok(true)
    }

    /// Courses of `user`, sorted
    pub async fn list(&self, user: u64) -> Vec<CourseId> {
        let table = self.table.read().await;
        table
            .get(&user)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every watched course with its subscribers
    pub async fn watched_courses(&self) -> BTreeMap<CourseId, Vec<u64>> {
        let table = self.table.read().await;
        let mut watched: BTreeMap<CourseId, Vec<u64>> = BTreeMap::new();
        for (user, courses) in table.iter() {
            for course in courses {
                watched.entry(course.clone()).or_default().push(*user);
            }
        }
        watched
    }
}
