use crate::course::CourseId;
use crate::store::SubscriptionStore;
use crate::BotResult;
use async_trait::async_trait;
use crawler::CourseAvailability;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Delivers a vacancy message to a user
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user: u64, message: &str) -> BotResult<()>;
}

pub fn vacancy_message(course: &CourseId) -> String {
    format!("Course {} has a free seat now! Go enroll!", course)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoundSummary {
    pub checked: usize,
    pub open: usize,
    pub notified: usize,
    pub failed: usize,
}

/// Periodically checks every watched course and tells subscribers when a
/// seat frees up. A user hears about a course once per opening; when the
/// course fills up again the notification re-arms.
pub struct Watcher<A, N> {
    store: Arc<SubscriptionStore>,
    availability: A,
    notifier: N,
    interval: Duration,
    notified: HashSet<(CourseId, u64)>,
}

impl<A, N> Watcher<A, N>
where
    A: CourseAvailability,
    N: Notifier,
{
    pub fn new(store: Arc<SubscriptionStore>, availability: A, notifier: N, interval: Duration) -> Self {
        Self {
            store,
            availability,
            notifier,
            interval,
            notified: HashSet::new(),
        }
    }

    pub async fn run_round(&mut self) -> RoundSummary {
        let watched = self.store.watched_courses().await;
        self.notified.retain(|(course, user)| {
            watched
                .get(course)
                .is_some_and(|users| users.contains(user))
        });

        let mut summary = RoundSummary::default();
        for (course, users) in &watched {
            summary.checked += 1;
            match self.availability.has_vacancy(course.as_str()).await {
                Ok(true) => {
                    summary.open += 1;
                    let message = vacancy_message(course);
                    for user in users {
                        let key = (course.clone(), *user);
                        if self.notified.contains(&key) {
                            continue;
                        }
                        match self.notifier.notify(*user, &message).await {
                            Ok(()) => {
                                summary.notified += 1;
                                self.notified.insert(key);
                            }
                            Err(e) => warn!("Failed to notify {} about {}: {}", user, course, e),
                        }
                    }
                }
                Ok(false) => {
                    debug!("Course {} is full", course);
                    self.notified.retain(|(c, _)| c != course);
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        "Failed to query course {} via {}: {}",
                        course,
                        self.availability.provider_name(),
                        e
                    );
                }
            }
        }
        summary
    }

    /// Run rounds on every tick and on every trigger until the trigger
    /// channel closes
    pub async fn run(mut self, mut trigger: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Watcher started, polling every {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => debug!("Scheduled round"),
                received = trigger.recv() => match received {
                    Some(()) => {
                        info!("Forced round");
                        ticker.reset();
                    }
                    None => break,
                },
            }

            let summary = self.run_round().await;
            info!(
                "Round done: {} checked, {} open, {} notified, {} failed",
                summary.checked, summary.open, summary.notified, summary.failed
            );
        }
        info!("Watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BotError;
    use crawler::{CrawlerError, CrawlerResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedAvailability {
        open: Arc<Mutex<HashMap<String, bool>>>,
        broken: HashSet<String>,
    }

    #[async_trait]
    impl CourseAvailability for ScriptedAvailability {
        async fn has_vacancy(&mut self, course_id: &str) -> CrawlerResult<bool> {
            if self.broken.contains(course_id) {
                return Err(CrawlerError::BrokenState);
            }
            Ok(self
                .open
                .lock()
                .unwrap()
                .get(course_id)
                .copied()
                .unwrap_or(false))
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }

    #[derive(Default, Clone)]
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<(u64, String)>>>,
        unreachable: HashSet<u64>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, user: u64, message: &str) -> BotResult<()> {
            if self.unreachable.contains(&user) {
                return Err(BotError::Notify {
                    user,
                    reason: "DMs closed".to_string(),
                });
            }
            self.sent.lock().unwrap().push((user, message.to_string()));
            Ok(())
        }
    }

    fn id(raw: &str) -> CourseId {
        CourseId::parse(raw).unwrap()
    }

    async fn store_with(
        entries: &[(u64, &str)],
    ) -> (Arc<SubscriptionStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SubscriptionStore::open(dir.path()).await.unwrap());
        for (user, course) in entries {
            store.add(*user, id(course)).await.unwrap();
        }
        (store, dir)
    }

    #[tokio::test]
    async fn test_notifies_once_per_opening() {
        let (store, _dir) = store_with(&[(1, "1001"), (2, "1001"), (2, "2002")]).await;
        let availability = ScriptedAvailability::default();
        let open = availability.open.clone();
        open.lock().unwrap().insert("1001".to_string(), true);
        let notifier = RecordingNotifier::default();
        let sent = notifier.sent.clone();

        let mut watcher = Watcher::new(store, availability, notifier, Duration::from_secs(60));

        let summary = watcher.run_round().await;
        assert_eq!(
            summary,
            RoundSummary {
                checked: 2,
                open: 1,
                notified: 2,
                failed: 0
            }
        );
        assert_eq!(
            *sent.lock().unwrap(),
            vec![
                (1, vacancy_message(&id("1001"))),
                (2, vacancy_message(&id("1001")))
            ]
        );

        // Still open: nobody hears about it twice
        assert_eq!(watcher.run_round().await.notified, 0);

        // Fills up and reopens: notify again
        open.lock().unwrap().insert("1001".to_string(), false);
        assert_eq!(watcher.run_round().await.open, 0);
        open.lock().unwrap().insert("1001".to_string(), true);
        assert_eq!(watcher.run_round().await.notified, 2);
        assert_eq!(sent.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_resubscribing_rearms_notification() {
        let (store, _dir) = store_with(&[(1, "1001")]).await;
        let availability = ScriptedAvailability::default();
        availability
            .open
            .lock()
            .unwrap()
            .insert("1001".to_string(), true);
        let notifier = RecordingNotifier::default();
        let sent = notifier.sent.clone();

        let mut watcher = Watcher::new(store.clone(), availability, notifier, Duration::from_secs(60));
        assert_eq!(watcher.run_round().await.notified, 1);

        store.remove(1, &id("1001")).await.unwrap();
        assert_eq!(watcher.run_round().await.checked, 0);

        store.add(1, id("1001")).await.unwrap();
        assert_eq!(watcher.run_round().await.notified, 1);
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_round() {
        let (store, _dir) = store_with(&[(1, "1001"), (2, "2002"), (3, "2002")]).await;
        let mut availability = ScriptedAvailability::default();
        availability.broken.insert("1001".to_string());
        availability
            .open
            .lock()
            .unwrap()
            .insert("2002".to_string(), true);
        let mut notifier = RecordingNotifier::default();
        notifier.unreachable.insert(2);
        let sent = notifier.sent.clone();

        let mut watcher = Watcher::new(store, availability, notifier, Duration::from_secs(60));
        let summary = watcher.run_round().await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.open, 1);
        assert_eq!(summary.notified, 1);
        assert_eq!(*sent.lock().unwrap(), vec![(3, vacancy_message(&id("2002")))]);

        // The unreachable user is retried next round
        assert_eq!(watcher.run_round().await.notified, 0);
    }

    #[tokio::test]
    async fn test_run_stops_when_trigger_closes() {
        let (store, _dir) = store_with(&[]).await;
        let watcher = Watcher::new(
            store,
            ScriptedAvailability::default(),
            RecordingNotifier::default(),
            Duration::from_secs(60),
        );
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(watcher.run(rx));

        tx.send(()).await.unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
