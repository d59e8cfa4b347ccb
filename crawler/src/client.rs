use crate::config::CrawlerConfig;
use crate::provider::{CourseAvailability, CrawlerError, CrawlerResult};
use crate::session::NtnuSession;
use async_trait::async_trait;
use tracing::{info, warn};

/// Course availability backed by the NTNU enrollment system. The session is
/// established lazily and rebuilt whenever the server reports a broken state.
pub struct CourseSystemClient {
    session: NtnuSession,
    initialized: bool,
}

impl CourseSystemClient {
    pub fn new(config: CrawlerConfig) -> CrawlerResult<Self> {
        Ok(Self {
            session: NtnuSession::new(config)?,
            initialized: false,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Start a fresh session: clear cookies, log in, reach the query page
    pub async fn init(&mut self) -> CrawlerResult<()> {
        self.initialized = false;
        self.session.reset()?;
        self.session.login().await?;
        self.session.landing_page().await?;
        self.initialized = true;
        info!("Course system session ready");
        Ok(())
    }

    async fn ensure_initialized(&mut self) -> CrawlerResult<()> {
        if !self.initialized {
            self.init().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CourseAvailability for CourseSystemClient {
    async fn has_vacancy(&mut self, course_id: &str) -> CrawlerResult<bool> {
        self.ensure_initialized().await?;

        let max_reinits = self.session.config().api_retry;
        let mut reinits = 0;
        loop {
            match self.session.query_count(course_id).await {
                Ok(count) => return Ok(count > 0),
                Err(CrawlerError::BrokenState) => {
                    self.initialized = false;
                    if reinits >= max_reinits {
                        return Err(CrawlerError::BrokenState);
                    }
                    reinits += 1;
                    warn!(
                        "Course system state broken while querying {}, re-initialising ({}/{})",
                        course_id, reinits, max_reinits
                    );
                    self.init().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "ntnu"
    }
}
