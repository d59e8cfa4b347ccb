use crate::captcha::CaptchaSolver;
use crate::config::CrawlerConfig;
use crate::parse::{check_response, extract_count, extract_login_magic, extract_student_name};
use crate::provider::{CrawlerError, CrawlerResult};
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, REFERER};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

const APP_PATH: &str = "AasEnrollStudent";
const LOGIN_SUCCESS: &str = "success:true";
const FALLBACK_IMAGE_TYPE: &str = "image/jpeg";

/// A logged-in (or logging-in) browser session against the enrollment
/// system. The server tracks page order per session cookie, so every call
/// here must follow the sequence a browser would take.
pub struct NtnuSession {
    config: CrawlerConfig,
    root: String,
    client: reqwest::Client,
    solver: CaptchaSolver,
}

impl NtnuSession {
    pub fn new(config: CrawlerConfig) -> CrawlerResult<Self> {
        config
            .validate()
            .map_err(|message| CrawlerError::InvalidConfig { message })?;

        let root = config.endpoint_root();
        let client = Self::build_client(&config)?;
        let solver_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let solver = CaptchaSolver::new(config.captcha_root(), solver_client);

        Ok(Self {
            config,
            root,
            client,
            solver,
        })
    }

    fn build_client(config: &CrawlerConfig) -> CrawlerResult<reqwest::Client> {
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::new(Jar::default()))
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()?;
        Ok(client)
    }

    fn url(&self, ctrl: &str) -> String {
        format!("{}/{}/{}", self.root, APP_PATH, ctrl)
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Drop every cookie by swapping in a client with an empty jar
    pub fn reset(&mut self) -> CrawlerResult<()> {
        self.client = Self::build_client(&self.config)?;
        Ok(())
    }

    pub async fn login_magic(&self) -> CrawlerResult<String> {
        let text = self
            .client
            .get(self.url("LoginCheckCtrl"))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        check_response(&text)?;
        extract_login_magic(&text)
    }

    pub async fn captcha(&self) -> CrawlerResult<String> {
        let res = self
            .client
            .get(self.url("RandImage"))
            .send()
            .await?
            .error_for_status()?;
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(FALLBACK_IMAGE_TYPE)
            .to_string();
        let image = res.bytes().await?;

        // Error pages come back as text instead of an image.
        if let Ok(text) = std::str::from_utf8(&image) {
            check_response(text)?;
        }

        Ok(self.solver.recognize(&image, &content_type).await?)
    }

    pub async fn login(&mut self) -> CrawlerResult<()> {
        let attempts = self.config.captcha_retry;
        for attempt in 1..=attempts {
            let magic = self.login_magic().await?;
            match self.captcha().await {
                Ok(answer) => {
                    let form = [
                        ("userid", self.config.account.as_str()),
                        ("password", self.config.password.as_str()),
                        ("checkTW", "1"),
                        ("validateCode", answer.as_str()),
                    ];
                    let result = self
                        .client
                        .post(self.url("LoginCheckCtrl"))
                        .header(REFERER, self.root.as_str())
                        .query(&[("action", "login"), ("id", magic.as_str())])
                        .form(&form)
                        .send()
                        .await?
                        .error_for_status()?
                        .text()
                        .await?;
                    if result.contains(LOGIN_SUCCESS) {
                        info!("Logged in to {} after {} attempt(s)", self.root, attempt);
                        return Ok(());
                    }
                    debug!("Login attempt {} rejected", attempt);
                }
                Err(CrawlerError::Captcha(e)) if e.is_recoverable() => {
                    debug!("Captcha attempt {} unreadable: {}", attempt, e);
                }
                Err(e) => return Err(e),
            }
            self.reset()?;
        }
        warn!("Giving up login after {} attempts", attempts);
        Err(CrawlerError::LoginExhausted { attempts })
    }

    /// Walk from the login result to the course query page
    pub async fn landing_page(&self) -> CrawlerResult<()> {
        let text = self
            .client
            .get(self.url("IndexCtrl"))
            .query(&[("language", "TW")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        check_response(&text)?;
        let name = extract_student_name(&text)?;
        trace!("Landing page for {}", name);

        let form = [
            ("userid", self.config.account.as_str()),
            ("stdName", name.as_str()),
            ("checkTW", "1"),
        ];
        self.client
            .post(self.url("LoginCtrl"))
            .header(REFERER, self.root.as_str())
            .form(&form)
            .send()
            .await?
            .error_for_status()?;

        for (ctrl, action) in [("EnrollCtrl", "go"), ("CourseQueryCtrl", "query")] {
            let text = self
                .client
                .get(self.url(ctrl))
                .query(&[("action", action)])
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            check_response(&text)?;
        }
        Ok(())
    }

    /// Number of not-full courses matching `course_id`
    pub async fn query_count(&self, course_id: &str) -> CrawlerResult<u32> {
        let form = [
            ("serialNo", course_id),
            ("notFull", "1"),
            ("action", "showGrid"),
            ("actionButton", "query"),
        ];
        let mut attempts = 0;
        loop {
            attempts += 1;
            trace!("Query {} attempt {}", course_id, attempts);
            let sent = self
                .client
                .post(self.url("CourseQueryCtrl"))
                .header(REFERER, self.root.as_str())
                .form(&form)
                .send()
                .await;
            match sent {
                Ok(resp) => {
                    let text = resp.error_for_status()?.text().await?;
                    check_response(&text)?;
                    if !text.trim().is_empty() {
                        return extract_count(&text);
                    }
                    debug!("Empty query response for {}", course_id);
                    if attempts > self.config.api_retry {
                        return Err(CrawlerError::QueryExhausted {
                            course: course_id.to_string(),
                            attempts,
                        });
                    }
                }
                Err(e) => {
                    warn!("Query request for {} failed: {}", course_id, e);
                    if attempts > self.config.api_retry {
                        return Err(e.into());
                    }
                }
            }
            sleep(self.config.retry_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_requires_valid_config() {
        let result = NtnuSession::new(CrawlerConfig::default());
        assert!(matches!(result, Err(CrawlerError::InvalidConfig { .. })));
    }

    #[test]
    fn test_session_urls() {
        let session = NtnuSession::new(CrawlerConfig::new("a", "b").with_subsite(2)).unwrap();
        assert_eq!(
            session.url("RandImage"),
            "https://cos2s.ntnu.edu.tw/AasEnrollStudent/RandImage"
        );
        assert_eq!(session.config().account, "a");
    }
}
