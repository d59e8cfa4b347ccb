use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Enrollment subsite number, the `N` in `cosNs.ntnu.edu.tw`
    pub subsite: u32,
    /// Overrides the subsite derived endpoint root
    pub base_url: Option<String>,
    /// Root of the captcha OCR service
    pub captcha_url: String,
    pub account: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    /// Retries for course queries and session re-initialisations
    pub api_retry: u32,
    /// Login attempts, each with a fresh captcha
    pub captcha_retry: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            subsite: 4,
            base_url: None,
            captcha_url: "http://localhost:8080".to_string(),
            account: String::new(),
            password: String::new(),
            api_retry: 10,
            captcha_retry: 20,
            retry_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn with_subsite(mut self, subsite: u32) -> Self {
        self.subsite = subsite;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_captcha_url(mut self, captcha_url: impl Into<String>) -> Self {
        self.captcha_url = captcha_url.into();
        self
    }

    pub fn with_api_retry(mut self, api_retry: u32) -> Self {
        self.api_retry = api_retry;
        self
    }

    pub fn with_captcha_retry(mut self, captcha_retry: u32) -> Self {
        self.captcha_retry = captcha_retry;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Root URL of the enrollment system, without trailing slash
    pub fn endpoint_root(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://cos{}s.ntnu.edu.tw", self.subsite),
        }
    }

    pub fn captcha_root(&self) -> String {
        self.captcha_url.trim_end_matches('/').to_string()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.account.is_empty() {
            return Err("Account cannot be empty".to_string());
        }

        if self.password.is_empty() {
            return Err("Password cannot be empty".to_string());
        }

        for url in [Some(&self.captcha_url), self.base_url.as_ref()]
            .into_iter()
            .flatten()
        {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("URL must start with http:// or https://: {}", url));
            }
        }

        if self.captcha_retry == 0 {
            return Err("Captcha retry must be greater than 0".to_string());
        }

        if self.timeout.is_zero() {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}
