use crate::captcha::CaptchaError;
use async_trait::async_trait;
use std::num::ParseIntError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The enrollment system rejected the request sequence; the session has
    /// to be rebuilt from login.
    #[error("course system entered invalid state")]
    BrokenState,

    #[error("Unexpected page: {what} not found")]
    UnexpectedPage { what: &'static str },

    #[error("Login failed after {attempts} attempts")]
    LoginExhausted { attempts: u32 },

    #[error("Query for course {course} failed after {attempts} attempts")]
    QueryExhausted { course: String, attempts: u32 },

    #[error("Captcha error: {0}")]
    Captcha(#[from] CaptchaError),

    #[error("Invalid seat count: {0}")]
    ParseCount(#[from] ParseIntError),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

pub type CrawlerResult<T> = Result<T, CrawlerError>;

/// Source of seat availability for a course serial number
#[async_trait]
pub trait CourseAvailability: Send {
    async fn has_vacancy(&mut self, course_id: &str) -> CrawlerResult<bool>;

    fn provider_name(&self) -> &'static str;
}
