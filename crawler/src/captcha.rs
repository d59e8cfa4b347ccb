//! Client for the captcha OCR service.
//!
//! The enrollment login captcha is either an arithmetic expression such as
//! `3x4` or plain text. The OCR service returns several candidate readings;
//! the first one that parses as `digit op digit` wins and is evaluated,
//! otherwise the last reading is used verbatim.

use regex::Regex;
use serde::Deserialize;
use std::num::ParseIntError;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("service respond status: {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("no viable value")]
    NoCandidate,

    #[error("service response invalid")]
    Invalid,

    #[error("parse error: {0}")]
    ParseInt(#[from] ParseIntError),
}

impl CaptchaError {
    /// Errors caused by a bad reading, worth another login attempt with a
    /// fresh captcha
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CaptchaError::NoCandidate | CaptchaError::Invalid | CaptchaError::ParseInt(_)
        )
    }
}

#[derive(Debug, Deserialize)]
struct SolveResponse {
    response: Vec<String>,
}

fn expression_regex() -> &'static Regex {
    static EXPRESSION: OnceLock<Regex> = OnceLock::new();
    EXPRESSION.get_or_init(|| {
        Regex::new(r"([0-9])([+x\-])([0-9])").expect("captcha expression regex is valid")
    })
}

pub struct CaptchaSolver {
    endpoint_root: String,
    client: reqwest::Client,
}

impl CaptchaSolver {
    pub fn new(endpoint_root: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint_root: endpoint_root.into(),
            client,
        }
    }

    /// Send the raw captcha image to `/solve` and pick an answer
    pub async fn recognize(&self, image: &[u8], content_type: &str) -> Result<String, CaptchaError> {
        let res = self
            .client
            .post(format!("{}/solve", self.endpoint_root))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(image.to_vec())
            .send()
            .await?;

        if res.status() != reqwest::StatusCode::OK {
            return Err(CaptchaError::HttpStatus(res.status()));
        }

        let body: SolveResponse = res.json().await?;
        debug!("Captcha candidates: {:?}", body.response);
        Self::process(body.response)
    }

    /// Choose the answer among OCR candidates
    pub fn process(candidates: Vec<String>) -> Result<String, CaptchaError> {
        let mut last = None;
        for candidate in candidates {
            let Some(cap) = expression_regex().captures(&candidate) else {
                last = Some(candidate);
                continue;
            };

            let lhs: i32 = cap.get(1).ok_or(CaptchaError::Invalid)?.as_str().parse()?;
            let op = cap.get(2).ok_or(CaptchaError::Invalid)?.as_str();
            let rhs: i32 = cap.get(3).ok_or(CaptchaError::Invalid)?.as_str().parse()?;

            return match op {
                "+" => Ok((lhs + rhs).to_string()),
                "-" => Ok((lhs - rhs).to_string()),
                "x" => Ok((lhs * rhs).to_string()),
                _ => Err(CaptchaError::Invalid),
            };
        }
        last.ok_or(CaptchaError::NoCandidate)
    }
}
