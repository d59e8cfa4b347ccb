pub mod captcha;
pub mod client;
pub mod config;
pub mod parse;
pub mod provider;
pub mod session;

pub use captcha::{CaptchaError, CaptchaSolver};
pub use client::CourseSystemClient;
pub use config::CrawlerConfig;
pub use provider::{CourseAvailability, CrawlerError, CrawlerResult};
pub use session::NtnuSession;

pub mod prelude {
    pub use crate::captcha::*;
    pub use crate::client::*;
    pub use crate::config::*;
    pub use crate::provider::*;
    pub use crate::session::*;
}
