//! Extraction of values embedded in enrollment system pages.

use crate::provider::{CrawlerError, CrawlerResult};
use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

/// Marker the enrollment system prints when requests arrive out of order
pub const BROKEN_STATE_MARKER: &str = "不合法執行選課系統";

fn magic_regex() -> &'static Regex {
    static MAGIC: OnceLock<Regex> = OnceLock::new();
    MAGIC.get_or_init(|| Regex::new(r"url:'.+id='\s+\+\s+'([^']+)',?").expect("magic regex is valid"))
}

fn name_regex() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| {
        RegexBuilder::new(r"name: ?'stdName',(\r?\n.+)+ +value: '([^']+)'")
            .multi_line(true)
            .build()
            .expect("student name regex is valid")
    })
}

fn count_regex() -> &'static Regex {
    static COUNT: OnceLock<Regex> = OnceLock::new();
    COUNT.get_or_init(|| Regex::new(r#"['"]Count['"] *: *([0-9]+)"#).expect("count regex is valid"))
}

pub fn check_response(text: &str) -> CrawlerResult<()> {
    if text.contains(BROKEN_STATE_MARKER) {
        return Err(CrawlerError::BrokenState);
    }
    Ok(())
}

/// Session id the login form posts back, from the `LoginCheckCtrl` script
pub fn extract_login_magic(text: &str) -> CrawlerResult<String> {
    magic_regex()
        .captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(CrawlerError::UnexpectedPage { what: "login magic" })
}

/// Student name from the `stdName` field of the landing page form
pub fn extract_student_name(text: &str) -> CrawlerResult<String> {
    name_regex()
        .captures(text)
        .and_then(|cap| cap.get(2))
        .map(|m| m.as_str().to_string())
        .ok_or(CrawlerError::UnexpectedPage {
            what: "student name",
        })
}

/// Number of matching courses in a `showGrid` query result
pub fn extract_count(text: &str) -> CrawlerResult<u32> {
    let count = count_regex()
        .captures(text)
        .and_then(|cap| cap.get(1))
        .ok_or(CrawlerError::UnexpectedPage { what: "course count" })?;
    Ok(count.as_str().parse()?)
}
