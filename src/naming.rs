use chrono::{DateTime, Local};

use crate::config::Recipient;

pub const EMAIL_PREFIX: &str = "sm-email";
pub const LOG_PREFIX: &str = "sm-log";
pub const CAMPAIGN_PREFIX: &str = "sm-campaign";

pub const EMAIL_EXTENSION: &str = ".md";
pub const LOG_EXTENSION: &str = ".jsonl";

pub const OUTPUT_DIR: &str = "output";
pub const LOGS_DIR: &str = "logs";
pub const ARCHIVE_DIR: &str = "archive";

/// Lowercase ASCII slug safe for use in file and directory names.
///
/// Runs of whitespace, punctuation, and non-ASCII characters collapse into a
/// single `-`. Keeping the slug ASCII-only makes filenames byte-identical
/// across filesystems with different unicode normalization. Empty or
/// fully-unsanitizable input yields an empty string rather than an error.
pub fn sanitize_name(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Second-precision timestamp used as the correlation key between a campaign
/// directory and the files inside it. Callers compute this once per logical
/// operation and pass the same value to every name function.
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

pub fn timestamp_now() -> String {
    format_timestamp(Local::now())
}

/// `sm-email-<timestamp>-<name>-<company>.md`
///
/// Two recipients sharing name and company within the same second collide;
/// the caller overwrites in that case. Known limitation.
pub fn draft_file_name(recipient: &Recipient, timestamp: &str) -> String {
    format!(
        "{}-{}-{}-{}{}",
        EMAIL_PREFIX,
        timestamp,
        sanitize_name(&recipient.name),
        sanitize_name(&recipient.company),
        EMAIL_EXTENSION
    )
}

/// `sm-campaign-<timestamp>-<type>`
pub fn campaign_dir_name(campaign_type: &str, timestamp: &str) -> String {
    format!(
        "{}-{}-{}",
        CAMPAIGN_PREFIX,
        timestamp,
        sanitize_name(campaign_type)
    )
}

/// `sm-log-<timestamp>-<campaign-id>.jsonl`
pub fn log_file_name(campaign_id: &str, timestamp: &str) -> String {
    format!(
        "{}-{}-{}{}",
        LOG_PREFIX,
        timestamp,
        sanitize_name(campaign_id),
        LOG_EXTENSION
    )
}
