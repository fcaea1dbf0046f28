pub mod config;
pub mod generator;
pub mod logger;
pub mod mailer;
pub mod markdown;
pub mod naming;
pub mod runner;
pub mod storage;

pub use config::{CampaignConfig, Recipient, SmtpSettings};
pub use generator::DraftGenerator;
pub use logger::{CampaignLogger, CampaignStatus, EntryKind, RunStats};
pub use mailer::{Mailer, SmtpMailer};
pub use markdown::{format_draft, parse_draft, Draft, ParseError};
pub use storage::CampaignStorage;
