use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::naming;

/// Lifecycle of one campaign run.
///
/// `Error` is a one-way latch set the moment any error entry is logged; it is
/// the *provisional* value visible through [`CampaignLogger::provisional_status`]
/// and [`CampaignLogger::get_stats`] before finalization. [`CampaignLogger::finalize`]
/// recomputes the final status purely from the success/failure counts, so the
/// provisional latch and the finalized status can disagree (an error followed
/// by successes finalizes as `CompletedWithErrors`, not `Error`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Initialized,
    Running,
    Error,
    Completed,
    CompletedWithErrors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Info,
    Success,
    Warning,
    Error,
}

/// One line of the append-only JSONL stream. Never mutated after write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub message: String,
    pub campaign_id: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// Error or warning entry retained in the run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedIssue {
    pub timestamp: String,
    pub message: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub campaign_id: String,
    pub timestamp: String,
    pub environment: String,
}

/// Aggregate counters derived from the log entry stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Wall-clock run duration in milliseconds, set at finalize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    pub total_emails: u64,
    pub successful_sends: u64,
    pub failed_sends: u64,
    /// duration / successful_sends in milliseconds, 0 when nothing succeeded.
    pub average_send_time: f64,
    pub errors: Vec<RecordedIssue>,
    pub warnings: Vec<RecordedIssue>,
    pub last_email_sent: Option<String>,
    pub campaign_status: CampaignStatus,
    pub metadata: RunMetadata,
}

/// Result of finalizing a run: the sealed statistics plus where the summary
/// landed on disk.
#[derive(Debug, Clone)]
pub struct FinalizedRun {
    pub stats: RunStats,
    pub log_dir: PathBuf,
    pub summary_file: String,
}

#[derive(Debug, Clone)]
pub struct ArchivedLogs {
    pub archived_files: usize,
    pub archive_directory: PathBuf,
}

/// Per-campaign append-only event log with an end-of-run summary.
///
/// One logger owns one campaign's log stream and summary file; the stream is
/// opened by [`initialize`](Self::initialize) and guaranteed to be flushed on
/// every exit path (finalize, cleanup, or drop).
pub struct CampaignLogger {
    campaign_id: String,
    timestamp: String,
    log_file_name: String,
    base_dir: PathBuf,
    log_dir: PathBuf,
    writer: Option<BufWriter<File>>,
    start_time: DateTime<Utc>,
    stats: RunStats,
}

impl CampaignLogger {
    pub fn new(base_dir: impl Into<PathBuf>, campaign_id: &str) -> Self {
        let base_dir = base_dir.into();
        let timestamp = naming::timestamp_now();
        let log_file_name = naming::log_file_name(campaign_id, &timestamp);
        let log_dir = base_dir.join(naming::LOGS_DIR).join(campaign_id);
        let start_time = Utc::now();

        let environment =
            std::env::var("CAMPAIGN_ENV").unwrap_or_else(|_| "development".to_string());

        CampaignLogger {
            campaign_id: campaign_id.to_string(),
            timestamp: timestamp.clone(),
            log_file_name,
            base_dir,
            log_dir,
            writer: None,
            start_time,
            stats: RunStats {
                start_time: iso_timestamp(start_time),
                end_time: None,
                duration: None,
                total_emails: 0,
                successful_sends: 0,
                failed_sends: 0,
                average_send_time: 0.0,
                errors: Vec::new(),
                warnings: Vec::new(),
                last_email_sent: None,
                campaign_status: CampaignStatus::Initialized,
                metadata: RunMetadata {
                    campaign_id: campaign_id.to_string(),
                    timestamp,
                    environment,
                },
            },
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Create the log directory, open the append-only stream, and write the
    /// bootstrap entry. Propagates failure; nothing may be logged before
    /// this has completed.
    pub fn initialize(&mut self) -> Result<()> {
        fs::create_dir_all(&self.log_dir).with_context(|| {
            format!("failed to create log directory {}", self.log_dir.display())
        })?;

        let path = self.log_dir.join(&self.log_file_name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log stream {}", path.display()))?;
        self.writer = Some(BufWriter::new(file));

        // Key must not shadow LogEntry's own timestamp field: metadata is
        // flattened into the entry, and a duplicate key breaks reparsing.
        self.log(
            EntryKind::Info,
            "Logger initialized",
            json!({
                "runTimestamp": self.timestamp,
                "directory": self.log_dir.display().to_string(),
            }),
        )?;
        self.stats.campaign_status = CampaignStatus::Running;
        Ok(())
    }

    /// Append one entry and update the running counters.
    ///
    /// Calling before [`initialize`](Self::initialize) is a programmer error
    /// and fails hard. `metadata` must be a JSON object; anything else is
    /// recorded as an empty object.
    pub fn log(&mut self, kind: EntryKind, message: &str, metadata: Value) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .context("logger not initialized; call initialize() first")?;

        let metadata = match metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let entry = LogEntry {
            timestamp: iso_timestamp(Utc::now()),
            kind,
            message: message.to_string(),
            campaign_id: self.campaign_id.clone(),
            metadata,
        };

        // Counters update before the write so get_stats() never lags the
        // stream.
        match kind {
            EntryKind::Error => {
                self.stats.errors.push(RecordedIssue {
                    timestamp: entry.timestamp.clone(),
                    message: entry.message.clone(),
                    metadata: entry.metadata.clone(),
                });
                self.stats.failed_sends += 1;
                self.stats.campaign_status = CampaignStatus::Error;
            }
            EntryKind::Warning => {
                self.stats.warnings.push(RecordedIssue {
                    timestamp: entry.timestamp.clone(),
                    message: entry.message.clone(),
                    metadata: entry.metadata.clone(),
                });
            }
            EntryKind::Success => {
                self.stats.successful_sends += 1;
                self.stats.last_email_sent = Some(entry.timestamp.clone());
            }
            EntryKind::Info => {}
        }

        let line = serde_json::to_string(&entry).context("failed to encode log entry")?;
        writeln!(writer, "{line}").context("failed to append log entry")?;
        writer.flush().context("failed to flush log stream")?;
        Ok(())
    }

    /// The eager status latch as mutated by [`log`](Self::log). Valid at any
    /// time; may disagree with the status [`finalize`](Self::finalize)
    /// resolves (see [`CampaignStatus`]).
    pub fn provisional_status(&self) -> CampaignStatus {
        self.stats.campaign_status
    }

    /// Snapshot copy of the current counters.
    pub fn get_stats(&self) -> RunStats {
        self.stats.clone()
    }

    /// Seal the run: compute duration and averages, resolve the final status
    /// from the counts, write the summary file (and the error report when
    /// errors were recorded), and close the stream.
    pub fn finalize(&mut self) -> Result<FinalizedRun> {
        let end_time = Utc::now();
        let duration_ms = (end_time - self.start_time).num_milliseconds();
        self.stats.end_time = Some(iso_timestamp(end_time));
        self.stats.duration = Some(duration_ms);
        self.stats.total_emails = self.stats.successful_sends + self.stats.failed_sends;

        self.stats.average_send_time = if self.stats.successful_sends > 0 {
            duration_ms as f64 / self.stats.successful_sends as f64
        } else {
            0.0
        };

        // Final status comes from the counts alone; the eager Error latch
        // set by log() is deliberately not consulted here.
        if self.stats.failed_sends == 0 && self.stats.successful_sends > 0 {
            self.stats.campaign_status = CampaignStatus::Completed;
        } else if self.stats.failed_sends > 0 {
            self.stats.campaign_status = CampaignStatus::CompletedWithErrors;
        }

        let summary_file = self
            .log_file_name
            .replace(naming::LOG_EXTENSION, "-summary.json");
        let summary_path = self.log_dir.join(&summary_file);
        let summary = serde_json::to_string_pretty(&self.stats)
            .context("failed to encode run summary")?;
        fs::write(&summary_path, summary)
            .with_context(|| format!("failed to write summary {}", summary_path.display()))?;

        if !self.stats.errors.is_empty() {
            let error_file = self
                .log_file_name
                .replace(naming::LOG_EXTENSION, "-errors.json");
            let error_path = self.log_dir.join(&error_file);
            let report = serde_json::to_string_pretty(&self.stats.errors)
                .context("failed to encode error report")?;
            fs::write(&error_path, report).with_context(|| {
                format!("failed to write error report {}", error_path.display())
            })?;
        }

        self.close_stream()?;

        Ok(FinalizedRun {
            stats: self.stats.clone(),
            log_dir: self.log_dir.clone(),
            summary_file,
        })
    }

    /// Move every file of this campaign's log directory into
    /// `archive/logs/<campaign-id>/`.
    pub fn archive_logs(&self) -> Result<ArchivedLogs> {
        let archive_dir = self
            .base_dir
            .join(naming::ARCHIVE_DIR)
            .join(naming::LOGS_DIR)
            .join(&self.campaign_id);
        fs::create_dir_all(&archive_dir).with_context(|| {
            format!("failed to create archive directory {}", archive_dir.display())
        })?;

        let entries = fs::read_dir(&self.log_dir)
            .with_context(|| format!("failed to list log directory {}", self.log_dir.display()))?;

        let mut archived_files = 0;
        for entry in entries {
            let entry = entry.with_context(|| {
                format!("failed to list log directory {}", self.log_dir.display())
            })?;
            let target = archive_dir.join(entry.file_name());
            fs::rename(entry.path(), &target).with_context(|| {
                format!("failed to archive log file {}", entry.path().display())
            })?;
            archived_files += 1;
        }

        Ok(ArchivedLogs {
            archived_files,
            archive_directory: archive_dir,
        })
    }

    /// Close the stream if still open and delete the campaign's log
    /// directory. Missing directory is not an error.
    pub fn cleanup(&mut self) -> Result<()> {
        self.close_stream()?;
        match fs::remove_dir_all(&self.log_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to clean up log directory {}", self.log_dir.display())
            }),
        }
    }

    fn close_stream(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().context("failed to flush log stream")?;
        }
        Ok(())
    }
}

impl Drop for CampaignLogger {
    fn drop(&mut self) {
        // Flush on every exit path, including early-error unwinds.
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                log::warn!("failed to flush campaign log on drop: {e}");
            }
        }
    }
}

fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
