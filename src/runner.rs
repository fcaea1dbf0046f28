use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use crate::config::CampaignConfig;
use crate::generator::DraftGenerator;
use crate::logger::{CampaignLogger, EntryKind, FinalizedRun};
use crate::mailer::{Mailer, ORGANIZATION};
use crate::markdown::{self, Draft};
use crate::storage::{CampaignStorage, SavedDraft};

/// Fixed throttle between consecutive sends. A rate cap, not backpressure.
pub const DELAY_BETWEEN_EMAILS: Duration = Duration::from_secs(1);

/// Generate one draft per recipient and persist each to the campaign
/// directory.
///
/// Sequential by design. A generation failure propagates and stops the whole
/// run; this asymmetry with the partial-failure-tolerant send loop is
/// intentional.
pub async fn run_generation(
    base_dir: &Path,
    config: &CampaignConfig,
    generator: &DraftGenerator,
    campaign_type: &str,
) -> Result<Vec<SavedDraft>> {
    let storage = CampaignStorage::new(base_dir, campaign_type);
    log::info!(
        "Generating {} drafts into {}",
        config.addresses.recipients.len(),
        storage.campaign_directory()
    );

    let mut saved = Vec::with_capacity(config.addresses.recipients.len());
    for recipient in &config.addresses.recipients {
        let content = generator
            .generate(recipient, &config.project, &config.mailing)
            .await?;
        let draft = Draft {
            recipient: recipient.clone(),
            subject: config.mailing.campaign.name.clone(),
            content,
        };
        let result = storage.save(recipient, &markdown::format_draft(&draft))?;
        log::info!("Draft saved to {}", result.full_path.display());
        saved.push(result);
    }

    Ok(saved)
}

/// Load all drafts from an output folder and send them sequentially.
///
/// Per-email send failures are logged as `error` entries and the loop
/// continues; only infrastructure failures (unreadable folder, logger I/O)
/// abort the run. Finalizes the logger on the success path; the logger's
/// drop guard flushes the stream on early exits.
pub async fn run_send(
    base_dir: &Path,
    folder: &str,
    mailer: &dyn Mailer,
    logger: &mut CampaignLogger,
) -> Result<FinalizedRun> {
    logger.initialize()?;

    let drafts = CampaignStorage::load_folder(base_dir, folder)?;
    log::info!("Loaded {} drafts from folder {folder}", drafts.len());

    for (i, draft) in drafts.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(DELAY_BETWEEN_EMAILS).await;
        }
        send_one(mailer, draft, logger).await?;
    }

    logger.finalize()
}

async fn send_one(
    mailer: &dyn Mailer,
    draft: &Draft,
    logger: &mut CampaignLogger,
) -> Result<()> {
    match mailer.send(draft).await {
        Ok(outcome) => {
            log::info!("Email sent to {}", draft.recipient.email);
            logger.log(
                EntryKind::Success,
                "Email sent successfully",
                // "campaignId" is taken by the entry itself (the run's id);
                // the per-send header id goes under its own key.
                json!({
                    "messageId": outcome.message_id,
                    "sendCampaignId": outcome.campaign_id,
                    "from": outcome.from,
                    "recipient": draft.recipient.email,
                    "subject": draft.subject,
                    "response": outcome.response,
                    "organization": ORGANIZATION,
                }),
            )
        }
        Err(err) => {
            log::error!("Failed to send to {}: {err:#}", draft.recipient.email);
            logger.log(
                EntryKind::Error,
                "Failed to send email",
                json!({
                    "recipient": draft.recipient.email,
                    "error": format!("{err:#}"),
                    "organization": ORGANIZATION,
                }),
            )
        }
    }
}
