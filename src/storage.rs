use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Recipient;
use crate::markdown::{self, Draft};
use crate::naming;

/// Location of a saved draft, as reported back to the caller.
#[derive(Debug, Clone)]
pub struct SavedDraft {
    pub directory: String,
    pub filename: String,
    pub full_path: PathBuf,
}

/// Persists and retrieves draft emails as markdown files under one campaign
/// directory per instance.
///
/// The campaign directory name is computed once at construction and frozen
/// for the lifetime of the instance. All operations assume single-process,
/// single-run-at-a-time usage of the directory.
pub struct CampaignStorage {
    base_dir: PathBuf,
    timestamp: String,
    campaign_dir: String,
}

impl CampaignStorage {
    pub fn new(base_dir: impl Into<PathBuf>, campaign_type: &str) -> Self {
        let timestamp = naming::timestamp_now();
        let campaign_dir = naming::campaign_dir_name(campaign_type, &timestamp);
        CampaignStorage {
            base_dir: base_dir.into(),
            timestamp,
            campaign_dir,
        }
    }

    pub fn campaign_directory(&self) -> &str {
        &self.campaign_dir
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    fn output_dir(&self) -> PathBuf {
        self.base_dir
            .join(naming::OUTPUT_DIR)
            .join(&self.campaign_dir)
    }

    fn archive_dir(&self) -> PathBuf {
        self.base_dir
            .join(naming::ARCHIVE_DIR)
            .join(&self.campaign_dir)
    }

    /// Write one formatted draft into the campaign directory, creating
    /// parent directories as needed. A name collision (same recipient name
    /// and company within the same second) silently overwrites.
    pub fn save(&self, recipient: &Recipient, content: &str) -> Result<SavedDraft> {
        let filename = naming::draft_file_name(recipient, &self.timestamp);
        let dir = self.output_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create campaign directory {}", dir.display()))?;

        let full_path = dir.join(&filename);
        fs::write(&full_path, content)
            .with_context(|| format!("failed to write draft {}", full_path.display()))?;

        Ok(SavedDraft {
            directory: self.campaign_dir.clone(),
            filename,
            full_path,
        })
    }

    /// Load every draft file (email prefix + `.md` extension) from an output
    /// folder. The list is eagerly materialized in directory listing order,
    /// which the filesystem does not guarantee to be sorted.
    ///
    /// One malformed draft fails the whole load; callers that want per-file
    /// isolation must filter beforehand.
    pub fn load_folder(base_dir: &Path, folder: &str) -> Result<Vec<Draft>> {
        let dir = base_dir.join(naming::OUTPUT_DIR).join(folder);
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("failed to load drafts from folder {folder}"))?;

        let mut drafts = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to list drafts in folder {folder}"))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(naming::EMAIL_PREFIX) || !name.ends_with(naming::EMAIL_EXTENSION)
            {
                continue;
            }

            let text = fs::read_to_string(entry.path())
                .with_context(|| format!("failed to read draft {name}"))?;
            let draft = markdown::parse_draft(&text)
                .with_context(|| format!("failed to parse draft {name}"))?;
            drafts.push(draft);
        }

        Ok(drafts)
    }

    /// Move one draft out of the campaign directory into the archive tree.
    pub fn archive(&self, filename: &str) -> Result<PathBuf> {
        let source = self.output_dir().join(filename);
        let archive_dir = self.archive_dir();
        fs::create_dir_all(&archive_dir).with_context(|| {
            format!("failed to create archive directory {}", archive_dir.display())
        })?;

        let target = archive_dir.join(filename);
        fs::rename(&source, &target)
            .with_context(|| format!("failed to archive draft {filename}"))?;
        Ok(target)
    }

    pub fn delete(&self, filename: &str) -> Result<()> {
        let path = self.output_dir().join(filename);
        fs::remove_file(&path).with_context(|| format!("failed to delete draft {filename}"))
    }

    /// Names of all `.md` files currently in the campaign directory.
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.output_dir();
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("failed to list drafts in {}", self.campaign_dir))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to list drafts in {}", self.campaign_dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(naming::EMAIL_EXTENSION) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Read and parse one draft from the campaign directory.
    pub fn get_content(&self, filename: &str) -> Result<Draft> {
        let path = self.output_dir().join(filename);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read draft {filename}"))?;
        markdown::parse_draft(&text).with_context(|| format!("failed to parse draft {filename}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::format_draft;
    use tempfile::TempDir;

    fn recipient(name: &str, company: &str) -> Recipient {
        Recipient {
            name: name.to_string(),
            email: format!("{}@example.com", naming::sanitize_name(name)),
            company: company.to_string(),
            gender: None,
        }
    }

    fn draft_for(r: &Recipient) -> Draft {
        Draft {
            recipient: r.clone(),
            subject: "Q4 2024 Business Development".to_string(),
            content: "Hello.".to_string(),
        }
    }

    #[test]
    fn save_reports_frozen_directory_and_writes_file() {
        let tmp = TempDir::new().unwrap();
        let storage = CampaignStorage::new(tmp.path(), "send");
        let r = recipient("Jonney Stars", "Stars Media IT GmbH");

        let saved = storage.save(&r, &format_draft(&draft_for(&r))).unwrap();

        assert_eq!(saved.directory, storage.campaign_directory());
        assert!(saved.directory.starts_with("sm-campaign-"));
        assert!(saved.filename.starts_with("sm-email-"));
        assert!(saved.filename.ends_with(".md"));
        assert!(saved.full_path.is_file());
    }

    #[test]
    fn save_overwrites_on_name_collision() {
        let tmp = TempDir::new().unwrap();
        let storage = CampaignStorage::new(tmp.path(), "send");
        let r = recipient("Jonney Stars", "Stars Media IT GmbH");

        let first = storage.save(&r, "first").unwrap();
        let second = storage.save(&r, "second").unwrap();

        assert_eq!(first.full_path, second.full_path);
        assert_eq!(fs::read_to_string(&second.full_path).unwrap(), "second");
    }

    #[test]
    fn load_folder_round_trips_saved_drafts() {
        let tmp = TempDir::new().unwrap();
        let storage = CampaignStorage::new(tmp.path(), "send");

        let recipients = [
            recipient("Jonney Stars", "Stars Media IT GmbH"),
            recipient("Jane Doe", "Example AG"),
            recipient("Max Mustermann", "Muster KG"),
        ];
        for r in &recipients {
            storage.save(r, &format_draft(&draft_for(r))).unwrap();
        }

        let drafts =
            CampaignStorage::load_folder(tmp.path(), storage.campaign_directory()).unwrap();
        assert_eq!(drafts.len(), 3);
        let mut emails: Vec<_> = drafts.iter().map(|d| d.recipient.email.clone()).collect();
        emails.sort();
        assert_eq!(
            emails,
            vec![
                "jane-doe@example.com",
                "jonney-stars@example.com",
                "max-mustermann@example.com"
            ]
        );
    }

    #[test]
    fn load_folder_skips_files_outside_naming_convention() {
        let tmp = TempDir::new().unwrap();
        let storage = CampaignStorage::new(tmp.path(), "send");
        let r = recipient("Jonney Stars", "Stars Media IT GmbH");
        storage.save(&r, &format_draft(&draft_for(&r))).unwrap();

        let dir = tmp
            .path()
            .join(naming::OUTPUT_DIR)
            .join(storage.campaign_directory());
        fs::write(dir.join("README.md"), "not a draft").unwrap();
        fs::write(dir.join("sm-email-notes.txt"), "wrong extension").unwrap();

        let drafts =
            CampaignStorage::load_folder(tmp.path(), storage.campaign_directory()).unwrap();
        assert_eq!(drafts.len(), 1);
    }

    #[test]
    fn one_malformed_draft_fails_the_whole_load() {
        let tmp = TempDir::new().unwrap();
        let storage = CampaignStorage::new(tmp.path(), "send");

        for r in [
            recipient("Jonney Stars", "Stars Media IT GmbH"),
            recipient("Jane Doe", "Example AG"),
            recipient("Max Mustermann", "Muster KG"),
        ] {
            storage.save(&r, &format_draft(&draft_for(&r))).unwrap();
        }
        let broken = recipient("Broken Entry", "Broken GmbH");
        storage.save(&broken, "## Empfänger\nno fields here\n").unwrap();

        let result = CampaignStorage::load_folder(tmp.path(), storage.campaign_directory());
        assert!(result.is_err(), "a malformed draft must fail the load");
    }

    #[test]
    fn load_folder_fails_for_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let result = CampaignStorage::load_folder(tmp.path(), "sm-campaign-00000000-000000-none");
        assert!(result.is_err());
    }

    #[test]
    fn list_archive_and_delete() {
        let tmp = TempDir::new().unwrap();
        let storage = CampaignStorage::new(tmp.path(), "send");

        let a = recipient("Jonney Stars", "Stars Media IT GmbH");
        let b = recipient("Jane Doe", "Example AG");
        let saved_a = storage.save(&a, &format_draft(&draft_for(&a))).unwrap();
        let saved_b = storage.save(&b, &format_draft(&draft_for(&b))).unwrap();

        assert_eq!(storage.list().unwrap().len(), 2);

        let archived = storage.archive(&saved_a.filename).unwrap();
        assert!(archived.is_file());
        assert!(!saved_a.full_path.exists());
        assert_eq!(storage.list().unwrap().len(), 1);

        storage.delete(&saved_b.filename).unwrap();
        assert!(storage.list().unwrap().is_empty());

        assert!(storage.delete("sm-email-missing.md").is_err());
    }

    #[test]
    fn get_content_parses_saved_draft() {
        let tmp = TempDir::new().unwrap();
        let storage = CampaignStorage::new(tmp.path(), "send");
        let r = recipient("Jonney Stars", "Stars Media IT GmbH");
        let draft = draft_for(&r);
        let saved = storage.save(&r, &format_draft(&draft)).unwrap();

        let loaded = storage.get_content(&saved.filename).unwrap();
        assert_eq!(loaded.recipient.email, r.email);
        assert_eq!(loaded.subject, draft.subject);
        assert_eq!(loaded.content, draft.content);
    }
}
