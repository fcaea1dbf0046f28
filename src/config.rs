use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// One entry of the recipient list (`addresses.yml`). Immutable input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressBook {
    pub recipients: Vec<Recipient>,
}

/// Project-level prompt configuration (`project.yml`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub system_prompt: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "claude-3-opus-20240229".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

/// Per-mailing configuration (`mailing.yml`). The campaign name doubles as
/// the subject of every generated draft.
#[derive(Debug, Clone, Deserialize)]
pub struct MailingConfig {
    pub prompt: String,
    pub campaign: CampaignInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignInfo {
    pub name: String,
}

/// The three YAML files a generation run needs, loaded together.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    pub addresses: AddressBook,
    pub project: ProjectConfig,
    pub mailing: MailingConfig,
}

impl CampaignConfig {
    pub fn load(config_dir: &Path) -> anyhow::Result<Self> {
        Ok(CampaignConfig {
            addresses: read_yaml(&config_dir.join("addresses.yml"))?,
            project: read_yaml(&config_dir.join("project.yml"))?,
            mailing: read_yaml(&config_dir.join("mailing.yml"))?,
        })
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// SMTP credential profile, selected by the `--production` flag.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from_name: String,
    pub from_email: String,
    pub production: bool,
}

impl SmtpSettings {
    /// Read the sandbox (`SMTP_TEST_*`) or production (`SMTP_PROD_*`)
    /// profile from the environment. Missing variables are a configuration
    /// error raised before any work starts.
    pub fn from_env(production: bool) -> anyhow::Result<Self> {
        let prefix = if production { "SMTP_PROD" } else { "SMTP_TEST" };

        let missing: Vec<String> = ["HOST", "PORT", "USER", "PASS"]
            .iter()
            .map(|suffix| format!("{prefix}_{suffix}"))
            .filter(|var| std::env::var(var).is_err())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "missing required environment variables: {}",
                missing.join(", ")
            );
        }

        let port_var = format!("{prefix}_PORT");
        let port_raw = std::env::var(&port_var)?;
        let port: u16 = port_raw
            .parse()
            .with_context(|| format!("{port_var} is not a valid port: {port_raw}"))?;

        Ok(SmtpSettings {
            host: std::env::var(format!("{prefix}_HOST"))?,
            port,
            user: std::env::var(format!("{prefix}_USER"))?,
            pass: std::env::var(format!("{prefix}_PASS"))?,
            from_name: std::env::var("SMTP_FROM_NAME")
                .unwrap_or_else(|_| crate::mailer::SENDER_NAME.to_string()),
            from_email: std::env::var("SMTP_FROM_EMAIL")
                .unwrap_or_else(|_| crate::mailer::SENDER_EMAIL.to_string()),
            production,
        })
    }

    pub fn environment(&self) -> &'static str {
        if self.production {
            "production"
        } else {
            "sandbox"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_deserializes_with_optional_gender() {
        let yaml = r#"
recipients:
  - name: Jonney Stars
    email: info@starsmedia.com
    company: Stars Media IT GmbH
  - name: Jane Doe
    email: jane@example.com
    company: Example AG
    gender: female
"#;
        let book: AddressBook = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(book.recipients.len(), 2);
        assert_eq!(book.recipients[0].gender, None);
        assert_eq!(book.recipients[1].gender.as_deref(), Some("female"));
    }

    #[test]
    fn project_config_defaults_apply() {
        let config: ProjectConfig =
            serde_yaml::from_str("systemPrompt: You write concise outreach emails.\n").unwrap();
        assert_eq!(config.model, "claude-3-opus-20240229");
        assert_eq!(config.max_tokens, 1000);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn mailing_config_parses_campaign_name() {
        let yaml = r#"
prompt: "Write to ${recipient.name} at ${recipient.company}."
campaign:
  name: Q4 2024 Business Development
"#;
        let config: MailingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.campaign.name, "Q4 2024 Business Development");
    }
}
