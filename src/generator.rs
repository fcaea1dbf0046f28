use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{MailingConfig, ProjectConfig, Recipient};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Client for the external generative-text API. Failures propagate as
/// generic errors with no retry; a generation failure aborts the whole run.
pub struct DraftGenerator {
    client: reqwest::Client,
    api_key: String,
}

impl DraftGenerator {
    pub fn new(api_key: String) -> Self {
        DraftGenerator {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY must be set for draft generation")?;
        Ok(Self::new(api_key))
    }

    /// Draft one personalized email body for a recipient.
    pub async fn generate(
        &self,
        recipient: &Recipient,
        project: &ProjectConfig,
        mailing: &MailingConfig,
    ) -> Result<String> {
        let request = MessagesRequest {
            model: &project.model,
            max_tokens: project.max_tokens,
            temperature: project.temperature,
            system: &project.system_prompt,
            messages: vec![Message {
                role: "user",
                content: render_prompt(&mailing.prompt, recipient),
            }],
        };

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .context("text generation request failed")?
            .error_for_status()
            .context("text generation request rejected")?;

        let body: MessagesResponse = response
            .json()
            .await
            .context("failed to decode text generation response")?;

        let text = body
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .unwrap_or_default();
        if text.is_empty() {
            anyhow::bail!(
                "text generation returned no content for {}",
                recipient.email
            );
        }
        Ok(text)
    }
}

/// Substitute the `${recipient.*}` placeholders of the mailing prompt.
fn render_prompt(template: &str, recipient: &Recipient) -> String {
    template
        .replace("${recipient.name}", &recipient.name)
        .replace("${recipient.company}", &recipient.company)
}
