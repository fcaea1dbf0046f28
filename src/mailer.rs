use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use lettre::message::header::{Header, HeaderName, HeaderValue};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpSettings;
use crate::markdown::Draft;

pub const SENDER_NAME: &str = "Stars Media Events";
pub const SENDER_EMAIL: &str = "events@starsmedia.com";
pub const ORGANIZATION: &str = "Stars Media IT GmbH";
pub const CAMPAIGN_PREFIX: &str = "SM-EVENT";

/// Relay acknowledgement for one sent message.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message_id: String,
    pub campaign_id: String,
    pub from: String,
    pub response: String,
}

/// Seam between the send loop and the SMTP transport, so the loop can be
/// exercised without a relay.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, draft: &Draft) -> Result<SendOutcome>;
}

macro_rules! custom_header {
    ($name:ident, $header:literal) => {
        #[derive(Debug, Clone)]
        struct $name(String);

        impl Header for $name {
            fn name() -> HeaderName {
                HeaderName::new_from_ascii_str($header)
            }

            fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
                Ok(Self(s.to_string()))
            }

            fn display(&self) -> HeaderValue {
                HeaderValue::new(Self::name(), self.0.clone())
            }
        }
    };
}

custom_header!(XEnvironment, "X-Environment");
custom_header!(XOrganization, "X-Organization");
custom_header!(XCampaignId, "X-Campaign-ID");

/// SMTP relay wrapper. One instance per run; no retry, no pooling beyond
/// what the transport does internally.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    settings: SmtpSettings,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Result<Self> {
        log::info!(
            "SMTP configuration: host={} port={} user={}",
            settings.host,
            settings.port,
            settings.user
        );

        // The relay presents a self-signed certificate in the sandbox
        // profile, so certificate validation is disabled for both.
        let tls = TlsParameters::builder(settings.host.clone())
            .dangerous_accept_invalid_certs(true)
            .build()
            .context("failed to build TLS parameters")?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.port)
            .tls(Tls::Opportunistic(tls))
            .credentials(Credentials::new(
                settings.user.clone(),
                settings.pass.clone(),
            ))
            .build();

        Ok(SmtpMailer {
            transport,
            settings,
        })
    }

    /// Probe the relay before the send loop starts.
    pub async fn verify(&self) -> Result<()> {
        log::info!("Verifying SMTP connection...");
        let ok = self
            .transport
            .test_connection()
            .await
            .context("SMTP connection error")?;
        if !ok {
            anyhow::bail!("SMTP connection verification failed");
        }
        log::info!("SMTP connection successful");
        Ok(())
    }

    fn campaign_id() -> String {
        format!("{}-{}", CAMPAIGN_PREFIX, Local::now().format("%Y%m%d"))
    }

    fn message_id(&self, campaign_id: &str) -> String {
        let domain = self
            .settings
            .from_email
            .split_once('@')
            .map_or("localhost", |(_, domain)| domain);
        format!(
            "<{}.{}@{}>",
            campaign_id.to_lowercase(),
            Local::now().format("%Y%m%d%H%M%S%3f"),
            domain
        )
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, draft: &Draft) -> Result<SendOutcome> {
        let campaign_id = Self::campaign_id();
        let message_id = self.message_id(&campaign_id);

        let from_address = format!("{} <{}>", self.settings.from_name, self.settings.from_email);
        let from: Mailbox = from_address.parse().context("invalid sender address")?;
        let to: Mailbox = draft
            .recipient
            .email
            .parse()
            .with_context(|| format!("invalid recipient address {}", draft.recipient.email))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&draft.subject)
            .message_id(Some(message_id.clone()))
            .header(XEnvironment(self.settings.environment().to_string()))
            .header(XOrganization(ORGANIZATION.to_string()))
            .header(XCampaignId(campaign_id.clone()))
            .body(draft.content.clone())
            .context("failed to build email message")?;

        let response = self
            .transport
            .send(message)
            .await
            .with_context(|| format!("failed to send email to {}", draft.recipient.email))?;

        let response_text = format!(
            "{} {}",
            response.code(),
            response.message().collect::<Vec<_>>().join(" ")
        );

        Ok(SendOutcome {
            message_id,
            campaign_id,
            from: from_address,
            response: response_text,
        })
    }
}
