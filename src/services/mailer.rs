use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};
use tokio::fs;

use crate::{
    config::Config,
    error::{AppError, Result},
    services::charts::safe_file_stem,
};

/// An image referenced from the HTML body as `cid:{content_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineAttachment {
    pub content_id: String,
    pub content_type: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedMessage {
    pub user_id: String,
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<InlineAttachment>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, message: &ComposedMessage) -> Result<()>;
}

/// Hands messages to an HTTP mail relay as JSON.
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct RelayAttachment<'a> {
    content_id: &'a str,
    content_type: &'a str,
    filename: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    attachments: Vec<RelayAttachment<'a>>,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, client: Client) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn deliver(&self, message: &ComposedMessage) -> Result<()> {
        let mut attachments = Vec::with_capacity(message.attachments.len());
        for attachment in &message.attachments {
            let bytes = fs::read(&attachment.path).await.map_err(|e| {
                AppError::Delivery(format!(
                    "Could not read attachment {:?}: {}",
                    attachment.path, e
                ))
            })?;
            attachments.push(RelayAttachment {
                content_id: &attachment.content_id,
                content_type: &attachment.content_type,
                filename: attachment
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| attachment.content_id.clone()),
                content: STANDARD.encode(bytes),
            });
        }

        let payload = RelayMessage {
            from: &message.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            attachments,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("Mail relay unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Delivery(format!(
                "Mail relay rejected message ({}): {}",
                status, body
            )));
        }

        tracing::info!(user_id = %message.user_id, "Newsletter handed to mail relay");
        Ok(())
    }
}

/// Writes each message into a directory instead of sending it.
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn write(&self, message: &ComposedMessage) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;

        let stem = format!(
            "{}_{}",
            message.created_at.format("%Y%m%dT%H%M%S"),
            safe_file_stem(&message.user_id)
        );

        for attachment in &message.attachments {
            if let Some(name) = attachment.path.file_name() {
                let target = self.dir.join(format!("{}_{}", stem, name.to_string_lossy()));
                fs::copy(&attachment.path, target).await?;
            }
        }

        let envelope = serde_json::json!({
            "from": message.from,
            "to": message.to,
            "subject": message.subject,
            "attachments": message.attachments,
            "created_at": message.created_at,
        });
        fs::write(
            self.dir.join(format!("{}.json", stem)),
            serde_json::to_vec_pretty(&envelope)?,
        )
        .await?;

        let html_path = self.dir.join(format!("{}.html", stem));
        fs::write(&html_path, &message.html).await?;
        Ok(html_path)
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn deliver(&self, message: &ComposedMessage) -> Result<()> {
        let path = self
            .write(message)
            .await
            .map_err(|e| AppError::Delivery(format!("Could not write to outbox: {}", e)))?;

        tracing::info!(user_id = %message.user_id, "Newsletter written to {:?}", path);
        Ok(())
    }
}

/// Relay when one is configured, outbox directory otherwise.
pub fn from_config(config: &Config, client: Client) -> Arc<dyn Mailer> {
    match &config.mail_relay_url {
        Some(url) => Arc::new(HttpMailer::new(
            url.clone(),
            config.mail_relay_token.clone(),
            client,
        )),
        None => Arc::new(OutboxMailer::new(&config.mail_outbox_dir)),
    }
}
