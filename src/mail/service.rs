use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, warn};

use crate::config::SmtpConfig;

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: String) -> anyhow::Result<()>;
}

/// SMTP-backed transport used in production.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .context("smtp relay config")?
            .credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ))
            .build();
        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid SMTP_FROM address: {e}"))?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: String) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid recipient {to}: {e}"))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;
        self.transport.send(message).await.context("smtp send")?;
        Ok(())
    }
}

/// Fire-and-forget dispatch: the send runs on its own task, failures are
/// logged and never reach the caller. The handle is returned for tests only.
pub fn dispatch(
    mailer: Arc<dyn MailTransport>,
    to: String,
    subject: &'static str,
    html: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match mailer.send(&to, subject, html).await {
            Ok(()) => debug!(to = %to, subject, "mail sent"),
            Err(e) => warn!(error = %e, to = %to, subject, "mail dispatch failed"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MailTransport for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _html: String) -> anyhow::Result<()> {
            self.sent.lock().await.push((to.into(), subject.into()));
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl MailTransport for FailingMailer {
        async fn send(&self, _to: &str, _subject: &str, _html: String) -> anyhow::Result<()> {
            anyhow::bail!("smtp unreachable")
        }
    }

    #[tokio::test]
    async fn dispatch_delivers_through_the_transport() {
        let mailer = Arc::new(RecordingMailer {
            sent: Mutex::new(Vec::new()),
        });
        dispatch(
            mailer.clone(),
            "a@x.com".into(),
            "hello",
            "<p>hi</p>".into(),
        )
        .await
        .unwrap();
        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("a@x.com".to_string(), "hello".to_string()));
    }

    #[tokio::test]
    async fn dispatch_swallows_transport_failure() {
        // The spawned task must finish cleanly even when the send fails.
        dispatch(
            Arc::new(FailingMailer),
            "a@x.com".into(),
            "hello",
            "<p>hi</p>".into(),
        )
        .await
        .unwrap();
    }
}
