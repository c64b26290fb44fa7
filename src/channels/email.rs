//! Email inbox over IMAP+TLS: reads unread queries and flags them.

use std::io::{Read, Write};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::email_types::{InboundMessage, MessageHandle};
use crate::channels::imap::{self, ImapSession};
use crate::channels::traits::{Inbox, InboxSession};
use crate::error::MailboxError;

// ── Configuration ───────────────────────────────────────────────────

/// Mail server settings shared by the IMAP inbox and the SMTP sender.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Mailbox address; also the IMAP/SMTP login and the reply `From`.
    pub address: String,
    pub password: SecretString,
}

// ── Inbox ───────────────────────────────────────────────────────────

/// IMAP inbox. Every `connect()` opens a fresh TLS connection.
pub struct ImapInbox {
    config: EmailConfig,
}

impl ImapInbox {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Inbox for ImapInbox {
    async fn connect(&self) -> Result<Box<dyn InboxSession>, MailboxError> {
        let host = self.config.imap_host.clone();
        let port = self.config.imap_port;
        let username = self.config.address.clone();
        let password = self.config.password.clone();

        let session = tokio::task::spawn_blocking(move || {
            let mut session = imap::connect_tls(&host, port)?;
            session
                .login(&username, password.expose_secret())
                .map_err(|e| MailboxError::Connect {
                    host: format!("{host}:{port}"),
                    reason: format!("login failed: {e}"),
                })?;
            Ok::<_, MailboxError>(session)
        })
        .await
        .map_err(|e| MailboxError::Connect {
            host: self.config.imap_host.clone(),
            reason: format!("connect task panicked: {e}"),
        })??;

        tracing::debug!(host = %self.config.imap_host, "IMAP session opened");
        Ok(Box::new(ImapInboxSession::new(session)))
    }
}

/// Async face of a blocking [`ImapSession`].
///
/// Each call moves the session onto the blocking pool and back, so calls are
/// strictly sequential.
pub struct ImapInboxSession<S: Read + Write> {
    inner: Option<ImapSession<S>>,
}

impl<S> ImapInboxSession<S>
where
    S: Read + Write + Send + 'static,
{
    pub fn new(session: ImapSession<S>) -> Self {
        Self {
            inner: Some(session),
        }
    }

    async fn with_session<T, F>(&mut self, op: F) -> Result<T, MailboxError>
    where
        T: Send + 'static,
        F: FnOnce(&mut ImapSession<S>) -> Result<T, MailboxError> + Send + 'static,
    {
        let mut session = self
            .inner
            .take()
            .ok_or_else(|| MailboxError::Protocol("IMAP session already closed".into()))?;

        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut session);
            (session, result)
        })
        .await
        .map_err(|e| MailboxError::Protocol(format!("IMAP task panicked: {e}")))?;

        self.inner = Some(session);
        result
    }
}

#[async_trait]
impl<S> InboxSession for ImapInboxSession<S>
where
    S: Read + Write + Send + 'static,
{
    async fn list_unread(&mut self) -> Result<Vec<MessageHandle>, MailboxError> {
        self.with_session(|s| {
            s.select_inbox()?;
            s.search_unseen()
        })
        .await
    }

    async fn fetch(&mut self, handle: &MessageHandle) -> Result<InboundMessage, MailboxError> {
        let target = handle.clone();
        let raw = self.with_session(move |s| s.fetch_raw(&target)).await?;
        InboundMessage::parse(handle.clone(), &raw)
    }

    async fn mark_read(&mut self, handle: &MessageHandle) -> Result<(), MailboxError> {
        let target = handle.clone();
        self.with_session(move |s| s.mark_seen(&target)).await
    }

    async fn close(&mut self) -> Result<(), MailboxError> {
        let result = self.with_session(|s| s.close()).await;
        self.inner = None;
        result
    }
}

// ── Tests ───────────────────────────────────────────────────────────
