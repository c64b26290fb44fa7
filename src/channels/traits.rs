//! Seams between the pipeline and the mail servers.
//!
//! The IMAP and SMTP implementations live in `channels::email` and
//! `channels::smtp`; tests substitute in-memory mocks.

use async_trait::async_trait;

use crate::channels::email_types::{InboundMessage, MessageHandle, OutboundMessage};
use crate::error::{DeliveryError, MailboxError};

/// Inbound mailbox that can open one session per cycle.
#[async_trait]
pub trait Inbox: Send + Sync {
    /// Connect and authenticate.
    async fn connect(&self) -> Result<Box<dyn InboxSession>, MailboxError>;
}

/// An open, authenticated mailbox session.
#[async_trait]
pub trait InboxSession: Send {
    /// Handles of all unread messages in the inbox, in server order.
    async fn list_unread(&mut self) -> Result<Vec<MessageHandle>, MailboxError>;

    /// Fetch and parse one message. Must not change its read flag.
    async fn fetch(&mut self, handle: &MessageHandle) -> Result<InboundMessage, MailboxError>;

    /// Flag the message as read.
    async fn mark_read(&mut self, handle: &MessageHandle) -> Result<(), MailboxError>;

    /// Close the mailbox and log out.
    async fn close(&mut self) -> Result<(), MailboxError>;
}

/// Outbound mail delivery.
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Deliver one message. `Ok` means the server accepted it.
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}
