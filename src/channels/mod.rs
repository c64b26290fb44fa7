//! Mail I/O: IMAP inbox, SMTP replies, and message types.

pub mod email;
pub mod email_types;
pub mod imap;
pub mod smtp;
pub mod traits;

pub use email::{EmailConfig, ImapInbox};
pub use email_types::{InboundMessage, MessageHandle, OutboundMessage};
pub use smtp::SmtpSender;
pub use traits::{Inbox, InboxSession, ReplySender};
