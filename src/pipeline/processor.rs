//! Query pipeline: one polling cycle over the inbox.
//!
//! Flow per cycle:
//! 1. Connect and list unread messages
//! 2. For each: fetch, generate a reply, send it, flag read
//! 3. Close the session
//!
//! A message is flagged read only after its reply has been accepted by the
//! SMTP server. Anything that fails earlier leaves it unread for the next
//! cycle.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::channels::email::ImapInbox;
use crate::channels::email_types::{MessageHandle, OutboundMessage};
use crate::channels::smtp::SmtpSender;
use crate::channels::traits::{Inbox, InboxSession, ReplySender};
use crate::config::AssistConfig;
use crate::error::PipelineError;
use crate::llm::{ResponseGenerator, create_provider};
use crate::pipeline::types::{CycleReport, MessageOutcome};

/// Characters of the query body shown in logs.
const QUERY_PREVIEW_CHARS: usize = 100;

/// Ties the inbox, the reply generator and the sender together.
pub struct QueryPipeline {
    inbox: Arc<dyn Inbox>,
    generator: ResponseGenerator,
    sender: Arc<dyn ReplySender>,
    /// Message-IDs whose reply went out but whose read flag failed to stick.
    /// Never re-send to these; an entry is dropped once the flag is set.
    replied: Mutex<HashSet<String>>,
}

impl QueryPipeline {
    pub fn new(
        inbox: Arc<dyn Inbox>,
        generator: ResponseGenerator,
        sender: Arc<dyn ReplySender>,
    ) -> Self {
        Self {
            inbox,
            generator,
            sender,
            replied: Mutex::new(HashSet::new()),
        }
    }

    /// Wire the IMAP inbox, the configured LLM and the SMTP sender.
    pub fn from_config(config: &AssistConfig) -> crate::error::Result<Self> {
        let llm = create_provider(&config.llm)?;
        let generator = ResponseGenerator::new(llm, config.system_prompt.as_str(), &config.llm);
        Ok(Self::new(
            Arc::new(ImapInbox::new(config.email.clone())),
            generator,
            Arc::new(SmtpSender::new(config.email.clone())),
        ))
    }

    /// Run one cycle over every unread message.
    ///
    /// Returns `Err` only when the mailbox could not be opened or listed;
    /// per-message failures are recorded in the report.
    pub async fn process_unread(&self) -> Result<CycleReport, PipelineError> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", id = %cycle_id);
        self.run_cycle_inner(cycle_id).instrument(span).await
    }

    async fn run_cycle_inner(&self, cycle_id: Uuid) -> Result<CycleReport, PipelineError> {
        let mut report = CycleReport::new(cycle_id);

        let mut session = match self.inbox.connect().await {
            Ok(s) => s,
            Err(e) => {
                error!("Mailbox connection failed: {e}");
                return Err(e.into());
            }
        };

        let result = self.process_session(session.as_mut(), &mut report).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close mailbox session: {e}");
        }

        result.map(|()| {
            info!(
                unread = report.unread,
                marked_read = report.marked_read(),
                left_unread = report.left_unread(),
                elapsed_ms = report.elapsed().num_milliseconds(),
                "Cycle complete"
            );
            report
        })
    }

    async fn process_session(
        &self,
        session: &mut dyn InboxSession,
        report: &mut CycleReport,
    ) -> Result<(), PipelineError> {
        let handles = match session.list_unread().await {
            Ok(h) => h,
            Err(e) => {
                error!("Listing unread messages failed: {e}");
                return Err(e.into());
            }
        };

        report.unread = handles.len();
        if handles.is_empty() {
            info!("No new emails to process");
            return Ok(());
        }
        info!("Found {} unread email(s)", handles.len());

        for handle in handles {
            let outcome = self.process_message(session, &handle).await;
            debug!(handle = %handle, outcome = outcome.label(), "Message processed");
            report.outcomes.push((handle, outcome));
        }
        Ok(())
    }

    async fn process_message(
        &self,
        session: &mut dyn InboxSession,
        handle: &MessageHandle,
    ) -> MessageOutcome {
        let inbound = match session.fetch(handle).await {
            Ok(m) => m,
            Err(e) => {
                warn!(handle = %handle, "Skipping message: {e}");
                return MessageOutcome::FetchFailed {
                    reason: e.to_string(),
                };
            }
        };

        info!(
            handle = %handle,
            sender = %inbound.sender,
            subject = %inbound.subject,
            query = %inbound.preview(QUERY_PREVIEW_CHARS),
            "Processing email"
        );

        // Reply went out earlier but the read flag did not stick.
        if let Some(id) = inbound.message_id.as_deref()
            && self.already_replied(id)
        {
            info!(
                handle = %handle,
                message_id = %id,
                "Already replied this run, flagging read only"
            );
            return match session.mark_read(handle).await {
                Ok(()) => {
                    self.replied
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(id);
                    MessageOutcome::AlreadyReplied
                }
                Err(e) => {
                    warn!(handle = %handle, "Failed to mark email as read: {e}");
                    MessageOutcome::MarkFailed {
                        reason: e.to_string(),
                    }
                }
            };
        }

        debug!(handle = %handle, "Generating reply");
        let reply = self.generator.generate(&inbound.body).await;
        let outbound = OutboundMessage::reply_to(&inbound, reply.text);

        if let Err(e) = self.sender.send(&outbound).await {
            warn!(handle = %handle, to = %outbound.to, "Reply not sent, leaving unread: {e}");
            return MessageOutcome::DeliveryFailed {
                reason: e.to_string(),
            };
        }
        info!(handle = %handle, to = %outbound.to, "Response sent");

        match session.mark_read(handle).await {
            Ok(()) => {
                info!(handle = %handle, "Email marked as read");
                MessageOutcome::Replied {
                    source: reply.source,
                }
            }
            Err(e) => {
                warn!(handle = %handle, "Reply sent but marking read failed: {e}");
                if let Some(id) = inbound.message_id {
                    self.replied
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(id);
                }
                MessageOutcome::MarkFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn already_replied(&self, message_id: &str) -> bool {
        self.replied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(message_id)
    }
}
