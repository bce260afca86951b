use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::domain::{Message, MessageId, NewMessage};
use crate::error::AppError;
use crate::validate::validate_new_message;

static NEXT_STORE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Ordered, append-only message history of one chat session.
///
/// Messages are never edited or removed one by one; `clear` drops the whole
/// transcript. Timestamps are non-decreasing in insertion order.
#[derive(Debug)]
pub struct TranscriptStore {
    store_key: String,
    next_ordinal: u64,
    messages: Vec<Message>,
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptStore {
    pub fn new() -> Self {
        let seq = NEXT_STORE_SEQ.fetch_add(1, Ordering::Relaxed);
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        Self {
            store_key: format!("{nanos}:{seq}"),
            next_ordinal: 0,
            messages: Vec::new(),
        }
    }

    /// Append a message stamped with the current time.
    pub fn append(&mut self, draft: NewMessage) -> Result<MessageId, AppError> {
        self.append_at(draft, OffsetDateTime::now_utc())
    }

    /// Append a message stamped with `at`. A time earlier than the previous
    /// message's is raised to it so timestamps never go backwards.
    pub fn append_at(&mut self, draft: NewMessage, at: OffsetDateTime) -> Result<MessageId, AppError> {
        validate_new_message(&draft)?;

        let timestamp = match self.messages.last() {
            Some(last) if last.timestamp > at => last.timestamp,
            _ => at,
        };
        let id = self.next_id(&draft, timestamp);

        tracing::debug!(
            message_id = %id,
            role = draft.role.as_str(),
            citations = draft.citations.len(),
            "transcript append"
        );

        self.messages.push(Message {
            id: id.clone(),
            role: draft.role,
            content: draft.content,
            citations: draft.citations,
            timestamp,
            processing_time: draft.processing_time,
            confidence_score: draft.confidence_score,
        });
        Ok(id)
    }

    /// Owned copy of the transcript; changing it does not touch the store.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        tracing::debug!(dropped = self.messages.len(), "transcript cleared");
        self.messages.clear();
    }

    // Ordinals keep counting across `clear`, so ids stay unique for the
    // lifetime of the store.
    fn next_id(&mut self, draft: &NewMessage, timestamp: OffsetDateTime) -> MessageId {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        let payload = format!(
            "store={}\nordinal={}\nrole={}\nts={}\ncontent={}",
            self.store_key,
            ordinal,
            draft.role.as_str(),
            timestamp.unix_timestamp_nanos(),
            draft.content
        );
        let digest = hex::encode(Sha256::digest(payload.as_bytes()));
        MessageId::new(format!("msg-{}", &digest[..20]))
    }
}
