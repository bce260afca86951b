use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use onb_core::citations::{resolve, unresolved_numbers, ParsedSegment};
use onb_core::config::ChatConfig;
use onb_core::domain::{Citation, Message, MessageId, NewMessage, ValidationWarning};
use onb_core::error::AppError;
use onb_core::preview::{CitationPreview, CitationPreviewIndex};
use onb_core::sources::{ready_source_ids, SourceRegistry};
use onb_core::transcript::TranscriptStore;
use onb_core::validate::{normalize_citations, split_storable_citations};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::provider::{AnswerProvider, ProviderAnswer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Sending,
    Failed,
}

/// How a pending answer ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Answered {
        message_id: MessageId,
        warnings: Vec<ValidationWarning>,
    },
    /// The provider failed; a synthetic assistant message explains it.
    Failed {
        message_id: MessageId,
        error: AppError,
    },
    /// The session was torn down or switched before the answer arrived.
    Discarded,
}

#[derive(Debug)]
struct SessionShared {
    store: TranscriptStore,
    preview: CitationPreviewIndex,
    state: CoordinatorState,
    generation: u64,
    last_failure: Option<AppError>,
}

fn lock(shared: &Mutex<SessionShared>) -> MutexGuard<'_, SessionShared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// One chat surface: owns the transcript and runs the question/answer cycle.
///
/// At most one question is in flight. `submit` validates and records the user
/// message synchronously; the returned [`PendingAnswer`] is awaited to get
/// the assistant turn. Closing or switching the session bumps a generation
/// counter so late provider results are dropped instead of being appended.
pub struct ChatSession {
    provider: Arc<dyn AnswerProvider>,
    registry: Arc<dyn SourceRegistry>,
    config: Arc<ChatConfig>,
    shared: Arc<Mutex<SessionShared>>,
    teardown: watch::Sender<u64>,
}

impl ChatSession {
    pub fn new(
        provider: Arc<dyn AnswerProvider>,
        registry: Arc<dyn SourceRegistry>,
        config: ChatConfig,
    ) -> Self {
        let (teardown, _) = watch::channel(0u64);
        Self {
            provider,
            registry,
            config: Arc::new(config),
            shared: Arc::new(Mutex::new(SessionShared {
                store: TranscriptStore::new(),
                preview: CitationPreviewIndex::new(),
                state: CoordinatorState::Idle,
                generation: 0,
                last_failure: None,
            })),
            teardown,
        }
    }

    /// Accept a question: append the user message and move to `Sending`.
    ///
    /// Rejected with `CHAT_INVALID_INPUT` for blank or oversized questions and
    /// with `CHAT_REQUEST_IN_FLIGHT` while another answer is pending; the
    /// transcript is untouched in both cases.
    pub fn submit(&self, question: &str) -> Result<PendingAnswer, AppError> {
        if question.trim().is_empty() {
            return Err(AppError::new("CHAT_INVALID_INPUT", "Question must not be empty"));
        }
        let chars = question.chars().count();
        if chars > self.config.max_question_chars {
            return Err(AppError::new("CHAT_INVALID_INPUT", "Question is too long")
                .with_details(format!("chars={chars}; max={}", self.config.max_question_chars)));
        }

        let ready = ready_source_ids(&self.registry.sources());
        if self.config.require_ready_sources && ready.is_empty() {
            return Err(AppError::new(
                "CHAT_NO_READY_SOURCES",
                "Add a source and wait for it to finish processing before asking",
            ));
        }

        let mut shared = lock(&self.shared);
        if shared.state == CoordinatorState::Sending {
            return Err(AppError::new(
                "CHAT_REQUEST_IN_FLIGHT",
                "Wait for the current answer before asking again",
            ));
        }

        let user_message_id = shared.store.append(NewMessage::user(question))?;
        shared.state = CoordinatorState::Sending;
        tracing::debug!(
            message_id = %user_message_id,
            ready_sources = ready.len(),
            generation = shared.generation,
            "question accepted"
        );

        Ok(PendingAnswer {
            provider: Arc::clone(&self.provider),
            config: Arc::clone(&self.config),
            shared: Arc::clone(&self.shared),
            teardown: self.teardown.subscribe(),
            generation: shared.generation,
            question: question.to_string(),
            ready_source_ids: ready,
            user_message_id,
            finished: false,
        })
    }

    /// Submit and wait for the answer in one call.
    pub async fn ask(&self, question: &str) -> Result<TurnOutcome, AppError> {
        let pending = self.submit(question)?;
        Ok(pending.complete().await)
    }

    pub fn state(&self) -> CoordinatorState {
        lock(&self.shared).state
    }

    pub fn snapshot(&self) -> Vec<Message> {
        lock(&self.shared).store.snapshot()
    }

    pub fn last_failure(&self) -> Option<AppError> {
        lock(&self.shared).last_failure.clone()
    }

    /// Renderable segments of one message. User messages come back as a
    /// single text segment; bracketed numbers a user typed are not citations.
    pub fn segments(&self, message_id: &MessageId) -> Result<Vec<ParsedSegment>, AppError> {
        let shared = lock(&self.shared);
        let message = shared.store.get(message_id).ok_or_else(|| {
            AppError::new("PREVIEW_MESSAGE_NOT_FOUND", "Message not found in transcript")
                .with_details(format!("message_id={message_id}"))
        })?;
        if !message.is_assistant() {
            if message.content.is_empty() {
                return Ok(Vec::new());
            }
            return Ok(vec![ParsedSegment::Text {
                text: message.content.clone(),
            }]);
        }
        Ok(resolve(&message.content, &message.citations))
    }

    pub fn lookup_citation(&self, message_id: &MessageId, number: u32) -> Result<Citation, AppError> {
        let mut guard = lock(&self.shared);
        let shared = &mut *guard;
        shared
            .preview
            .lookup(&shared.store, message_id, number)
            .cloned()
    }

    pub fn preview(&self, message_id: &MessageId, number: u32) -> Result<CitationPreview, AppError> {
        let citation = self.lookup_citation(message_id, number)?;
        Ok(CitationPreview::from_citation(&citation))
    }

    /// Start over for another notebook: pending answers are invalidated and
    /// the transcript is cleared.
    pub fn switch_notebook(&mut self, registry: Arc<dyn SourceRegistry>) {
        self.invalidate("notebook switched");
        self.registry = registry;
    }

    /// Tear the session down. Any pending answer resolves as `Discarded`.
    pub fn close(self) {
        tracing::debug!("closing chat session");
        // Drop does the invalidation.
    }

    fn invalidate(&self, reason: &str) {
        let mut shared = lock(&self.shared);
        shared.generation += 1;
        shared.store.clear();
        shared.preview.invalidate();
        shared.state = CoordinatorState::Idle;
        shared.last_failure = None;
        let generation = shared.generation;
        drop(shared);

        self.teardown.send_replace(generation);
        tracing::debug!(generation, reason, "chat session invalidated");
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.invalidate("session dropped");
    }
}

/// An accepted question whose answer has not been appended yet.
///
/// Dropping it before [`complete`](PendingAnswer::complete) finishes, on a
/// still-live session, appends the configured cancellation message so the
/// session never stays stuck in `Sending`.
pub struct PendingAnswer {
    provider: Arc<dyn AnswerProvider>,
    config: Arc<ChatConfig>,
    shared: Arc<Mutex<SessionShared>>,
    teardown: watch::Receiver<u64>,
    generation: u64,
    question: String,
    ready_source_ids: BTreeSet<String>,
    user_message_id: MessageId,
    finished: bool,
}

impl fmt::Debug for PendingAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAnswer")
            .field("generation", &self.generation)
            .field("user_message_id", &self.user_message_id)
            .field("ready_source_ids", &self.ready_source_ids)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl PendingAnswer {
    pub fn user_message_id(&self) -> &MessageId {
        &self.user_message_id
    }

    pub fn ready_source_ids(&self) -> &BTreeSet<String> {
        &self.ready_source_ids
    }

    /// Wait for the provider and append the assistant turn.
    pub async fn complete(mut self) -> TurnOutcome {
        let provider = Arc::clone(&self.provider);
        let mut teardown = self.teardown.clone();
        let generation = self.generation;

        // Teardown is polled first: a session closed before this runs never
        // reaches the provider.
        let result = tokio::select! {
            biased;
            _ = wait_for_teardown(&mut teardown, generation) => None,
            r = provider.ask(&self.question, &self.ready_source_ids) => Some(r),
        };

        self.finished = true;
        let Some(result) = result else {
            tracing::debug!(generation, "answer abandoned after teardown");
            return TurnOutcome::Discarded;
        };

        let mut shared = lock(&self.shared);
        if shared.generation != generation {
            tracing::debug!(generation, current = shared.generation, "stale answer dropped");
            return TurnOutcome::Discarded;
        }

        match result {
            Ok(answer) => append_answer(&mut shared, &self.config, answer),
            Err(error) => append_failure(&mut shared, &self.config, error),
        }
    }
}

impl Drop for PendingAnswer {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut shared = lock(&self.shared);
        if shared.generation != self.generation || shared.state != CoordinatorState::Sending {
            return;
        }
        tracing::debug!(question_id = %self.user_message_id, "pending answer cancelled by caller");
        if let Err(e) = shared
            .store
            .append(NewMessage::assistant(self.config.cancelled_message.clone(), Vec::new()))
        {
            tracing::error!(error = %e, "failed to record cancelled answer");
        }
        shared.state = CoordinatorState::Idle;
    }
}

async fn wait_for_teardown(rx: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        let current = *rx.borrow_and_update();
        if current != generation {
            return;
        }
        // Sender gone means the session itself is gone.
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn append_answer(shared: &mut SessionShared, config: &ChatConfig, answer: ProviderAnswer) -> TurnOutcome {
    let ProviderAnswer {
        answer_text,
        citations,
        processing_time,
        confidence_score,
    } = answer;

    let normalized = normalize_citations(&answer_text, citations);
    let mut warnings = normalized.warnings;
    for w in warnings.iter() {
        tracing::warn!(
            code = %w.code,
            details = w.details.as_deref().unwrap_or(""),
            "{}",
            w.message
        );
    }

    let unresolved = unresolved_numbers(&resolve(&answer_text, &normalized.citations));
    if !unresolved.is_empty() {
        tracing::debug!(?unresolved, "answer has markers without citations");
    }

    let draft = NewMessage::assistant(answer_text, normalized.citations)
        .with_metrics(finite(processing_time), finite(confidence_score));

    let message_id = match shared.store.append(draft.clone()) {
        Ok(id) => id,
        Err(e) => {
            // Normalized citations always validate; reaching this is a bug.
            tracing::error!(error = %e, "normalized answer rejected by transcript");
            let (kept, dropped) = split_storable_citations(&draft.content, draft.citations.clone());
            for c in dropped.iter() {
                warnings.push(
                    ValidationWarning::new(
                        "CITATION_REJECTED",
                        format!("Dropped citation {} rejected by the transcript", c.number),
                    )
                    .with_details(e.to_string()),
                );
            }
            let retry = NewMessage {
                citations: kept,
                ..draft
            };
            match shared.store.append(retry) {
                Ok(id) => id,
                Err(e) => return append_failure(shared, config, e),
            }
        }
    };

    shared.state = CoordinatorState::Idle;
    shared.last_failure = None;
    TurnOutcome::Answered {
        message_id,
        warnings,
    }
}

fn append_failure(shared: &mut SessionShared, config: &ChatConfig, error: AppError) -> TurnOutcome {
    shared.state = CoordinatorState::Failed;
    tracing::warn!(code = %error.code, retryable = error.retryable, "answer provider failed: {}", error.message);

    let appended = shared
        .store
        .append(NewMessage::assistant(config.failure_message.clone(), Vec::new()));
    shared.last_failure = Some(error.clone());
    shared.state = CoordinatorState::Idle;

    match appended {
        Ok(message_id) => TurnOutcome::Failed { message_id, error },
        Err(e) => {
            // An uncited assistant message always validates.
            tracing::error!(error = %e, "failed to record provider failure");
            TurnOutcome::Discarded
        }
    }
}
