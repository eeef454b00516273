//! Streaming assistant session for one resume section.
//!
//! # Turn lifecycle
//!
//! ```text
//!  start_message ──► optimistic user message, is_loading = true
//!        │           spawn Abortable(stream_assist) ──► mpsc::Sender<AssistEvent>
//!        ▼
//!  process_stream_events / wait_for_event   (apply events in arrival order)
//!        │
//!        ├─ Done   ──► is_loading = false
//!        ├─ Error  ──► is_loading = false, error = message
//!        └─ cancel_request / clear_messages / next start_message
//!                  ──► abort task, drop receiver, no error
//! ```
//!
//! Cancellation drops the receiver together with the abort handle, so no event
//! from a superseded stream can be applied after the call returns.

use chrono::Utc;
use futures_util::future::{AbortHandle, Abortable};
use scribe_client::{AssistClient, AssistEvent, AssistRequest, ClientError};
use scribe_types::{
    Message, MessageId, MessageIdGenerator, RateLimits, ResumeContext, Section, Suggestion,
};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::rate_limit::{RateLimitStatus, RateLimitTracker};
use crate::refine::{Refinement, resolve_refinement};
use crate::suggestion::{SuggestionId, materialize, suggestion_message};

pub const STREAM_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Reported when the stream task goes away without a terminal event.
pub const STREAM_DISCONNECTED_MESSAGE: &str = "Connection closed before stream completed";

/// Observable state of one conversation.
#[derive(Debug, Clone)]
pub struct SessionState {
    messages: Vec<Message>,
    is_loading: bool,
    error: Option<String>,
    current_suggestion: Option<Suggestion>,
    rate_limits: RateLimitTracker,
}

impl SessionState {
    fn new(rate_limit_defaults: RateLimits) -> Self {
        Self {
            messages: Vec::new(),
            is_loading: false,
            error: None,
            current_suggestion: None,
            rate_limits: RateLimitTracker::new(rate_limit_defaults),
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn current_suggestion(&self) -> Option<&Suggestion> {
        self.current_suggestion.as_ref()
    }

    #[must_use]
    pub fn rate_limits(&self) -> RateLimits {
        self.rate_limits.current()
    }
}

/// What applying one stream event changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Text appended to the streaming assistant message.
    Content(String),
    /// Text received after a suggestion in the same turn; not displayed.
    ContentSuppressed,
    /// A new suggestion event. `note` is the narration appended as a message;
    /// `applied` is false when the payload did not fit the section.
    Suggestion { note: Option<String>, applied: bool },
    /// Re-delivery of the suggestion already applied.
    DuplicateSuggestion,
    RateLimit(RateLimits),
    Done,
    Failed(String),
}

#[derive(Debug)]
struct TurnState {
    /// Minted at stream start; every displayed fragment lands in this message.
    assistant_id: MessageId,
    suggestion_turn: bool,
    /// Everything the server sent, displayed or not.
    full_text: String,
}

#[derive(Debug)]
struct ActiveStream {
    rx: mpsc::Receiver<AssistEvent>,
    abort_handle: AbortHandle,
    turn: TurnState,
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

pub struct AssistSession {
    client: AssistClient,
    section: Section,
    session_id: String,
    context: ResumeContext,
    state: SessionState,
    active: Option<ActiveStream>,
    last_suggestion_id: Option<SuggestionId>,
    ids: MessageIdGenerator,
}

impl AssistSession {
    #[must_use]
    pub fn new(
        client: AssistClient,
        section: Section,
        session_id: impl Into<String>,
        context: ResumeContext,
    ) -> Self {
        Self {
            client,
            section,
            session_id: session_id.into(),
            context,
            state: SessionState::new(RateLimits::default()),
            active: None,
            last_suggestion_id: None,
            ids: MessageIdGenerator::new(),
        }
    }

    /// Counters restored by `clear_messages` and a successful limit reset.
    #[must_use]
    pub fn with_rate_limit_defaults(mut self, defaults: RateLimits) -> Self {
        self.state.rate_limits = RateLimitTracker::new(defaults);
        self
    }

    /// Seed the conversation from restored history.
    #[must_use]
    pub fn with_history(mut self, messages: Vec<Message>) -> Self {
        self.restore_history(messages);
        self
    }

    /// Replace the conversation with restored history. Ignored mid-stream.
    ///
    /// New ids are minted past every restored one.
    pub fn restore_history(&mut self, messages: Vec<Message>) -> bool {
        if self.active.is_some() {
            return false;
        }
        for message in &messages {
            self.ids.observe(message.id());
        }
        self.state.messages = messages;
        true
    }

    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.state.error()
    }

    #[must_use]
    pub fn current_suggestion(&self) -> Option<&Suggestion> {
        self.state.current_suggestion()
    }

    #[must_use]
    pub fn rate_limits(&self) -> RateLimits {
        self.state.rate_limits()
    }

    /// Advisory gate for the input boundary. Sending is never refused here.
    #[must_use]
    pub fn rate_limit_status(&self) -> RateLimitStatus {
        self.state.rate_limits.status()
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub fn context(&self) -> &ResumeContext {
        &self.context
    }

    /// Resume snapshot sent with every later turn.
    pub fn set_context(&mut self, context: ResumeContext) {
        self.context = context;
    }

    /// Begin a turn without waiting for it.
    ///
    /// Returns `false` (and changes nothing) for blank input. Any stream still in
    /// flight is cancelled before the new user message is appended. Must be
    /// called from within a Tokio runtime.
    pub fn start_message(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }

        self.cancel_active();

        let request = AssistRequest::new(
            text,
            &self.state.messages,
            self.context.clone(),
            self.session_id.clone(),
        );

        let now = Utc::now();
        let user_id = self.ids.mint(now);
        self.state.messages.push(Message::user(user_id, text, now));
        self.state.is_loading = true;
        self.state.error = None;
        self.state.current_suggestion = None;
        // A new turn may legitimately deliver the same payload again.
        self.last_suggestion_id = None;

        let (tx, rx) = mpsc::channel(STREAM_EVENT_CHANNEL_CAPACITY);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();

        self.active = Some(ActiveStream {
            rx,
            abort_handle,
            turn: TurnState {
                assistant_id: self.ids.mint(Utc::now()),
                suggestion_turn: false,
                full_text: String::new(),
            },
        });

        let client = self.client.clone();
        let section = self.section;
        let task = async move {
            client.stream_assist(section, &request, &tx).await;
        };

        tracing::debug!(section = %section, "Starting assistant stream");
        tokio::spawn(async move {
            let _ = Abortable::new(task, abort_registration).await;
        });
        true
    }

    /// Send `text` and drive the turn to completion (or cancellation).
    pub async fn send_message(&mut self, text: &str) -> bool {
        if !self.start_message(text) {
            return false;
        }
        self.wait_until_idle().await;
        true
    }

    pub async fn wait_until_idle(&mut self) {
        while self.is_streaming() {
            self.wait_for_event().await;
        }
    }

    /// Wait for the next event of the active stream and apply it.
    ///
    /// Returns `None` when nothing is streaming.
    pub async fn wait_for_event(&mut self) -> Option<SessionUpdate> {
        let event = match self.active.as_mut() {
            Some(active) => active.rx.recv().await,
            None => return None,
        };
        let event = event.unwrap_or_else(|| {
            tracing::warn!("Assistant stream channel disconnected");
            AssistEvent::Error(STREAM_DISCONNECTED_MESSAGE.to_string())
        });
        Some(self.apply_event(event))
    }

    /// Apply every event already received, without waiting.
    pub fn process_stream_events(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        loop {
            let Some(active) = self.active.as_mut() else {
                break;
            };
            let event = match active.rx.try_recv() {
                Ok(event) => event,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    tracing::warn!("Assistant stream channel disconnected");
                    AssistEvent::Error(STREAM_DISCONNECTED_MESSAGE.to_string())
                }
            };
            updates.push(self.apply_event(event));
        }
        updates
    }

    fn apply_event(&mut self, event: AssistEvent) -> SessionUpdate {
        let Some(active) = self.active.as_mut() else {
            // Unreachable: events are only received through `active`.
            return SessionUpdate::Done;
        };

        match event {
            AssistEvent::Content(text) => {
                active.turn.full_text.push_str(&text);
                if active.turn.suggestion_turn {
                    return SessionUpdate::ContentSuppressed;
                }
                let id = &active.turn.assistant_id;
                match self.state.messages.iter_mut().rev().find(|m| m.id() == id) {
                    Some(message) => message.push_content(&text),
                    None => self
                        .state
                        .messages
                        .push(Message::assistant(id.clone(), text.clone(), Utc::now())),
                }
                SessionUpdate::Content(text)
            }
            AssistEvent::Suggestion(payload) => {
                active.turn.suggestion_turn = true;
                self.apply_suggestion(&payload)
            }
            AssistEvent::RateLimit(limits) => {
                self.state.rate_limits.update(limits);
                SessionUpdate::RateLimit(limits)
            }
            AssistEvent::Done => {
                tracing::debug!(
                    section = %self.section,
                    chars = active.turn.full_text.len(),
                    "Assistant stream complete"
                );
                self.active = None;
                self.state.is_loading = false;
                SessionUpdate::Done
            }
            AssistEvent::Error(message) => {
                tracing::warn!(section = %self.section, "Assistant stream failed: {message}");
                self.active = None;
                self.state.is_loading = false;
                self.state.error = Some(message.clone());
                SessionUpdate::Failed(message)
            }
        }
    }

    fn apply_suggestion(&mut self, payload: &Value) -> SessionUpdate {
        let id = SuggestionId::derive(self.section, payload);
        if self.last_suggestion_id.as_ref() == Some(&id) {
            tracing::debug!(suggestion = %id, "Ignoring re-delivered suggestion");
            return SessionUpdate::DuplicateSuggestion;
        }
        self.last_suggestion_id = Some(id);

        let note = suggestion_message(payload).map(ToString::to_string);
        if let Some(note) = &note {
            let now = Utc::now();
            let id = self.ids.mint(now);
            self.state
                .messages
                .push(Message::suggestion_note(id, note.clone(), now));
        }

        let suggestion = materialize(self.section, payload);
        let applied = suggestion.is_some();
        if let Some(suggestion) = suggestion {
            self.state.current_suggestion = Some(suggestion);
        } else {
            tracing::debug!(section = %self.section, "Suggestion payload did not match section");
        }
        SessionUpdate::Suggestion { note, applied }
    }

    fn cancel_active(&mut self) -> bool {
        // Dropping the stream aborts its task and closes the channel.
        self.active.take().is_some()
    }

    /// Stop the in-flight turn. Messages so far are kept; no error is recorded.
    pub fn cancel_request(&mut self) {
        if self.cancel_active() {
            tracing::debug!(section = %self.section, "Assistant request cancelled");
            self.state.is_loading = false;
        }
    }

    /// Cancel, then start over with empty state and default rate limits.
    pub fn clear_messages(&mut self) {
        self.cancel_active();
        self.last_suggestion_id = None;
        self.state = SessionState::new(self.state.rate_limits.defaults());
    }

    /// Replace the active suggestion. `None` also forgets the last suggestion id.
    ///
    /// A suggestion shaped for another section is refused and the current one
    /// is kept; returns whether the value was stored.
    pub fn set_suggestion(&mut self, suggestion: Option<Suggestion>) -> bool {
        match suggestion {
            Some(suggestion) if suggestion.section() != self.section => {
                tracing::debug!(
                    section = %self.section,
                    suggestion_section = %suggestion.section(),
                    "Refusing suggestion for another section"
                );
                false
            }
            Some(suggestion) => {
                self.state.current_suggestion = Some(suggestion);
                true
            }
            None => {
                self.last_suggestion_id = None;
                self.state.current_suggestion = None;
                true
            }
        }
    }

    /// Hand the active suggestion to the caller and clear it.
    pub fn accept_suggestion(&mut self) -> Option<Suggestion> {
        let accepted = self.state.current_suggestion.take();
        self.set_suggestion(None);
        accepted
    }

    pub fn reject_suggestion(&mut self) {
        self.set_suggestion(None);
    }

    /// Ask for a refined version of the active suggestion.
    ///
    /// Does nothing without an active suggestion or for sections without
    /// refinements. Unknown ids use the section default.
    pub fn start_refinement(&mut self, refinement_id: &str) -> Option<&'static Refinement> {
        self.state.current_suggestion.as_ref()?;
        let refinement = resolve_refinement(self.section, refinement_id)?;
        self.set_suggestion(None);
        self.start_message(refinement.prompt);
        Some(refinement)
    }

    pub async fn refine(&mut self, refinement_id: &str) -> Option<&'static Refinement> {
        let refinement = self.start_refinement(refinement_id)?;
        self.wait_until_idle().await;
        Some(refinement)
    }

    /// Reset this session's server-side counters, then the local ones.
    ///
    /// A failure leaves the counters untouched and does not set `error`.
    pub async fn reset_rate_limits(&mut self) -> Result<(), ClientError> {
        match self
            .client
            .reset_limits(&self.session_id, self.section)
            .await
        {
            Ok(()) => {
                self.state.rate_limits.reset();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(section = %self.section, "Failed to reset rate limits: {e}");
                Err(e)
            }
        }
    }
}
