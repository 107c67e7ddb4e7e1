//! Bounded conversation memory
//!
//! Holds the system directive plus the most recent `2 * max_turns` messages.
//! Every mutation runs under a single lock, and the lock is never held across
//! an engine call: callers take a [`SessionStore::snapshot`] and release it.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Default number of exchanges kept in memory
pub const DEFAULT_MAX_TURNS: usize = 8;

/// Default behaviour directive for the assistant
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, concise voice assistant. \
Keep replies short (1-3 sentences) and ask clarifying questions when needed.";

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    /// Create a message with an explicit role
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a `system` message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a `user` message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an `assistant` message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Process-wide conversation memory with FIFO eviction
///
/// `max_turns` counts exchanges (one user plus one assistant message), so at
/// most `2 * max_turns` messages are retained. Eviction drops one message at a
/// time from the oldest end, which can leave an unpaired message at the front.
#[derive(Debug)]
pub struct SessionStore {
    system_prompt: String,
    max_turns: usize,
    history: Mutex<VecDeque<Message>>,
}

impl SessionStore {
    /// Create an empty session
    ///
    /// A `max_turns` of zero is raised to one so the store can always hold
    /// the exchange in progress.
    pub fn new(max_turns: usize, system_prompt: impl Into<String>) -> Self {
        let max_turns = max_turns.max(1);
        Self {
            system_prompt: system_prompt.into(),
            max_turns,
            history: Mutex::new(VecDeque::with_capacity(max_turns * 2 + 1)),
        }
    }

    /// Configured capacity in exchanges
    #[must_use]
    pub const fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Maximum number of stored messages
    #[must_use]
    pub const fn max_messages(&self) -> usize {
        self.max_turns * 2
    }

    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Drop all history; the system directive is kept
    pub fn reset(&self) {
        let mut history = self.lock();
        let dropped = history.len();
        history.clear();
        tracing::debug!(dropped, "session reset");
    }

    /// Append a `user` message and trim
    pub fn append_user(&self, text: impl Into<String>) {
        self.append(Message::user(text));
    }

    /// Append an `assistant` message and trim
    pub fn append_assistant(&self, text: impl Into<String>) {
        self.append(Message::assistant(text));
    }

    /// Append a `user` message and snapshot the result under one lock
    ///
    /// The returned view is guaranteed to end with this message, even when a
    /// concurrent exchange appends and trims immediately afterwards.
    pub fn append_user_and_snapshot(&self, text: impl Into<String>) -> Vec<Message> {
        let mut history = self.lock();
        self.push_trimmed(&mut history, Message::user(text));
        self.snapshot_of(&history)
    }

    fn append(&self, message: Message) {
        let mut history = self.lock();
        self.push_trimmed(&mut history, message);
    }

    fn push_trimmed(&self, history: &mut VecDeque<Message>, message: Message) {
        let limit = self.max_messages();
        history.push_back(message);

        let mut evicted = 0usize;
        while history.len() > limit {
            history.pop_front();
            evicted += 1;
        }

        if evicted > 0 {
            tracing::trace!(evicted, len = history.len(), "trimmed session history");
        }
    }

    fn snapshot_of(&self, history: &VecDeque<Message>) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(history.iter().cloned());
        messages
    }

    /// Ordered copy of the conversation: directive first, then history
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        let history = self.lock();
        self.snapshot_of(&history)
    }

    /// Copy of the stored history without the directive
    #[must_use]
    pub fn history(&self) -> Vec<Message> {
        self.lock().iter().cloned().collect()
    }

    /// Number of stored messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the guard cannot leave the deque half-mutated
    // (push/pop are the only writes), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS, DEFAULT_SYSTEM_PROMPT)
    }
}
