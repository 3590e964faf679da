//! Conversation persistence boundary
//!
//! The only I/O surface the failover core touches directly. Production
//! deployments back [`ConversationStore`] with a document database; the
//! in-memory implementation here serves tests and single-node setups.

use async_trait::async_trait;
use dashmap::DashMap;
use relay_core::now_ms;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation, immutable once appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Which provider produced this turn, for assistant turns
    pub provider: Option<String>,
    pub created_at_ms: u64,
}

impl Turn {
    /// A user turn stamped with the current time
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            provider: None,
            created_at_ms: now_ms(),
        }
    }

    /// An assistant turn tagged with the provider that produced it
    pub fn assistant(content: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            provider: Some(provider.into()),
            created_at_ms: now_ms(),
        }
    }
}

/// Summary state carried by a conversation
#[derive(Debug, Clone, Default)]
pub struct Summaries {
    /// Rolling summary regenerated as the conversation grows
    pub current: Option<String>,
    /// Summary inherited from a predecessor conversation
    pub inherited: Option<String>,
}

/// Async adapter over the conversation history store
///
/// Turns appended for the same `(session, user)` pair read back in append
/// order. Callers must never append an empty placeholder turn to force a
/// conversation into existence — a conversation with zero turns must stay
/// invisible to listing queries.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append a turn, returning the new total turn count
    async fn append(&self, session: &str, user: &str, turn: Turn) -> Result<usize, StoreError>;

    /// The last `limit` turns in append order
    async fn recent_turns(
        &self,
        session: &str,
        user: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError>;

    /// Current and inherited summaries for a conversation
    async fn summaries(&self, session: &str, user: &str) -> Result<Summaries, StoreError>;

    /// Replace the rolling summary
    async fn set_summary(&self, session: &str, user: &str, text: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct SessionRecord {
    turns: Vec<Turn>,
    summary: Option<String>,
    inherited_summary: Option<String>,
}

/// In-memory conversation store keyed by `(session, user)`
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<(String, String), SessionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an inherited summary, as conversation hand-off would
    ///
    /// Conversation forking itself happens outside this core; tests use
    /// this to exercise the context assembler's priority order.
    pub fn set_inherited_summary(&self, session: &str, user: &str, text: &str) {
        self.sessions
            .entry(key(session, user))
            .or_default()
            .inherited_summary = Some(text.to_owned());
    }
}

fn key(session: &str, user: &str) -> (String, String) {
    (session.to_owned(), user.to_owned())
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn append(&self, session: &str, user: &str, turn: Turn) -> Result<usize, StoreError> {
        let mut record = self.sessions.entry(key(session, user)).or_default();
        record.turns.push(turn);
        Ok(record.turns.len())
    }

    async fn recent_turns(
        &self,
        session: &str,
        user: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        Ok(self
            .sessions
            .get(&key(session, user))
            .map(|record| {
                let turns = &record.turns;
                turns[turns.len().saturating_sub(limit)..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn summaries(&self, session: &str, user: &str) -> Result<Summaries, StoreError> {
        Ok(self
            .sessions
            .get(&key(session, user))
            .map(|record| Summaries {
                current: record.summary.clone(),
                inherited: record.inherited_summary.clone(),
            })
            .unwrap_or_default())
    }

    async fn set_summary(&self, session: &str, user: &str, text: &str) -> Result<(), StoreError> {
        self.sessions.entry(key(session, user)).or_default().summary = Some(text.to_owned());
        Ok(())
    }
}
