//! Carry-over context assembly for provider switches
//!
//! When a turn lands on a different provider than the conversation last
//! used, the new provider knows nothing about the dialogue so far. The
//! assembler rebuilds a bounded textual context from stored summaries and
//! the most recent turns.

use crate::error::StoreError;
use crate::store::{ConversationStore, Role, Turn};

/// Builds bounded carry-over context from conversation history
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    char_budget: usize,
    recent_window: usize,
}

impl ContextAssembler {
    pub fn new(char_budget: usize, recent_window: usize) -> Self {
        Self {
            char_budget,
            recent_window,
        }
    }

    /// Assemble context for a conversation, or `None` when it has no turns
    ///
    /// Priority order: inherited summary, then rolling summary, then the
    /// last few turns. The result never exceeds the character budget;
    /// oldest included turns are dropped first when it would.
    pub async fn assemble(
        &self,
        store: &dyn ConversationStore,
        session: &str,
        user: &str,
    ) -> Result<Option<String>, StoreError> {
        let turns = store.recent_turns(session, user, self.recent_window).await?;
        if turns.is_empty() {
            return Ok(None);
        }

        let summaries = store.summaries(session, user).await?;

        let mut header = String::new();
        if let Some(inherited) = &summaries.inherited {
            header.push_str(&format!("Previous conversation context: {inherited}\n\n"));
        }
        if let Some(current) = &summaries.current {
            header.push_str(&format!("Current conversation summary: {current}\n\n"));
        }

        let mut context = header;
        context.push_str("Recent conversation:\n");

        // Walk newest-first so the freshest turns survive the budget,
        // then restore chronological order
        let mut kept: Vec<String> = Vec::new();
        let mut used = context.len();
        for turn in turns.iter().rev() {
            let line = render_turn(turn);
            if used + line.len() > self.char_budget {
                break;
            }
            used += line.len();
            kept.push(line);
        }
        for line in kept.iter().rev() {
            context.push_str(line);
        }

        truncate_to_budget(&mut context, self.char_budget);

        tracing::debug!(
            session,
            chars = context.len(),
            turns_included = kept.len(),
            "carry-over context assembled"
        );

        Ok(Some(context))
    }
}

fn render_turn(turn: &Turn) -> String {
    let label = match turn.role {
        Role::User => "User",
        Role::Assistant => "Assistant",
    };
    format!("{label}: {}\n", turn.content)
}

/// Hard cap, respecting char boundaries
fn truncate_to_budget(text: &mut String, budget: usize) {
    if text.len() <= budget {
        return;
    }
    let mut cut = budget;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
