//! Best-effort rolling summary regeneration
//!
//! Runs in a background task after a turn completes. A summary failure
//! must never fail or delay the user's turn, so every error path here
//! degrades to a deterministic synthetic summary or is swallowed with a
//! log line.

use std::sync::Arc;

use indexmap::IndexMap;
use relay_quota::{QuotaLedger, approx_tokens};

use crate::provider::ProviderClient;
use crate::store::{ConversationStore, Role, Turn};

/// How many trailing turns feed the summary prompt
const SOURCE_TURNS: usize = 10;

/// Stored summaries are capped at this many characters
const MAX_SUMMARY_CHARS: usize = 500;

/// How many user turns the synthetic fallback quotes
const FALLBACK_TOPICS: usize = 3;

/// Snippet length per quoted user turn in the synthetic fallback
const FALLBACK_SNIPPET_CHARS: usize = 50;

/// Regenerate and store the rolling summary for a conversation
pub(crate) async fn regenerate(
    providers: &IndexMap<String, Arc<dyn ProviderClient>>,
    ledger: &QuotaLedger,
    store: &dyn ConversationStore,
    session: &str,
    user: &str,
    preferred: &str,
    min_turns: usize,
) {
    let turns = match store.recent_turns(session, user, SOURCE_TURNS).await {
        Ok(turns) => turns,
        Err(e) => {
            tracing::warn!(session, error = %e, "skipping summary, history unavailable");
            return;
        }
    };
    if turns.len() < min_turns {
        return;
    }

    let prompt = summary_prompt(&turns);

    let mut summary = match pick_provider(providers, ledger, preferred) {
        Some(provider) => match provider.call(&prompt, None).await {
            Ok(reply) => {
                let tokens = reply
                    .tokens_used
                    .unwrap_or_else(|| approx_tokens(&prompt) + approx_tokens(&reply.text));
                ledger.record_usage(provider.name(), tokens, 1);
                reply.text
            }
            Err(e) => {
                tracing::warn!(
                    session,
                    provider = provider.name(),
                    error = %e,
                    "summary generation failed, using synthetic fallback"
                );
                synthetic_summary(&turns)
            }
        },
        None => synthetic_summary(&turns),
    };

    truncate_chars(&mut summary, MAX_SUMMARY_CHARS);
    if summary.is_empty() {
        return;
    }

    match store.set_summary(session, user, &summary).await {
        Ok(()) => tracing::debug!(session, chars = summary.len(), "conversation summary refreshed"),
        Err(e) => tracing::warn!(session, error = %e, "failed to store summary"),
    }
}

fn summary_prompt(turns: &[Turn]) -> String {
    let conversation: String = turns
        .iter()
        .map(|turn| {
            let label = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{label}: {}\n", turn.content)
        })
        .collect();

    format!(
        "Please provide a concise summary of this conversation in 2-3 sentences. \
         Focus on the main topics discussed and any important context that should \
         be maintained:\n\n{conversation}\nSummary:"
    )
}

/// First usable conversational provider, preferring the sticky current one
fn pick_provider<'a>(
    providers: &'a IndexMap<String, Arc<dyn ProviderClient>>,
    ledger: &QuotaLedger,
    preferred: &str,
) -> Option<&'a Arc<dyn ProviderClient>> {
    if let Some(provider) = providers.get(preferred)
        && provider.uses_context()
        && !ledger.is_flagged(preferred)
    {
        return Some(provider);
    }

    providers
        .iter()
        .find(|(name, provider)| provider.uses_context() && !ledger.is_flagged(name))
        .map(|(_, provider)| provider)
}

/// Deterministic fallback built from the latest user turns
fn synthetic_summary(turns: &[Turn]) -> String {
    let mut topics: Vec<String> = turns
        .iter()
        .rev()
        .filter(|turn| turn.role == Role::User)
        .take(FALLBACK_TOPICS)
        .map(|turn| turn.content.chars().take(FALLBACK_SNIPPET_CHARS).collect())
        .collect();
    topics.reverse();

    format!("Recent discussion topics: {}", topics.join(", "))
}

fn truncate_chars(text: &mut String, budget: usize) {
    if text.len() <= budget {
        return;
    }
    let mut cut = budget;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
