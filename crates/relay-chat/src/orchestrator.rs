//! Per-turn provider selection, failover, and bookkeeping
//!
//! One [`Orchestrator`] instance serves the whole process. Each user turn
//! walks a small state machine: pick a provider against the quota ledger,
//! optionally rebuild carry-over context, call the provider, then either
//! finish the turn or interpret the classified failure and rotate to the
//! next candidate. Quota exhaustion across every provider degrades to a
//! fixed fallback response instead of an error — the conversation is
//! never corrupted by provider trouble.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use indexmap::IndexMap;
use relay_config::{ChatConfig, Config};
use relay_quota::{ProviderSnapshot, QuotaLedger, QuotaPolicy, approx_tokens};
use serde::Serialize;

use crate::context::ContextAssembler;
use crate::error::TurnError;
use crate::intent::SearchIntent;
use crate::provider::{self, ProviderClient, ProviderReply};
use crate::store::{ConversationStore, Turn};
use crate::summary;

/// Pseudo-provider name recorded when every real provider is exhausted
pub const FALLBACK_PROVIDER: &str = "fallback";

/// Fixed user-facing degradation text for the all-exhausted case
pub const FALLBACK_TEXT: &str = "I apologize, but I'm currently experiencing technical \
     difficulties with my AI models. Please try again in a moment, or contact support if \
     the issue persists.";

/// Result of one completed user turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub text: String,
    /// Provider that produced the response (or `"fallback"`)
    pub provider: String,
    /// Whether a different provider than initially selected served the turn
    pub switched: bool,
    pub switched_from: Option<String>,
    pub session_id: String,
}

/// Read-only projection of engine state for the monitoring surface
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub current_provider: String,
    pub providers: Vec<ProviderSnapshot>,
}

/// The failover state machine, shared across all concurrent turns
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    providers: IndexMap<String, Arc<dyn ProviderClient>>,
    ledger: QuotaLedger,
    store: Arc<dyn ConversationStore>,
    assembler: ContextAssembler,
    intent: SearchIntent,
    settings: TurnSettings,
    /// Sticky process-wide default provider for new turns
    current: Mutex<String>,
    /// Provider last used per session in this process; a mismatch with the
    /// selected provider triggers context carry-over
    last_provider: DashMap<String, String>,
    /// Name of the search provider, if one is configured
    search_provider: Option<String>,
}

struct TurnSettings {
    max_attempts: usize,
    summary_interval: usize,
    summary_min_turns: usize,
}

impl Inner {
    fn current_name(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_current(&self, name: &str) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        name.clone_into(&mut current);
    }
}

impl Orchestrator {
    /// Build the orchestrator from configuration, constructing all
    /// provider clients and the quota ledger
    ///
    /// # Errors
    ///
    /// Returns an error if no providers are configured or a client fails
    /// to initialize
    pub fn from_config(config: &Config, store: Arc<dyn ConversationStore>) -> anyhow::Result<Self> {
        let providers = provider::build_providers(config)?;

        let mut policies = Vec::new();
        for (name, provider_config) in &config.providers {
            policies.push((
                name.clone(),
                QuotaPolicy {
                    max_tokens: provider_config.quota.max_tokens,
                    max_requests: provider_config.quota.max_requests,
                    reset_interval: provider_config.quota.reset_interval()?,
                },
            ));
        }

        Self::new(providers, QuotaLedger::new(policies), store, &config.chat)
    }

    /// Assemble from already-built parts
    ///
    /// # Errors
    ///
    /// Returns an error if the provider map is empty
    pub fn new(
        providers: IndexMap<String, Arc<dyn ProviderClient>>,
        ledger: QuotaLedger,
        store: Arc<dyn ConversationStore>,
        chat: &ChatConfig,
    ) -> anyhow::Result<Self> {
        let Some(initial) = providers
            .iter()
            .find(|(_, p)| p.uses_context())
            .or_else(|| providers.first())
            .map(|(name, _)| name.clone())
        else {
            anyhow::bail!("orchestrator requires at least one provider");
        };

        let search_provider = providers
            .iter()
            .find(|(_, p)| !p.uses_context())
            .map(|(name, _)| name.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                providers,
                ledger,
                store,
                assembler: ContextAssembler::new(chat.context_char_budget, chat.recent_turn_window),
                intent: SearchIntent::new(&chat.search_keywords),
                settings: TurnSettings {
                    max_attempts: chat.max_attempts,
                    summary_interval: chat.summary_interval,
                    summary_min_turns: chat.summary_min_turns,
                },
                current: Mutex::new(initial),
                last_provider: DashMap::new(),
                search_provider,
            }),
        })
    }

    /// Run one user turn through selection, failover, and persistence
    ///
    /// A missing session id starts a new conversation. Quota exhaustion
    /// across every provider returns the fallback outcome, never an error.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty prompt, a permanent provider
    /// failure, spent transient retries, or a store failure
    pub async fn run_turn(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        prompt: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(TurnError::EmptyPrompt);
        }

        let session = session_id
            .filter(|s| !s.is_empty())
            .map_or_else(mint_session_id, ToOwned::to_owned);

        let inner = &self.inner;
        let mut current = inner.current_name();

        // Search-intent prompts start on the search provider when it is
        // usable, bypassing the sticky pointer entirely
        if let Some(search) = &inner.search_provider
            && inner.intent.matches(prompt)
            && !inner.ledger.is_flagged(search)
        {
            tracing::info!(provider = %search, "search intent detected, starting on search provider");
            current.clone_from(search);
        }

        let mut switched_from: Option<String> = None;
        let mut calls = 0usize;

        loop {
            // Pre-flight: lazy reset, then trust the ledger
            inner.ledger.tick(&current);
            if inner.ledger.is_flagged(&current) || inner.ledger.is_exceeded(&current) {
                inner.ledger.mark_exceeded(&current);
                tracing::warn!(provider = %current, "provider exceeded before call, rotating");
                let Some(next) = inner.ledger.next_available(&current) else {
                    return self.fallback_turn(&session, user_id, prompt).await;
                };
                switched_from.get_or_insert_with(|| current.clone());
                current = next;
                continue;
            }

            // Proactive switch: don't pay for a call likely to run out
            if inner.ledger.is_near_ceiling(&current)
                && let Some(next) = inner.ledger.predict_next(&current)
            {
                tracing::warn!(
                    from = %current,
                    to = %next,
                    "quota nearly spent, switching before expiry"
                );
                switched_from.get_or_insert_with(|| current.clone());
                current = next;
            }

            let Some(selected) = inner.providers.get(&current).map(Arc::clone) else {
                return Err(TurnError::UnknownProvider { provider: current });
            };

            // Context carry-over on provider change or first in-process
            // call for this session; the search provider always gets the
            // raw prompt
            let needs_context = selected.uses_context()
                && inner
                    .last_provider
                    .get(&session)
                    .is_none_or(|last| *last != current);

            let context = if needs_context {
                match inner.assembler.assemble(inner.store.as_ref(), &session, user_id).await {
                    Ok(context) => context,
                    Err(e) => {
                        tracing::warn!(session = %session, error = %e, "context assembly failed, proceeding without");
                        None
                    }
                }
            } else {
                None
            };

            calls += 1;
            tracing::info!(provider = %current, attempt = calls, "calling provider");

            match selected.call(prompt, context.as_deref()).await {
                Ok(reply) => {
                    return self
                        .complete_turn(session, user_id, prompt, &current, switched_from, reply, context.as_deref())
                        .await;
                }
                Err(e) if e.is_quota() => {
                    tracing::warn!(provider = %current, error = %e, "quota-classified failure, failing over");
                    inner.ledger.mark_exceeded(&current);
                    switched_from.get_or_insert_with(|| current.clone());
                    if calls >= inner.settings.max_attempts {
                        return self.fallback_turn(&session, user_id, prompt).await;
                    }
                    let Some(next) = inner.ledger.next_available(&current) else {
                        return self.fallback_turn(&session, user_id, prompt).await;
                    };
                    current = next;
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(provider = %current, error = %e, attempt = calls, "transient failure");
                    if calls >= inner.settings.max_attempts {
                        return Err(TurnError::Provider(e));
                    }
                    // Rotation may land back on the same provider when it
                    // is the sole remaining candidate
                    if let Some(next) = inner.ledger.next_available(&current) {
                        if next != current {
                            switched_from.get_or_insert_with(|| current.clone());
                        }
                        current = next;
                    }
                }
                Err(e) => {
                    tracing::error!(provider = %current, error = %e, "permanent provider failure");
                    return Err(TurnError::Provider(e));
                }
            }
        }
    }

    /// Finish a successful turn: account usage, persist, update pointers
    async fn complete_turn(
        &self,
        session: String,
        user_id: &str,
        prompt: &str,
        provider_name: &str,
        switched_from: Option<String>,
        reply: ProviderReply,
        context: Option<&str>,
    ) -> Result<TurnOutcome, TurnError> {
        let inner = &self.inner;
        let conversational = inner
            .providers
            .get(provider_name)
            .is_some_and(|p| p.uses_context());

        // Search calls are metered by request only; conversational calls
        // fall back to the chars/4 estimate when usage is not reported
        let tokens = if conversational {
            reply.tokens_used.unwrap_or_else(|| {
                approx_tokens(prompt)
                    + context.map_or(0, approx_tokens)
                    + approx_tokens(&reply.text)
            })
        } else {
            reply.tokens_used.unwrap_or(0)
        };
        inner.ledger.record_usage(provider_name, tokens, 1);

        if let Some(snapshot) = inner.ledger.snapshot_of(provider_name) {
            tracing::info!(
                provider = %provider_name,
                tokens_used = snapshot.tokens_used,
                requests_made = snapshot.requests_made,
                reset_at_ms = snapshot.reset_at_ms,
                "usage recorded"
            );
        }

        inner.store.append(&session, user_id, Turn::user(prompt)).await?;
        let turn_count = inner
            .store
            .append(&session, user_id, Turn::assistant(reply.text.clone(), provider_name))
            .await?;

        inner.set_current(provider_name);

        if conversational {
            inner
                .last_provider
                .insert(session.clone(), provider_name.to_owned());

            if turn_count >= inner.settings.summary_min_turns
                && turn_count % inner.settings.summary_interval == 0
            {
                self.spawn_summary(&session, user_id);
            }
        }

        let switched = switched_from.is_some();
        tracing::info!(provider = %provider_name, switched, session = %session, "turn completed");

        Ok(TurnOutcome {
            text: reply.text,
            provider: provider_name.to_owned(),
            switched,
            switched_from,
            session_id: session,
        })
    }

    /// Serve the fixed degradation response when no provider is usable
    ///
    /// The turn is still recorded so the conversation survives intact.
    async fn fallback_turn(
        &self,
        session: &str,
        user_id: &str,
        prompt: &str,
    ) -> Result<TurnOutcome, TurnError> {
        tracing::error!(session, "all providers exhausted, serving fallback response");

        let inner = &self.inner;
        inner.store.append(session, user_id, Turn::user(prompt)).await?;
        inner
            .store
            .append(session, user_id, Turn::assistant(FALLBACK_TEXT, FALLBACK_PROVIDER))
            .await?;

        Ok(TurnOutcome {
            text: FALLBACK_TEXT.to_owned(),
            provider: FALLBACK_PROVIDER.to_owned(),
            switched: false,
            switched_from: None,
            session_id: session.to_owned(),
        })
    }

    /// Best-effort background summary refresh; never blocks the turn
    fn spawn_summary(&self, session: &str, user_id: &str) {
        let inner = Arc::clone(&self.inner);
        let session = session.to_owned();
        let user_id = user_id.to_owned();

        tokio::spawn(async move {
            let preferred = inner.current_name();
            summary::regenerate(
                &inner.providers,
                &inner.ledger,
                inner.store.as_ref(),
                &session,
                &user_id,
                &preferred,
                inner.settings.summary_min_turns,
            )
            .await;
        });
    }

    /// Read-only engine state for the status/monitoring surface
    ///
    /// A pure projection of the ledger — never mutates it.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            current_provider: self.inner.current_name(),
            providers: self.inner.ledger.snapshot(),
        }
    }

    /// Move the sticky current-provider pointer
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown or currently quota-flagged target
    pub fn switch_to(&self, target: &str) -> Result<(), TurnError> {
        if !self.inner.providers.contains_key(target) {
            return Err(TurnError::UnknownProvider {
                provider: target.to_owned(),
            });
        }
        if self.inner.ledger.is_flagged(target) {
            return Err(TurnError::ProviderUnavailable {
                provider: target.to_owned(),
            });
        }

        self.inner.set_current(target);
        tracing::info!(provider = target, "sticky current provider switched");
        Ok(())
    }
}

fn mint_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
