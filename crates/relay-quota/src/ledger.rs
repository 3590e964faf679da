use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use relay_core::now_ms;

/// Usage within 5 minutes of the reset boundary counts as near-ceiling
const RESET_IMMINENT_MS: u64 = 5 * 60 * 1000;

/// Quota ceilings and reset window for one provider
///
/// A `None` ceiling means unlimited on that dimension.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    pub max_tokens: Option<u64>,
    pub max_requests: Option<u64>,
    pub reset_interval: Duration,
}

/// Counters for one provider within the current reset window
#[derive(Debug, Clone)]
pub(crate) struct UsageRecord {
    pub(crate) tokens_used: u64,
    pub(crate) requests_made: u64,
    pub(crate) reset_at_ms: u64,
    /// Authoritative availability signal. Set by a quota-classified call
    /// failure or by counters crossing a ceiling; cleared only by the
    /// reset tick.
    pub(crate) exceeded: bool,
}

pub(crate) struct ProviderEntry {
    pub(crate) policy: QuotaPolicy,
    record: Mutex<UsageRecord>,
}

impl ProviderEntry {
    pub(crate) fn lock(&self) -> MutexGuard<'_, UsageRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide usage tracker for all configured providers
///
/// Declaration order of the providers defines the failover rotation
/// order. Every mutation is a single non-awaiting critical section per
/// provider, so concurrent turns cannot lose counter updates.
pub struct QuotaLedger {
    order: Vec<String>,
    entries: HashMap<String, ProviderEntry>,
}

impl QuotaLedger {
    /// Build a ledger from an ordered list of provider policies
    pub fn new<I>(policies: I) -> Self
    where
        I: IntoIterator<Item = (String, QuotaPolicy)>,
    {
        let now = now_ms();
        let mut order = Vec::new();
        let mut entries = HashMap::new();

        for (name, policy) in policies {
            let reset_at_ms = now + interval_ms(&policy);
            entries.insert(
                name.clone(),
                ProviderEntry {
                    policy,
                    record: Mutex::new(UsageRecord {
                        tokens_used: 0,
                        requests_made: 0,
                        reset_at_ms,
                        exceeded: false,
                    }),
                },
            );
            order.push(name);
        }

        Self { order, entries }
    }

    /// Provider names in rotation order
    pub fn providers(&self) -> &[String] {
        &self.order
    }

    /// Whether a provider with this name is tracked
    pub fn contains(&self, provider: &str) -> bool {
        self.entries.contains_key(provider)
    }

    /// Apply the lazy reset for a provider
    ///
    /// When the reset boundary has passed, counters are zeroed, the
    /// exceeded flag is cleared, and the next boundary is computed. Must
    /// run before any quota decision for that provider. Idempotent while
    /// no time elapses.
    pub fn tick(&self, provider: &str) {
        self.tick_at(provider, now_ms());
    }

    fn tick_at(&self, provider: &str, now: u64) {
        let Some(entry) = self.entries.get(provider) else {
            return;
        };
        let mut record = entry.lock();
        reset_if_due(&mut record, &entry.policy, now);
    }

    /// Whether usage counters have crossed either configured ceiling
    pub fn is_exceeded(&self, provider: &str) -> bool {
        self.entries
            .get(provider)
            .is_some_and(|entry| past_ceiling(&entry.lock(), &entry.policy))
    }

    /// Whether the provider carries the authoritative exceeded flag
    pub fn is_flagged(&self, provider: &str) -> bool {
        self.entries
            .get(provider)
            .is_some_and(|entry| entry.lock().exceeded)
    }

    /// Force-set the exceeded flag
    ///
    /// Used when a call fails with a quota-classified error: the
    /// provider's own signal beats our internal estimate even when the
    /// counters have not technically crossed a ceiling.
    pub fn mark_exceeded(&self, provider: &str) {
        let Some(entry) = self.entries.get(provider) else {
            return;
        };
        let mut record = entry.lock();
        if !record.exceeded {
            record.exceeded = true;
            tracing::warn!(
                provider,
                reset_at_ms = record.reset_at_ms,
                "provider flagged quota-exceeded until reset"
            );
        }
    }

    /// Whether usage sits at 90% of either ceiling, or the reset boundary
    /// is under five minutes away
    ///
    /// Drives proactive switching: prefer not to pay for a call likely to
    /// fail or run out mid-response.
    pub fn is_near_ceiling(&self, provider: &str) -> bool {
        self.is_near_ceiling_at(provider, now_ms())
    }

    fn is_near_ceiling_at(&self, provider: &str, now: u64) -> bool {
        let Some(entry) = self.entries.get(provider) else {
            return false;
        };
        let record = entry.lock();
        near_ceiling(&record, &entry.policy, now)
    }

    /// Add usage deltas for a completed call
    ///
    /// Called only after a provider call succeeds — never speculatively.
    /// Applies the lazy reset first, then adds, then raises the exceeded
    /// flag if a ceiling was crossed. The whole sequence holds the
    /// provider's lock, so concurrent turns cannot interleave.
    pub fn record_usage(&self, provider: &str, tokens_delta: u64, requests_delta: u64) {
        self.record_usage_at(provider, tokens_delta, requests_delta, now_ms());
    }

    fn record_usage_at(&self, provider: &str, tokens_delta: u64, requests_delta: u64, now: u64) {
        let Some(entry) = self.entries.get(provider) else {
            return;
        };
        let mut record = entry.lock();
        reset_if_due(&mut record, &entry.policy, now);

        record.tokens_used = record.tokens_used.saturating_add(tokens_delta);
        record.requests_made = record.requests_made.saturating_add(requests_delta);

        if !record.exceeded && past_ceiling(&record, &entry.policy) {
            record.exceeded = true;
            tracing::warn!(
                provider,
                tokens_used = record.tokens_used,
                requests_made = record.requests_made,
                "usage crossed quota ceiling, flagging provider"
            );
        }
    }

    /// Next provider after `from` in rotation order, skipping flagged ones
    ///
    /// Wraps around the declared list. May return `from` itself when it is
    /// the sole unflagged provider. Returns `None` only when every
    /// provider is flagged. Deterministic for a fixed flag set.
    pub fn next_available(&self, from: &str) -> Option<String> {
        let available: Vec<&String> = self
            .order
            .iter()
            .filter(|name| !self.is_flagged(name))
            .collect();

        if available.is_empty() {
            return None;
        }

        let next = available
            .iter()
            .position(|name| name.as_str() == from)
            .map_or(0, |idx| (idx + 1) % available.len());

        Some(available[next].clone())
    }

    pub(crate) fn entry(&self, provider: &str) -> Option<&ProviderEntry> {
        self.entries.get(provider)
    }
}

/// Zero the record and advance the boundary when the reset time passed
fn reset_if_due(record: &mut UsageRecord, policy: &QuotaPolicy, now: u64) {
    if now >= record.reset_at_ms {
        record.tokens_used = 0;
        record.requests_made = 0;
        record.exceeded = false;
        record.reset_at_ms = now + interval_ms(policy);
        tracing::info!(
            next_reset_ms = record.reset_at_ms,
            "quota counters reset for new window"
        );
    }
}

fn past_ceiling(record: &UsageRecord, policy: &QuotaPolicy) -> bool {
    if let Some(max) = policy.max_tokens
        && record.tokens_used >= max
    {
        return true;
    }
    if let Some(max) = policy.max_requests
        && record.requests_made >= max
    {
        return true;
    }
    false
}

pub(crate) fn near_ceiling(record: &UsageRecord, policy: &QuotaPolicy, now: u64) -> bool {
    if let Some(max) = policy.max_tokens
        && record.tokens_used.saturating_mul(10) >= max.saturating_mul(9)
    {
        return true;
    }
    if let Some(max) = policy.max_requests
        && record.requests_made.saturating_mul(10) >= max.saturating_mul(9)
    {
        return true;
    }
    record.reset_at_ms.saturating_sub(now) <= RESET_IMMINENT_MS
}

fn interval_ms(policy: &QuotaPolicy) -> u64 {
    u64::try_from(policy.reset_interval.as_millis()).unwrap_or(u64::MAX)
}
