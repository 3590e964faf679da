use serde::Serialize;

use relay_core::now_ms;

use crate::ledger::{QuotaLedger, near_ceiling};

/// How soon a near-ceiling provider is predicted to run out
const IMMINENT_EXPIRY_MS: u64 = 5 * 60 * 1000;

/// Read-only projection of one provider's ledger state
///
/// Consumed by the status/monitoring surface. Producing a snapshot never
/// mutates the ledger — in particular it does not run the lazy reset.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    pub name: String,
    pub tokens_used: u64,
    pub requests_made: u64,
    pub max_tokens: Option<u64>,
    pub max_requests: Option<u64>,
    pub reset_at_ms: u64,
    pub exceeded: bool,
    pub near_ceiling: bool,
    /// When this provider is predicted to become unavailable
    pub predicted_expiry_ms: u64,
    /// Which provider a switch away from this one would land on
    pub predicted_next: Option<String>,
}

impl QuotaLedger {
    /// Snapshot every provider's usage state in rotation order
    pub fn snapshot(&self) -> Vec<ProviderSnapshot> {
        let now = now_ms();
        self.providers()
            .iter()
            .filter_map(|name| self.snapshot_of_at(name, now))
            .collect()
    }

    /// Snapshot a single provider's usage state
    pub fn snapshot_of(&self, provider: &str) -> Option<ProviderSnapshot> {
        self.snapshot_of_at(provider, now_ms())
    }

    fn snapshot_of_at(&self, provider: &str, now: u64) -> Option<ProviderSnapshot> {
        let entry = self.entry(provider)?;
        let policy = entry.policy.clone();
        let record = entry.lock().clone();

        let at_ninety = |used: u64, max: Option<u64>| {
            max.is_some_and(|max| used.saturating_mul(10) >= max.saturating_mul(9))
        };
        let predicted_expiry_ms = if at_ninety(record.tokens_used, policy.max_tokens)
            || at_ninety(record.requests_made, policy.max_requests)
        {
            now + IMMINENT_EXPIRY_MS
        } else {
            record.reset_at_ms
        };

        Some(ProviderSnapshot {
            name: provider.to_owned(),
            tokens_used: record.tokens_used,
            requests_made: record.requests_made,
            max_tokens: policy.max_tokens,
            max_requests: policy.max_requests,
            reset_at_ms: record.reset_at_ms,
            exceeded: record.exceeded,
            near_ceiling: near_ceiling(&record, &policy, now),
            predicted_expiry_ms,
            predicted_next: self.predict_next(provider),
        })
    }

    /// First unflagged provider other than `from`, in declared order
    pub fn predict_next(&self, from: &str) -> Option<String> {
        self.providers()
            .iter()
            .find(|name| name.as_str() != from && !self.is_flagged(name))
            .cloned()
    }
}
