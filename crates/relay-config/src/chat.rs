use serde::Deserialize;

/// Turn handling and failover knobs
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ChatConfig {
    /// Maximum provider calls per user turn
    pub max_attempts: usize,
    /// Character budget for assembled carry-over context
    pub context_char_budget: usize,
    /// How many recent turns the context assembler includes
    pub recent_turn_window: usize,
    /// Regenerate the conversation summary every N turns
    pub summary_interval: usize,
    /// Skip summary generation below this many turns
    pub summary_min_turns: usize,
    /// Prompts containing any of these (case-insensitive) start on the
    /// search provider. The matching semantics are plain substring checks.
    pub search_keywords: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            context_char_budget: 4000,
            recent_turn_window: 6,
            summary_interval: 10,
            summary_min_turns: 4,
            search_keywords: default_search_keywords(),
        }
    }
}

/// Keyword list tuned against real traffic; known to both over- and
/// under-trigger. Changing it is a product decision, not a code cleanup.
fn default_search_keywords() -> Vec<String> {
    [
        "search",
        "latest",
        "current",
        "news",
        "recent",
        "what happened",
        "find",
        "weather",
        "price",
        "stock",
    ]
    .iter()
    .map(|s| (*s).to_owned())
    .collect()
}
