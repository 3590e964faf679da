//! Search-intent detection for initial provider selection

/// Decides whether a prompt should start on the web-search provider
///
/// A pluggable policy wrapping a fixed keyword list. The matching is a
/// plain case-insensitive substring check — it both over- and
/// under-triggers, and changing the semantics is a product decision.
#[derive(Debug, Clone)]
pub struct SearchIntent {
    keywords: Vec<String>,
}

impl SearchIntent {
    /// Build from a configured keyword list
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Whether the prompt looks like a search query
    pub fn matches(&self, prompt: &str) -> bool {
        let lowered = prompt.to_lowercase();
        self.keywords.iter().any(|keyword| lowered.contains(keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> SearchIntent {
        SearchIntent::new(&["weather".to_owned(), "latest".to_owned(), "news".to_owned()])
    }

    #[test]
    fn matches_keyword_case_insensitively() {
        assert!(intent().matches("What's the WEATHER in Berlin?"));
        assert!(intent().matches("latest rust release"));
    }

    #[test]
    fn matches_keyword_inside_words() {
        // Substring semantics are intentional, even when they over-trigger
        assert!(intent().matches("renewsletter archive"));
    }

    #[test]
    fn ignores_unrelated_prompts() {
        assert!(!intent().matches("explain lifetimes to me"));
    }
}
