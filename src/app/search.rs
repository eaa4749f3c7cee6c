use std::time::{Duration, Instant};

use crate::backend::models::CatalogItem;

/// Search box state with debounced queries.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<CatalogItem>,
    pub searching: bool,
    last_query: String,
    debounce_since: Option<Instant>,
    debounce: Duration,
    min_chars: usize,
}

impl SearchState {
    pub fn new(debounce: Duration, min_chars: usize) -> Self {
        Self {
            query: String::new(),
            results: Vec::new(),
            searching: false,
            last_query: String::new(),
            debounce_since: None,
            debounce,
            min_chars,
        }
    }

    pub fn push_char(&mut self, c: char, now: Instant) {
        self.query.push(c);
        self.debounce_since = Some(now);
    }

    pub fn backspace(&mut self, now: Instant) {
        self.query.pop();
        if self.query.is_empty() {
            self.clear();
        } else {
            self.debounce_since = Some(now);
        }
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.results.clear();
        self.last_query.clear();
        self.debounce_since = None;
    }

    fn start(&mut self) -> Option<String> {
        let query = self.query.trim();
        if query.chars().count() < self.min_chars {
            self.results.clear();
            return None;
        }
        if self.searching || query == self.last_query {
            return None;
        }
        self.searching = true;
        self.last_query = query.to_string();
        Some(self.last_query.clone())
    }

    /// The query to run once typing has paused long enough.
    pub fn due(&mut self, now: Instant) -> Option<String> {
        let since = self.debounce_since?;
        if self.searching || now.saturating_duration_since(since) < self.debounce {
            return None;
        }
        self.debounce_since = None;
        self.start()
    }

    /// Enter skips the debounce.
    pub fn submit(&mut self) -> Option<String> {
        self.debounce_since = None;
        self.start()
    }

    /// Keeps results only for the most recently issued query.
    pub fn apply_results(&mut self, query: &str, results: Vec<CatalogItem>) -> bool {
        self.searching = false;
        if query != self.last_query {
            return false;
        }
        self.results = results;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(500);

    fn typed(text: &str, at: Instant) -> SearchState {
        let mut search = SearchState::new(DEBOUNCE, 2);
        for c in text.chars() {
            search.push_char(c, at);
        }
        search
    }

    #[test]
    fn waits_for_the_debounce() {
        let start = Instant::now();
        let mut search = typed("berserk", start);
        assert_eq!(search.due(start + Duration::from_millis(499)), None);
        assert_eq!(search.due(start + DEBOUNCE), Some("berserk".to_string()));
        assert!(search.searching);
        assert_eq!(search.due(start + DEBOUNCE * 2), None);
    }

    #[test]
    fn short_queries_are_not_sent() {
        let start = Instant::now();
        let mut search = typed("b", start);
        assert_eq!(search.due(start + DEBOUNCE), None);
        assert_eq!(search.submit(), None);
    }

    #[test]
    fn same_query_is_not_repeated() {
        let start = Instant::now();
        let mut search = typed("naruto", start);
        assert!(search.submit().is_some());
        assert!(search.apply_results("naruto", Vec::new()));
        assert_eq!(search.submit(), None);
    }

    #[test]
    fn late_results_for_an_old_query_are_ignored() {
        let start = Instant::now();
        let mut search = typed("one", start);
        search.submit();
        search.apply_results("one", Vec::new());
        search.push_char('s', start);
        assert_eq!(search.submit(), Some("ones".to_string()));
        assert!(!search.apply_results("one", Vec::new()));
        assert!(!search.searching);
    }

    #[test]
    fn typing_during_a_search_waits_for_it() {
        let start = Instant::now();
        let mut search = typed("one", start);
        assert!(search.submit().is_some());
        search.push_char('s', start);
        assert_eq!(search.due(start + DEBOUNCE), None);
        search.apply_results("one", Vec::new());
        assert_eq!(search.due(start + DEBOUNCE), Some("ones".to_string()));
    }

    #[test]
    fn deleting_everything_clears() {
        let start = Instant::now();
        let mut search = typed("ab", start);
        search.backspace(start);
        search.backspace(start);
        assert!(search.query.is_empty());
        assert_eq!(search.due(start + DEBOUNCE), None);
    }
}
