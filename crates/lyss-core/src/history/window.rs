//! Selection of the recent messages that accompany a request

use super::{ChatHistory, Message};

/// Default bound on the window when no explicit count is given
pub const DEFAULT_MAX_SINCE_RESET: usize = 5;

/// How many stored messages go out with the next request.
///
/// An explicit `n_history` is used as-is, zero included. Otherwise the
/// window covers the turns since the last reset, capped at
/// `max_since_reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub n_history: Option<usize>,
    pub max_since_reset: usize,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            n_history: None,
            max_since_reset: DEFAULT_MAX_SINCE_RESET,
        }
    }
}

impl WindowPolicy {
    pub fn new(n_history: Option<usize>, max_since_reset: usize) -> Self {
        Self {
            n_history,
            max_since_reset,
        }
    }

    /// Number of most recent messages to include
    pub fn size(&self, turns_since_reset: usize) -> usize {
        match self.n_history {
            Some(n) => n,
            None => turns_since_reset.min(self.max_since_reset),
        }
    }

    /// The windowed suffix of `history`
    pub fn select<'a>(&self, history: &'a ChatHistory) -> &'a [Message] {
        history.last(self.size(history.turns_since_reset()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_with(count: usize) -> ChatHistory {
        let mut history = ChatHistory::new();
        for i in 0..count {
            history.add_message(Message::user(format!("message {}", i)));
        }
        history
    }

    #[test]
    fn test_default_window_is_capped() {
        let policy = WindowPolicy::new(None, 5);
        assert_eq!(policy.size(7), 5);
        assert_eq!(policy.size(3), 3);
        assert_eq!(policy.size(0), 0);
    }

    #[test]
    fn test_explicit_count_wins() {
        let policy = WindowPolicy::new(Some(2), 5);
        assert_eq!(policy.size(7), 2);
        assert_eq!(policy.size(0), 2);
    }

    #[test]
    fn test_explicit_zero_is_honoured() {
        let policy = WindowPolicy::new(Some(0), 5);
        let history = history_with(4);
        assert_eq!(policy.size(4), 0);
        assert!(policy.select(&history).is_empty());
    }

    #[test]
    fn test_select_after_reset() {
        let mut history = history_with(6);
        history.reset();
        history.add_message(Message::user("fresh"));

        let window = WindowPolicy::default().select(&history);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content(), "fresh");
    }

    #[test]
    fn test_select_larger_than_history() {
        let history = history_with(2);
        let window = WindowPolicy::new(Some(10), 5).select(&history);
        let contents: Vec<_> = window.iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["message 0", "message 1"]);
    }
}
