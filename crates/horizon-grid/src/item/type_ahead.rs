//! Type-ahead search buffer.
//!
//! Characters typed in quick succession build a prefix; a pause longer than
//! the timeout starts a new one.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub(crate) struct TypeAhead {
    text: String,
    last: Option<Instant>,
    timeout: Duration,
}

impl TypeAhead {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            text: String::new(),
            last: None,
            timeout,
        }
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.last
            .is_none_or(|last| now.saturating_duration_since(last) > self.timeout)
    }

    /// Whether a prefix is being typed.
    pub(crate) fn is_active(&self, now: Instant) -> bool {
        !self.text.is_empty() && !self.is_expired(now)
    }

    /// Appends `c`. Returns whether it extends an earlier prefix rather than
    /// starting a new one.
    pub(crate) fn push(&mut self, c: char, now: Instant) -> bool {
        let extends = self.is_active(now);
        if !extends {
            self.text.clear();
        }
        self.text.push(c);
        self.last = Some(now);
        extends
    }

    /// Takes back the last [`push`](Self::push) after it matched nothing.
    pub(crate) fn reject_last(&mut self) {
        self.text.pop();
    }

    /// Removes the last character of a live prefix. Returns `false` when
    /// there was none.
    pub(crate) fn backspace(&mut self, now: Instant) -> bool {
        if !self.is_active(now) {
            self.text.clear();
            return false;
        }
        self.text.pop();
        self.last = Some(now);
        true
    }

    pub(crate) fn clear(&mut self) {
        self.text.clear();
        self.last = None;
    }
}

/// Case-insensitive prefix test.
pub(crate) fn matches_prefix(text: &str, prefix: &str) -> bool {
    let mut text = text.chars().flat_map(char::to_lowercase);
    prefix
        .chars()
        .flat_map(char::to_lowercase)
        .all(|p| text.next() == Some(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_grows_until_timeout() {
        let t0 = Instant::now();
        let mut search = TypeAhead::new(Duration::from_millis(1000));
        assert!(!search.push('b', t0));
        assert!(search.push('L', t0 + Duration::from_millis(400)));
        assert_eq!(search.text(), "bL");

        assert!(!search.push('c', t0 + Duration::from_millis(2000)));
        assert_eq!(search.text(), "c");
        search.reject_last();
        assert!(!search.is_active(t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn test_backspace_needs_live_prefix() {
        let t0 = Instant::now();
        let mut search = TypeAhead::new(Duration::from_millis(1000));
        assert!(!search.backspace(t0));
        search.push('a', t0);
        search.push('b', t0);
        assert!(search.backspace(t0 + Duration::from_millis(10)));
        assert_eq!(search.text(), "a");
        assert!(!search.backspace(t0 + Duration::from_secs(5)));
        assert_eq!(search.text(), "");
    }

    #[test]
    fn test_matches_prefix_ignores_case() {
        assert!(matches_prefix("Blueberry", "bLu"));
        assert!(matches_prefix("anything", ""));
        assert!(!matches_prefix("Bl", "blue"));
        assert!(!matches_prefix("cherry", "b"));
    }
}
