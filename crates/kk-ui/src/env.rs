//! The host environment: location, history, and registered elements.
//!
//! `kk-wasm` backs this with `window.location` / `window.history`; tests and
//! headless hosts use [`MemoryEnvironment`].

use std::collections::HashSet;

pub trait Environment {
    /// The current query string, including the leading `?` (or empty).
    fn search(&self) -> String;

    fn pathname(&self) -> String;

    /// Add a history entry for `url`.
    fn push_state(&mut self, url: &str);

    /// Overwrite the current history entry with `url`.
    fn replace_state(&mut self, url: &str);

    /// Whether a keyboard element named `name` can be instantiated.
    fn is_element_registered(&self, name: &str) -> bool;
}

/// How a history entry was last written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOp {
    Push(String),
    Replace(String),
}

/// In-memory history stack with a cursor, like a browser tab.
#[derive(Debug, Clone)]
pub struct MemoryEnvironment {
    entries: Vec<String>,
    cursor: usize,
    registered: HashSet<String>,
    /// Every push/replace, in call order.
    pub log: Vec<HistoryOp>,
}

impl MemoryEnvironment {
    /// Start at `url` (path plus optional query string).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            entries: vec![url.into()],
            cursor: 0,
            registered: HashSet::new(),
            log: Vec::new(),
        }
    }

    pub fn with_elements<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registered.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn register_element(&mut self, name: impl Into<String>) {
        self.registered.insert(name.into());
    }

    pub fn url(&self) -> &str {
        &self.entries[self.cursor]
    }

    pub fn history_len(&self) -> usize {
        self.entries.len()
    }

    /// Move back one entry. Returns false at the start of history. The
    /// caller is expected to deliver the pop-state event afterwards.
    pub fn back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn forward(&mut self) -> bool {
        if self.cursor + 1 >= self.entries.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    fn split(&self) -> (&str, &str) {
        let url = self.url();
        match url.find('?') {
            Some(i) => url.split_at(i),
            None => (url, ""),
        }
    }
}

impl Default for MemoryEnvironment {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Environment for MemoryEnvironment {
    fn search(&self) -> String {
        let (_, search) = self.split();
        if search == "?" { String::new() } else { search.to_string() }
    }

    fn pathname(&self) -> String {
        self.split().0.to_string()
    }

    fn push_state(&mut self, url: &str) {
        // Pushing drops any forward entries.
        self.entries.truncate(self.cursor + 1);
        self.entries.push(url.to_string());
        self.cursor += 1;
        self.log.push(HistoryOp::Push(url.to_string()));
    }

    fn replace_state(&mut self, url: &str) {
        self.entries[self.cursor] = url.to_string();
        self.log.push(HistoryOp::Replace(url.to_string()));
    }

    fn is_element_registered(&self, name: &str) -> bool {
        self.registered.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_query() {
        let env = MemoryEnvironment::new("/docs?kk-key=a");
        assert_eq!(env.pathname(), "/docs");
        assert_eq!(env.search(), "?kk-key=a");
        assert_eq!(MemoryEnvironment::new("/x?").search(), "");
    }

    #[test]
    fn push_truncates_forward_history() {
        let mut env = MemoryEnvironment::new("/a");
        env.push_state("/b");
        env.push_state("/c");
        assert!(env.back());
        assert!(env.back());
        assert!(!env.back());
        env.push_state("/d");
        assert_eq!(env.history_len(), 2);
        assert!(!env.forward());
        assert_eq!(env.url(), "/d");
    }

    #[test]
    fn replace_keeps_length() {
        let mut env = MemoryEnvironment::new("/a");
        env.replace_state("/a?x=1");
        assert_eq!(env.history_len(), 1);
        assert_eq!(env.log, vec![HistoryOp::Replace("/a?x=1".into())]);
    }
}
