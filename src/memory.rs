//! Per-session conversational memory.
//!
//! [`SessionStore`] owns an ordered, size-bounded turn history per session
//! identifier. Sessions are created lazily on first append and live for
//! the process lifetime; the only eviction is the per-session hard cap
//! (oldest turns first). One mutex guards the whole store: appends hold it
//! for the duration of the write, context building holds it only long
//! enough to snapshot the requested window.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Hard cap on turns retained per session.
pub const MAX_TURNS: usize = 80;

/// Upper bound on the context window depth.
pub const MAX_CONTEXT_DEPTH: usize = 10;

/// One immutable question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Central, injected store of session → turn history.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, VecDeque<Turn>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn, creating the session on first use and evicting the
    /// oldest turns once the cap is exceeded.
    pub fn append_turn(&self, session_id: &str, question: &str, answer: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let history = sessions.entry(session_id.to_string()).or_default();

        history.push_back(Turn {
            question: question.to_string(),
            answer: answer.to_string(),
        });
        while history.len() > MAX_TURNS {
            history.pop_front();
        }
    }

    /// Formats the most recent `min(depth, history)` turns, oldest of the
    /// window first, as alternating question/answer blocks. `depth` is
    /// clamped into `[0, MAX_CONTEXT_DEPTH]`; depth 0 or an unknown
    /// session yields an empty string. Read-only.
    pub fn build_context(&self, session_id: &str, depth: usize) -> String {
        let depth = depth.min(MAX_CONTEXT_DEPTH);
        if depth == 0 {
            return String::new();
        }

        // Snapshot the window under the lock, format outside it.
        let window: Vec<Turn> = {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            match sessions.get(session_id) {
                Some(history) => history
                    .iter()
                    .skip(history.len().saturating_sub(depth))
                    .cloned()
                    .collect(),
                None => return String::new(),
            }
        };

        window
            .iter()
            .map(|t| format!("User: {}\nAssistant: {}", t.question, t.answer))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Number of retained turns for a session (0 if it does not exist).
    pub fn turn_count(&self, session_id: &str) -> usize {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(session_id).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_lazy_creation_and_append() {
        let store = SessionStore::new();
        assert_eq!(store.turn_count("s1"), 0);

        store.append_turn("s1", "q1", "a1");
        assert_eq!(store.turn_count("s1"), 1);
        assert_eq!(store.turn_count("s2"), 0);
    }

    #[test]
    fn test_cap_evicts_oldest_fifo() {
        let store = SessionStore::new();
        for i in 0..85 {
            store.append_turn("s", &format!("q{}", i), &format!("a{}", i));
        }
        assert_eq!(store.turn_count("s"), 80);

        // The 5 oldest turns are gone and order is preserved.
        let sessions = store.sessions.lock().unwrap();
        let history = sessions.get("s").unwrap();
        assert_eq!(history.front().unwrap().question, "q5");
        assert_eq!(history.back().unwrap().question, "q84");
        for (i, turn) in history.iter().enumerate() {
            assert_eq!(turn.question, format!("q{}", i + 5));
        }
    }

    #[test]
    fn test_context_window_format() {
        let store = SessionStore::new();
        store.append_turn("s", "first question", "first answer");
        store.append_turn("s", "second question", "second answer");

        let context = store.build_context("s", 10);
        assert_eq!(
            context,
            "User: first question\nAssistant: first answer\n\n\
             User: second question\nAssistant: second answer"
        );
    }

    #[test]
    fn test_depth_clamped_to_ten() {
        let store = SessionStore::new();
        for i in 0..20 {
            store.append_turn("s", &format!("q{}", i), &format!("a{}", i));
        }
        assert_eq!(store.build_context("s", 15), store.build_context("s", 10));
        // Window of 10: starts at q10.
        assert!(store.build_context("s", 15).starts_with("User: q10\n"));
    }

    #[test]
    fn test_depth_zero_is_empty() {
        let store = SessionStore::new();
        store.append_turn("s", "q", "a");
        assert_eq!(store.build_context("s", 0), "");
    }

    #[test]
    fn test_unknown_session_is_empty() {
        let store = SessionStore::new();
        assert_eq!(store.build_context("nobody", 10), "");
    }

    #[test]
    fn test_concurrent_appends_no_cross_session_interference() {
        let store = Arc::new(SessionStore::new());
        let mut handles = Vec::new();

        for t in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let sid = format!("session-{}", t % 4);
                for i in 0..50 {
                    store.append_turn(&sid, &format!("q{}", i), &format!("a{}", i));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // Two writers per session, 50 turns each, capped at 80.
        for t in 0..4 {
            assert_eq!(store.turn_count(&format!("session-{}", t)), 80);
        }
    }
}
