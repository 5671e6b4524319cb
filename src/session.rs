//! # Session Module
//!
//! Process-memory user sessions: profile, bounded AI conversation history
//! and activity counters. Nothing here survives a restart.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

/// Exchanges kept per user
pub const MAX_HISTORY: usize = 10;
/// Exchanges replayed into the AI prompt
pub const HISTORY_IN_PROMPT: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: u64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub is_admin: bool,
    pub history: VecDeque<Exchange>,
    pub last_activity: DateTime<Utc>,
    pub message_count: u64,
    pub ai_turns: u64,
}

impl UserSession {
    fn new(user_id: u64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username: None,
            first_name: None,
            is_admin: false,
            history: VecDeque::with_capacity(MAX_HISTORY),
            last_activity: now,
            message_count: 0,
            ai_turns: 0,
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.username) {
            (Some(first), _) => first.clone(),
            (None, Some(username)) => format!("@{username}"),
            (None, None) => self.user_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub total: usize,
    pub admins: usize,
    pub active_24h: usize,
    pub messages: u64,
    pub ai_turns: u64,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<u64, UserSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, UserSession>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record activity for a user, creating the session on first contact
    pub fn touch(
        &self,
        user_id: u64,
        username: Option<&str>,
        first_name: Option<&str>,
        is_admin: bool,
        now: DateTime<Utc>,
    ) {
        let mut sessions = self.lock();
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| UserSession::new(user_id, now));
        if username.is_some() {
            session.username = username.map(str::to_string);
        }
        if first_name.is_some() {
            session.first_name = first_name.map(str::to_string);
        }
        session.is_admin = is_admin;
        session.last_activity = now;
        session.message_count += 1;
    }

    /// Append an AI exchange, dropping the oldest once the history is full
    pub fn record_exchange(&self, user_id: u64, user: &str, assistant: &str, now: DateTime<Utc>) {
        let mut sessions = self.lock();
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| UserSession::new(user_id, now));
        if session.history.len() == MAX_HISTORY {
            session.history.pop_front();
        }
        session.history.push_back(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
            at: now,
        });
        session.ai_turns += 1;
        session.last_activity = now;
    }

    /// The most recent `last_n` exchanges formatted for a prompt, oldest first
    pub fn history_context(&self, user_id: u64, last_n: usize) -> String {
        let sessions = self.lock();
        let Some(session) = sessions.get(&user_id) else {
            return String::new();
        };

        let skip = session.history.len().saturating_sub(last_n);
        session
            .history
            .iter()
            .skip(skip)
            .map(|ex| format!("User: {}\nAssistant: {}", ex.user, ex.assistant))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear_history(&self, user_id: u64) {
        if let Some(session) = self.lock().get_mut(&user_id) {
            session.history.clear();
        }
    }

    pub fn get(&self, user_id: u64) -> Option<UserSession> {
        self.lock().get(&user_id).cloned()
    }

    pub fn stats(&self, now: DateTime<Utc>) -> SessionStats {
        let sessions = self.lock();
        let cutoff = now - Duration::hours(24);
        sessions.values().fold(
            SessionStats {
                total: sessions.len(),
                ..SessionStats::default()
            },
            |mut acc, s| {
                if s.is_admin {
                    acc.admins += 1;
                }
                if s.last_activity > cutoff {
                    acc.active_24h += 1;
                }
                acc.messages += s.message_count;
                acc.ai_turns += s.ai_turns;
                acc
            },
        )
    }

    /// Most active sessions by message count
    pub fn top_users(&self, limit: usize) -> Vec<UserSession> {
        let mut all: Vec<UserSession> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| b.message_count.cmp(&a.message_count));
        all.truncate(limit);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let registry = SessionRegistry::new();
        let now = Utc::now();
        for i in 0..15 {
            registry.record_exchange(7, &format!("q{i}"), &format!("a{i}"), now);
        }
        let session = registry.get(7).unwrap();
        assert_eq!(session.history.len(), MAX_HISTORY);
        assert_eq!(session.history.front().unwrap().user, "q5");
        assert_eq!(session.ai_turns, 15);
    }

    #[test]
    fn test_history_context_uses_last_exchanges_in_order() {
        let registry = SessionRegistry::new();
        let now = Utc::now();
        for i in 0..6 {
            registry.record_exchange(1, &format!("q{i}"), &format!("a{i}"), now);
        }
        let ctx = registry.history_context(1, HISTORY_IN_PROMPT);
        assert!(!ctx.contains("q1"));
        assert!(ctx.starts_with("User: q2"));
        assert!(ctx.ends_with("Assistant: a5"));
        assert_eq!(registry.history_context(99, 4), "");
    }

    #[test]
    fn test_stats_counts_recent_activity() {
        let registry = SessionRegistry::new();
        let now = Utc::now();
        registry.touch(1, Some("rahim"), Some("Rahim"), true, now);
        registry.touch(2, None, None, false, now - Duration::hours(30));
        registry.touch(1, None, None, true, now);

        let stats = registry.stats(now);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.admins, 1);
        assert_eq!(stats.active_24h, 1);
        assert_eq!(stats.messages, 3);
        assert_eq!(registry.get(1).unwrap().display_name(), "Rahim");
        assert_eq!(registry.top_users(1)[0].user_id, 1);
    }

    #[test]
    fn test_clear_history() {
        let registry = SessionRegistry::new();
        registry.record_exchange(3, "hi", "hello", Utc::now());
        registry.clear_history(3);
        assert!(registry.get(3).unwrap().history.is_empty());
    }
}
