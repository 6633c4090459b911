//! Per-user memory of names, likes, and recent topics.
//!
//! Profiles live for the lifetime of the process; there is no persistence
//! and no eviction. All mutation goes through `absorb`, which holds the
//! store lock for the whole read-modify-write so concurrent messages from
//! the same user cannot lose updates.

use std::collections::HashMap;

use regex::Regex;
use tokio::sync::Mutex;

/// How many recent messages to keep per user.
const LAST_TOPICS_MAX: usize = 5;

/// What the bot remembers about one user.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub name: Option<String>,
    /// Liked topics in insertion order, no duplicates.
    pub likes: Vec<String>,
    /// The most recent messages, oldest first.
    pub last: Vec<String>,
}

/// Process-wide profile store, keyed by PSID.
pub struct MemoryStore {
    profiles: Mutex<HashMap<String, Profile>>,
    name_pattern: Regex,
    like_pattern: Regex,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            name_pattern: Regex::new(
                r"(?i)(?:me llamo|mi nombre es|I'm|I am)\s+([A-Za-zÁÉÍÓÚÑáéíóúñ]+)",
            )
            .unwrap(),
            like_pattern: Regex::new(r"(?i)(?:me gustan?|i like)\s+(.+)").unwrap(),
        }
    }

    /// Current profile for a user, or an empty default.
    ///
    /// Does not create an entry; profiles are only materialized by `absorb`.
    pub async fn snapshot(&self, psid: &str) -> Profile {
        self.profiles
            .lock()
            .await
            .get(psid)
            .cloned()
            .unwrap_or_default()
    }

    /// Record a message into the user's profile.
    ///
    /// Opportunistically captures a self-introduced name and a liked topic,
    /// then appends the text to the recent-message window (oldest evicted
    /// past 5 entries). One lock acquisition for the whole update.
    pub async fn absorb(&self, psid: &str, text: &str) {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles.entry(psid.to_string()).or_default();

        if let Some(captures) = self.name_pattern.captures(text) {
            profile.name = Some(captures[1].to_string());
        }

        if let Some(captures) = self.like_pattern.captures(text) {
            let like = captures[1].trim();
            if !like.is_empty() && !profile.likes.iter().any(|l| l == like) {
                profile.likes.push(like.to_string());
            }
        }

        profile.last.push(text.to_string());
        if profile.last.len() > LAST_TOPICS_MAX {
            let excess = profile.last.len() - LAST_TOPICS_MAX;
            profile.last.drain(..excess);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
