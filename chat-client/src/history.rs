use serde::{Deserialize, Serialize};

/// Entries kept for context: the last ten exchanges.
pub const MAX_HISTORY_ENTRIES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Bounded transcript sent with every request.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed exchange, evicting the oldest entries past the bound.
    pub fn push_exchange(&mut self, user: &str, assistant: &str) {
        self.entries.push(HistoryEntry {
            role: Role::User,
            content: user.to_string(),
        });
        self.entries.push(HistoryEntry {
            role: Role::Assistant,
            content: assistant.to_string(),
        });

        if self.entries.len() > MAX_HISTORY_ENTRIES {
            let excess = self.entries.len() - MAX_HISTORY_ENTRIES;
            self.entries.drain(..excess);
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
