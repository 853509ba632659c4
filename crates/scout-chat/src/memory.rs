// Bounded conversation memory.

use serde::Serialize;

pub const DEFAULT_MAX_MESSAGES: usize = 5;

/// Capitalized words that never count as conversation entities.
const ENTITY_STOP_WORDS: &[&str] = &[
    "Find", "Show", "Compare", "Who", "What", "How", "The", "A", "An",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Keeps only the most recent `max_messages` turns.
#[derive(Debug, Clone)]
pub struct ChatMemory {
    max_messages: usize,
    history: Vec<ChatMessage>,
}

impl Default for ChatMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

impl ChatMemory {
    pub fn new(max_messages: usize) -> Self {
        ChatMemory {
            max_messages,
            history: Vec::new(),
        }
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(ChatMessage::new(role, content));
        if self.history.len() > self.max_messages {
            let excess = self.history.len() - self.max_messages;
            self.history.drain(..excess);
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// The last `n` messages, oldest first.
    pub fn last_n(&self, n: usize) -> &[ChatMessage] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Capitalized words seen in the conversation, first occurrence order.
    pub fn context_entities(&self) -> Vec<String> {
        let mut entities: Vec<String> = Vec::new();
        for message in &self.history {
            for word in message.content.split_whitespace() {
                let word = word.trim_matches(|c: char| !c.is_alphanumeric());
                let capitalized = word.chars().next().is_some_and(char::is_uppercase);
                if capitalized
                    && !ENTITY_STOP_WORDS.contains(&word)
                    && !entities.iter().any(|e| e == word)
                {
                    entities.push(word.to_string());
                }
            }
        }
        entities
    }

    /// History rendered for a prompt; empty when nothing has been said.
    pub fn formatted_history(&self) -> String {
        if self.history.is_empty() {
            return String::new();
        }
        let mut out = String::from("## Conversation History\n");
        for message in &self.history {
            out.push_str(&format!("{}: {}\n", message.role.as_str(), message.content));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_most_recent_messages() {
        let mut memory = ChatMemory::new(3);
        for i in 0..5 {
            memory.add_message(Role::User, format!("message {i}"));
        }
        let contents: Vec<&str> = memory.history().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
        assert_eq!(memory.last_n(2)[0].content, "message 3");
        assert_eq!(memory.last_n(10).len(), 3);
    }

    #[test]
    fn formatted_history_lists_roles() {
        let mut memory = ChatMemory::default();
        assert_eq!(memory.formatted_history(), "");

        memory.add_message(Role::User, "Who is Saliba?");
        memory.add_message(Role::Assistant, "A centre back.");
        assert_eq!(
            memory.formatted_history(),
            "## Conversation History\nuser: Who is Saliba?\nassistant: A centre back.\n"
        );
    }

    #[test]
    fn context_entities_deduplicate_and_skip_stop_words() {
        let mut memory = ChatMemory::default();
        memory.add_message(Role::User, "Compare Saliba and Gabriel");
        memory.add_message(Role::Assistant, "The data favours Saliba.");
        assert_eq!(memory.context_entities(), vec!["Saliba", "Gabriel"]);

        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.context_entities().is_empty());
    }
}
