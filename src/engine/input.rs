// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chat input types, validation and prompt formatting.
//!
//! Invalid inputs are rejected, not truncated.

use serde::{Deserialize, Serialize};

use super::error::InferenceError;

/// Maximum total message content in bytes (64KB).
pub const MAX_TEXT_BYTES: usize = 65_536;

/// Prefix that leaves the assistant turn open at the end of a prompt.
pub const ASSISTANT_PREFIX: &str = "Assistant:";

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Label used in the flattened prompt.
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::System => "System",
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        }
    }
}

/// Validate a message history before it reaches the model.
pub fn validate_messages(messages: &[ChatMessage]) -> Result<(), InferenceError> {
    if messages.is_empty() {
        return Err(InferenceError::InputValidation("messages cannot be empty".into()));
    }
    let total_bytes: usize = messages.iter().map(|m| m.content.len()).sum();
    if total_bytes > MAX_TEXT_BYTES {
        return Err(InferenceError::InputValidation(format!(
            "total message content exceeds maximum: {} > {} bytes",
            total_bytes, MAX_TEXT_BYTES
        )));
    }
    Ok(())
}

/// Flatten a history into one prompt: a `"<Role>: <content>"` line per
/// message, then the open assistant prefix.
pub fn format_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        prompt.push_str(msg.role.label());
        prompt.push_str(": ");
        prompt.push_str(&msg.content);
        prompt.push('\n');
    }
    prompt.push_str(ASSISTANT_PREFIX);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_prompt() {
        let messages = vec![ChatMessage::user("any deals?"), ChatMessage::assistant("yes")];
        assert_eq!(format_prompt(&messages), "User: any deals?\nAssistant: yes\nAssistant:");
    }

    #[test]
    fn test_validate_rejects_empty_and_oversized() {
        assert!(validate_messages(&[]).is_err());
        let big = ChatMessage::user("x".repeat(MAX_TEXT_BYTES + 1));
        assert!(validate_messages(&[big]).is_err());
        assert!(validate_messages(&[ChatMessage::user("hi")]).is_ok());
    }

    #[test]
    fn test_role_serde() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, ChatRole::User);
    }
}
