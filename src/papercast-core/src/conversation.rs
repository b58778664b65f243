//! Conversation model and extraction from free-form model replies.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One of the two fixed podcast hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Speaker {
    #[serde(rename = "Brian")]
    HostA,
    #[serde(rename = "Jenny")]
    HostB,
}

impl Speaker {
    pub const ALL: [Speaker; 2] = [Speaker::HostA, Speaker::HostB];

    /// On-air name used in prompts and transcripts.
    pub fn name(&self) -> &'static str {
        match self {
            Speaker::HostA => "Brian",
            Speaker::HostB => "Jenny",
        }
    }

    /// Look up a host by on-air name, ignoring case and surrounding spaces.
    pub fn from_name(name: &str) -> Option<Speaker> {
        let name = name.trim();
        Speaker::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

impl<'de> Deserialize<'de> for Speaker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Speaker::from_name(&name)
            .ok_or_else(|| de::Error::unknown_variant(name.trim(), &["Brian", "Jenny"]))
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single turn of the dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: Speaker,
    pub text: String,
}

impl DialogueLine {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// Ordered, non-empty dialogue. Serializes as `{"conversation": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    conversation: Vec<DialogueLine>,
}

#[derive(Deserialize)]
struct ConversationDocument {
    conversation: Vec<DialogueLine>,
}

/// Why a model reply could not be turned into a [`Conversation`].
#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("Model returned an empty response")]
    EmptyReply,

    #[error("No valid JSON found in response")]
    NoJsonObject,

    #[error("Invalid conversation JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Conversation contains no lines")]
    EmptyConversation,

    #[error("Line {0} has no text")]
    BlankLine(usize),
}

impl Conversation {
    pub fn new(lines: Vec<DialogueLine>) -> Result<Self, ReplyError> {
        if lines.is_empty() {
            return Err(ReplyError::EmptyConversation);
        }
        if let Some(index) = lines.iter().position(|l| l.text.trim().is_empty()) {
            return Err(ReplyError::BlankLine(index));
        }
        Ok(Self {
            conversation: lines,
        })
    }

    /// Parse a persisted or extracted `{"conversation": [...]}` document.
    pub fn from_json(json: &str) -> Result<Self, ReplyError> {
        let document: ConversationDocument = serde_json::from_str(json)?;
        Self::new(document.conversation)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn lines(&self) -> &[DialogueLine] {
        &self.conversation
    }

    pub fn len(&self) -> usize {
        self.conversation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversation.is_empty()
    }
}

/// Extract a conversation from a reply that may wrap the JSON in prose.
pub fn parse_reply(reply: &str) -> Result<Conversation, ReplyError> {
    if reply.trim().is_empty() {
        return Err(ReplyError::EmptyReply);
    }
    let candidate = extract_json_object(reply).ok_or(ReplyError::NoJsonObject)?;
    Conversation::from_json(candidate)
}

/// Return the first balanced `{...}` object in `text`.
///
/// Nesting depth is unbounded and braces inside string literals are ignored.
/// An opening brace that never closes is skipped in favour of the next one.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(len) = balanced_object_len(&text.as_bytes()[start..]) {
            return Some(&text[start..start + len]);
        }
        search_from = start + 1;
    }
    None
}

/// Length of the object starting at `bytes[0] == b'{'`, if it closes.
fn balanced_object_len(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
