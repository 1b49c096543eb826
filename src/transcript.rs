//! Append-only record of who said what during a call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Tag used on prompt lines.
    pub fn tag(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        })
    }
}

/// One transcribed fragment, in the order it arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub role: Role,
    pub text: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    utterances: Vec<Utterance>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment stamped with the current time. Blank text is ignored.
    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.push_at(role, text, Utc::now());
    }

    pub fn push_at(&mut self, role: Role, text: impl Into<String>, timestamp: DateTime<Utc>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.utterances.push(Utterance {
            role,
            text,
            timestamp,
        });
    }

    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    /// `USER: ...` / `ASSISTANT: ...` lines joined by newlines.
    pub fn to_prompt_lines(&self) -> String {
        self.utterances
            .iter()
            .map(|u| format!("{}: {}", u.role.tag(), u.text.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
