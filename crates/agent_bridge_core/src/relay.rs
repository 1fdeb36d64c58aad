use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

pub const AGENT_TIMEOUT_MESSAGE: &str =
    "Agent has timed out. Please check recent queries in Amazon Athena for the query results.";
pub const BROKEN_CONNECTION_SIGNATURE: &str = "Connection broken";
pub const CITATION_SEPARATOR: &str = ",";

/// Invocation payload for the relay, sent by the WebSocket backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub connection_id: String,
    pub session_id: String,
    pub message_id: String,
    pub user_query: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Citations,
    End,
    Error,
}

/// One frame pushed to the browser over the real-time channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayMessage {
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub text: String,
}

impl RelayMessage {
    pub fn new(message_id: &str, message_type: MessageType, text: impl Into<String>) -> Self {
        Self {
            message_id: message_id.to_string(),
            message_type,
            text: text.into(),
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievedReference {
    pub source_uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Citation {
    pub retrieved_references: Vec<RetrievedReference>,
}

/// A streamed completion fragment with any attribution attached to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionChunk {
    pub text: String,
    pub citations: Vec<Citation>,
}

impl CompletionChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }

    pub fn with_citation_uris<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.citations.push(Citation {
            retrieved_references: uris
                .into_iter()
                .map(|uri| RetrievedReference {
                    source_uri: Some(uri.into()),
                })
                .collect(),
        });
        self
    }
}

/// Folds a completion stream into its full text and the distinct source
/// URIs it cites, in first-seen order.
#[derive(Debug, Default)]
pub struct CompletionAccumulator {
    text: String,
    citation_uris: IndexSet<String>,
    chunks: usize,
}

impl CompletionAccumulator {
    pub fn push(&mut self, chunk: CompletionChunk) {
        self.chunks += 1;
        self.text.push_str(&chunk.text);
        let uris = chunk
            .citations
            .into_iter()
            .flat_map(|citation| citation.retrieved_references)
            .filter_map(|reference| reference.source_uri);
        self.citation_uris.extend(uris);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn citation_uris(&self) -> impl Iterator<Item = &str> {
        self.citation_uris.iter().map(String::as_str)
    }

    /// Messages to push once the stream is exhausted: TEXT, then CITATIONS
    /// when any were collected, then END.
    pub fn finish(self, message_id: &str) -> Vec<RelayMessage> {
        let mut messages = Vec::with_capacity(3);
        messages.push(RelayMessage::new(message_id, MessageType::Text, self.text));
        if !self.citation_uris.is_empty() {
            let joined = self
                .citation_uris
                .into_iter()
                .collect::<Vec<_>>()
                .join(CITATION_SEPARATOR);
            messages.push(RelayMessage::new(
                message_id,
                MessageType::Citations,
                joined,
            ));
        }
        messages.push(RelayMessage::new(message_id, MessageType::End, ""));
        messages
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The service rejected the call and said why.
    #[error("{message}")]
    Client {
        code: Option<String>,
        message: String,
    },
    /// The stream stalled or the connection dropped before completion.
    #[error("agent stream timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Transport(String),
}

impl RelayError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Client { .. } => "client",
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
        }
    }

    /// Text shown to the user in place of the answer.
    pub fn user_message(&self) -> String {
        match self {
            Self::Client { message, .. } => message.clone(),
            Self::Timeout(_) => AGENT_TIMEOUT_MESSAGE.to_string(),
            // TODO: drop the substring match once every CompletionStream
            // reports dropped connections as RelayError::Timeout.
            Self::Transport(message) if message.contains(BROKEN_CONNECTION_SIGNATURE) => {
                AGENT_TIMEOUT_MESSAGE.to_string()
            }
            Self::Transport(message) => message.clone(),
        }
    }

    pub fn into_message(self, message_id: &str) -> RelayMessage {
        RelayMessage::new(message_id, MessageType::Error, self.user_message())
    }
}
