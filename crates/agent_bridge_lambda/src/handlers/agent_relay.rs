use agent_bridge_core::relay::{
    CompletionAccumulator, MessageType, RelayError, RelayMessage, RelayRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::adapters::agent_runtime::{AgentInvocation, AgentRuntime};
use crate::adapters::connection::ConnectionPusher;

const COMPONENT: &str = "agent_relay";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    /// The answer (TEXT, optional CITATIONS, END) was pushed.
    Delivered,
    /// The agent call failed and an ERROR was pushed in its place.
    Failed,
    /// The connection rejected a push, so the sequence was cut short.
    PushFailed,
    /// The event could not be parsed.
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelaySummary {
    pub status: RelayStatus,
    #[serde(rename = "messagesSent")]
    pub messages_sent: usize,
}

/// Parses the raw invocation and relays the agent's answer. Malformed
/// events still get an ERROR push when the connection and message ids can
/// be recovered.
pub fn handle_relay_payload(
    payload: Value,
    runtime: &impl AgentRuntime,
    pusher: &impl ConnectionPusher,
) -> RelaySummary {
    match serde_json::from_value::<RelayRequest>(payload.clone()) {
        Ok(request) => handle_relay_event(&request, runtime, pusher),
        Err(parse_error) => {
            error!(
                component = COMPONENT,
                event = "relay_rejected",
                error = %parse_error,
            );
            let connection_id = payload.get("connectionId").and_then(Value::as_str);
            let message_id = payload.get("messageId").and_then(Value::as_str);
            let messages_sent = match (connection_id, message_id) {
                (Some(connection_id), Some(message_id)) => {
                    let message = RelayMessage::new(
                        message_id,
                        MessageType::Error,
                        format!("Malformed relay request: {parse_error}"),
                    );
                    deliver(pusher, connection_id, &[message]).sent
                }
                _ => 0,
            };
            RelaySummary {
                status: RelayStatus::Rejected,
                messages_sent,
            }
        }
    }
}

/// Invokes the agent, drains its completion stream, and pushes the result.
///
/// Any failure while invoking or streaming replaces the whole answer with a
/// single ERROR push; nothing partial is sent.
pub fn handle_relay_event(
    request: &RelayRequest,
    runtime: &impl AgentRuntime,
    pusher: &impl ConnectionPusher,
) -> RelaySummary {
    info!(
        component = COMPONENT,
        event = "relay_started",
        session_id = %request.session_id,
        message_id = %request.message_id,
    );
    debug!(component = COMPONENT, event = "prompt", prompt = %request.user_query);

    let (status, messages) = match collect_completion(request, runtime) {
        Ok(messages) => (RelayStatus::Delivered, messages),
        Err(relay_error) => {
            error!(
                component = COMPONENT,
                event = "agent_failed",
                kind = relay_error.kind(),
                error = %relay_error,
            );
            (
                RelayStatus::Failed,
                vec![relay_error.into_message(&request.message_id)],
            )
        }
    };

    let delivery = deliver(pusher, &request.connection_id, &messages);
    let status = if delivery.completed {
        status
    } else {
        RelayStatus::PushFailed
    };
    let messages_sent = delivery.sent;
    info!(
        component = COMPONENT,
        event = "relay_finished",
        message_id = %request.message_id,
        status = ?status,
        messages_sent,
    );

    RelaySummary {
        status,
        messages_sent,
    }
}

fn collect_completion(
    request: &RelayRequest,
    runtime: &impl AgentRuntime,
) -> Result<Vec<RelayMessage>, RelayError> {
    let invocation = AgentInvocation::from(request);
    let mut stream = runtime.invoke_agent(&invocation)?;
    info!(
        component = COMPONENT,
        event = "agent_invoked",
        session_id = %request.session_id,
    );

    let mut accumulator = CompletionAccumulator::default();
    while let Some(chunk) = stream.next_chunk()? {
        debug!(
            component = COMPONENT,
            event = "completion_chunk",
            index = accumulator.chunk_count(),
            text = %chunk.text,
            citations = chunk.citations.len(),
        );
        accumulator.push(chunk);
    }

    debug!(
        component = COMPONENT,
        event = "completion_drained",
        chunks = accumulator.chunk_count(),
        text_len = accumulator.text().len(),
        citations = accumulator.citation_uris().count(),
    );
    Ok(accumulator.finish(&request.message_id))
}

struct Delivery {
    sent: usize,
    completed: bool,
}

/// Pushes messages in order and stops at the first failed push. A failed
/// push is followed by one best-effort ERROR push describing it.
fn deliver(
    pusher: &impl ConnectionPusher,
    connection_id: &str,
    messages: &[RelayMessage],
) -> Delivery {
    let mut sent = 0usize;
    for message in messages {
        match push(pusher, connection_id, message) {
            Ok(()) => sent += 1,
            Err(push_error) => {
                warn!(
                    component = COMPONENT,
                    event = "push_failed",
                    connection_id,
                    message_type = ?message.message_type,
                    error = %push_error,
                );
                if message.message_type != MessageType::Error {
                    let fallback =
                        RelayError::Transport(push_error).into_message(&message.message_id);
                    if push(pusher, connection_id, &fallback).is_ok() {
                        sent += 1;
                    }
                }
                return Delivery {
                    sent,
                    completed: false,
                };
            }
        }
    }
    Delivery {
        sent,
        completed: true,
    }
}

fn push(
    pusher: &impl ConnectionPusher,
    connection_id: &str,
    message: &RelayMessage,
) -> Result<(), String> {
    let data = message
        .to_json_bytes()
        .map_err(|error| format!("failed to encode relay message: {error}"))?;
    pusher.post_to_connection(connection_id, &data)
}
