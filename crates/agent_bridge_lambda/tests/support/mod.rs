#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use agent_bridge_core::query::{QueryResultSet, QueryStatusReport};
use agent_bridge_core::relay::{CompletionChunk, RelayError};
use agent_bridge_lambda::adapters::agent_runtime::{
    AgentInvocation, AgentRuntime, CompletionStream,
};
use agent_bridge_lambda::adapters::clock::Sleeper;
use agent_bridge_lambda::adapters::connection::ConnectionPusher;
use agent_bridge_lambda::adapters::query_engine::QueryEngine;
use serde_json::Value;

/// Query engine that replays a fixed status script. The last status repeats
/// once the script runs out.
pub struct ScriptedQueryEngine {
    statuses: Mutex<VecDeque<QueryStatusReport>>,
    results: QueryResultSet,
    start_error: Option<String>,
    pub submitted: Mutex<Vec<(String, String)>>,
    pub status_checks: Mutex<usize>,
    pub result_fetches: Mutex<usize>,
}

impl ScriptedQueryEngine {
    pub fn new(statuses: Vec<QueryStatusReport>, results: QueryResultSet) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            results,
            start_error: None,
            submitted: Mutex::new(Vec::new()),
            status_checks: Mutex::new(0),
            result_fetches: Mutex::new(0),
        }
    }

    pub fn failing_to_start(message: &str) -> Self {
        let mut engine = Self::new(Vec::new(), QueryResultSet::default());
        engine.start_error = Some(message.to_string());
        engine
    }

    pub fn submitted(&self) -> Vec<(String, String)> {
        self.submitted.lock().expect("poisoned mutex").clone()
    }

    pub fn status_checks(&self) -> usize {
        *self.status_checks.lock().expect("poisoned mutex")
    }

    pub fn result_fetches(&self) -> usize {
        *self.result_fetches.lock().expect("poisoned mutex")
    }
}

impl QueryEngine for ScriptedQueryEngine {
    fn start_query(&self, query: &str, output_location: &str) -> Result<String, String> {
        if let Some(message) = &self.start_error {
            return Err(message.clone());
        }
        self.submitted
            .lock()
            .expect("poisoned mutex")
            .push((query.to_string(), output_location.to_string()));
        Ok("exec-42".to_string())
    }

    fn query_status(&self, _query_execution_id: &str) -> Result<QueryStatusReport, String> {
        *self.status_checks.lock().expect("poisoned mutex") += 1;
        let mut statuses = self.statuses.lock().expect("poisoned mutex");
        if statuses.len() > 1 {
            statuses
                .pop_front()
                .ok_or_else(|| "status script exhausted".to_string())
        } else {
            statuses
                .front()
                .cloned()
                .ok_or_else(|| "status script exhausted".to_string())
        }
    }

    fn query_results(&self, _query_execution_id: &str) -> Result<QueryResultSet, String> {
        *self.result_fetches.lock().expect("poisoned mutex") += 1;
        Ok(self.results.clone())
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    pub pauses: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().expect("poisoned mutex").clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.pauses.lock().expect("poisoned mutex").push(duration);
    }
}

/// Agent runtime whose stream yields scripted items in order.
pub struct ScriptedAgentRuntime {
    items: Vec<Result<CompletionChunk, RelayError>>,
    pub invocations: Mutex<Vec<AgentInvocation>>,
}

impl ScriptedAgentRuntime {
    pub fn new(items: Vec<Result<CompletionChunk, RelayError>>) -> Self {
        Self {
            items,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<AgentInvocation> {
        self.invocations.lock().expect("poisoned mutex").clone()
    }
}

struct ScriptedStream {
    items: VecDeque<Result<CompletionChunk, RelayError>>,
}

impl CompletionStream for ScriptedStream {
    fn next_chunk(&mut self) -> Result<Option<CompletionChunk>, RelayError> {
        self.items.pop_front().transpose()
    }
}

impl AgentRuntime for ScriptedAgentRuntime {
    fn invoke_agent<'a>(
        &'a self,
        invocation: &AgentInvocation,
    ) -> Result<Box<dyn CompletionStream + 'a>, RelayError> {
        self.invocations
            .lock()
            .expect("poisoned mutex")
            .push(invocation.clone());
        Ok(Box::new(ScriptedStream {
            items: self.items.clone().into(),
        }))
    }
}

#[derive(Default)]
pub struct CapturingPusher {
    pushes: Mutex<Vec<(String, Value)>>,
}

impl CapturingPusher {
    pub fn pushes(&self) -> Vec<(String, Value)> {
        self.pushes.lock().expect("poisoned mutex").clone()
    }

    pub fn messages(&self) -> Vec<Value> {
        self.pushes()
            .into_iter()
            .map(|(_, message)| message)
            .collect()
    }
}

impl ConnectionPusher for CapturingPusher {
    fn post_to_connection(&self, connection_id: &str, data: &[u8]) -> Result<(), String> {
        let message = serde_json::from_slice(data).map_err(|error| error.to_string())?;
        self.pushes
            .lock()
            .expect("poisoned mutex")
            .push((connection_id.to_string(), message));
        Ok(())
    }
}
