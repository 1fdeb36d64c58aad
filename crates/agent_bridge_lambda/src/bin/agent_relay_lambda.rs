use std::time::Duration;

use agent_bridge_core::relay::{CompletionChunk, RelayError};
use agent_bridge_lambda::adapters::agent_runtime::{
    chunk_from_payload, classify_sdk_error, AgentInvocation, AgentRuntime, CompletionStream,
};
use agent_bridge_lambda::adapters::blocking::block_on_current;
use agent_bridge_lambda::adapters::connection::ConnectionPusher;
use agent_bridge_lambda::config::AgentRelayConfig;
use agent_bridge_lambda::handlers::agent_relay::{handle_relay_payload, RelaySummary};
use agent_bridge_lambda::telemetry::init_tracing;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_apigatewaymanagement::primitives::Blob;
use aws_sdk_bedrockagentruntime::primitives::event_stream::EventReceiver;
use aws_sdk_bedrockagentruntime::types::error::ResponseStreamError;
use aws_sdk_bedrockagentruntime::types::ResponseStream;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

// Long-running agent turns (several tool calls plus Athena polling) need
// far more than the SDK's default read timeout.
const AGENT_CONNECT_TIMEOUT: Duration = Duration::from_secs(900);
const AGENT_READ_TIMEOUT: Duration = Duration::from_secs(900);

struct BedrockAgentRuntime {
    client: aws_sdk_bedrockagentruntime::Client,
    agent_id: String,
    agent_alias_id: String,
}

struct BedrockCompletionStream {
    receiver: EventReceiver<ResponseStream, ResponseStreamError>,
}

impl AgentRuntime for BedrockAgentRuntime {
    fn invoke_agent<'a>(
        &'a self,
        invocation: &AgentInvocation,
    ) -> Result<Box<dyn CompletionStream + 'a>, RelayError> {
        let request = self
            .client
            .invoke_agent()
            .agent_id(&self.agent_id)
            .agent_alias_id(&self.agent_alias_id)
            .session_id(&invocation.session_id)
            .input_text(&invocation.input_text);

        let output = block_on_current(request.send()).map_err(classify_sdk_error)?;
        Ok(Box::new(BedrockCompletionStream {
            receiver: output.completion,
        }))
    }
}

impl CompletionStream for BedrockCompletionStream {
    fn next_chunk(&mut self) -> Result<Option<CompletionChunk>, RelayError> {
        loop {
            let event = block_on_current(self.receiver.recv()).map_err(classify_sdk_error)?;
            match event {
                Some(ResponseStream::Chunk(part)) => return Ok(Some(chunk_from_payload(&part))),
                // trace, return-control and other events carry no answer text
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }
}

struct ApiGatewayConnectionPusher {
    client: aws_sdk_apigatewaymanagement::Client,
}

impl ConnectionPusher for ApiGatewayConnectionPusher {
    fn post_to_connection(&self, connection_id: &str, data: &[u8]) -> Result<(), String> {
        let request = self
            .client
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(data.to_vec()));

        block_on_current(request.send())
            .map(|_| ())
            .map_err(|error| {
                format!(
                    "failed to post to connection {connection_id}: {}",
                    aws_sdk_apigatewaymanagement::error::DisplayErrorContext(&error)
                )
            })
    }
}

struct RuntimeDependencies {
    agent_runtime: BedrockAgentRuntime,
    pusher: ApiGatewayConnectionPusher,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<RelaySummary, Error> {
    Ok(handle_relay_payload(
        event.payload,
        &deps.agent_runtime,
        &deps.pusher,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = AgentRelayConfig::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let bedrock_config = aws_sdk_bedrockagentruntime::config::Builder::from(&aws_config)
        .retry_config(RetryConfig::disabled())
        .timeout_config(
            TimeoutConfig::builder()
                .connect_timeout(AGENT_CONNECT_TIMEOUT)
                .read_timeout(AGENT_READ_TIMEOUT)
                .build(),
        )
        .build();
    let gateway_config = aws_sdk_apigatewaymanagement::config::Builder::from(&aws_config)
        .endpoint_url(&config.websocket_callback_url)
        .build();

    let deps = RuntimeDependencies {
        agent_runtime: BedrockAgentRuntime {
            client: aws_sdk_bedrockagentruntime::Client::from_conf(bedrock_config),
            agent_id: config.agent_id,
            agent_alias_id: config.agent_alias_id,
        },
        pusher: ApiGatewayConnectionPusher {
            client: aws_sdk_apigatewaymanagement::Client::from_conf(gateway_config),
        },
    };

    let deps = &deps;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(event, deps).await
    }))
    .await
}
