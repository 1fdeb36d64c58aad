use agent_bridge_core::relay::{
    Citation, CompletionChunk, RelayError, RelayRequest, RetrievedReference,
};
use aws_sdk_bedrockagentruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockagentruntime::types::PayloadPart;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInvocation {
    pub session_id: String,
    pub input_text: String,
}

impl From<&RelayRequest> for AgentInvocation {
    fn from(request: &RelayRequest) -> Self {
        Self {
            session_id: request.session_id.clone(),
            input_text: request.user_query.clone(),
        }
    }
}

/// Lazy, finite, non-restartable sequence of completion chunks.
/// `Ok(None)` marks the end of the stream.
pub trait CompletionStream {
    fn next_chunk(&mut self) -> Result<Option<CompletionChunk>, RelayError>;
}

pub trait AgentRuntime {
    fn invoke_agent<'a>(
        &'a self,
        invocation: &AgentInvocation,
    ) -> Result<Box<dyn CompletionStream + 'a>, RelayError>;
}

/// Converts one streamed payload part into a completion chunk. Citations
/// keep their reference order; references without an S3 location carry no
/// source URI.
pub fn chunk_from_payload(part: &PayloadPart) -> CompletionChunk {
    let text = part
        .bytes()
        .map(|bytes| String::from_utf8_lossy(bytes.as_ref()).into_owned())
        .unwrap_or_default();

    let citations = part
        .attribution()
        .map(|attribution| {
            attribution
                .citations()
                .iter()
                .map(|citation| Citation {
                    retrieved_references: citation
                        .retrieved_references()
                        .iter()
                        .map(|reference| RetrievedReference {
                            source_uri: reference
                                .location()
                                .and_then(|location| location.s3_location())
                                .and_then(|s3_location| s3_location.uri())
                                .map(str::to_string),
                        })
                        .collect(),
                })
                .collect()
        })
        .unwrap_or_default();

    CompletionChunk { text, citations }
}

/// Sorts an SDK failure into the relay taxonomy: timeouts (including
/// dispatch failures caused by one) become `Timeout`, modeled service
/// errors become `Client`, everything else is `Transport`.
pub fn classify_sdk_error<E, R>(error: SdkError<E, R>) -> RelayError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match &error {
        SdkError::TimeoutError(_) => RelayError::Timeout(DisplayErrorContext(&error).to_string()),
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            RelayError::Timeout(DisplayErrorContext(&error).to_string())
        }
        SdkError::ServiceError(context) => {
            let service_error = context.err();
            RelayError::Client {
                code: service_error.code().map(str::to_string),
                message: service_error
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| DisplayErrorContext(&error).to_string()),
            }
        }
        _ => RelayError::Transport(DisplayErrorContext(&error).to_string()),
    }
}
