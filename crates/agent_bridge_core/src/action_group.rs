use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MESSAGE_VERSION: &str = "1.0";
pub const ATHENA_QUERY_PATH: &str = "/athenaQuery";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Payload an agent action group sends to its Lambda.
///
/// `requestBody` stays untyped so that a missing query is reported by the
/// handler as an input error instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroupEvent {
    #[serde(default)]
    pub action_group: Option<String>,
    #[serde(default)]
    pub api_path: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub request_body: Value,
}

impl ActionGroupEvent {
    /// Reads `requestBody.content["application/json"].properties[0].value`.
    pub fn query_text(&self) -> Option<&str> {
        extract_query_text(&self.request_body)
    }
}

pub fn extract_query_text(request_body: &Value) -> Option<&str> {
    request_body
        .get("content")?
        .get(JSON_CONTENT_TYPE)?
        .get("properties")?
        .get(0)?
        .get("value")?
        .as_str()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    AthenaQuery,
    Unrecognized,
}

impl Route {
    pub fn resolve(api_path: Option<&str>) -> Self {
        match api_path {
            Some(ATHENA_QUERY_PATH) => Self::AthenaQuery,
            _ => Self::Unrecognized,
        }
    }
}

pub fn unrecognized_route_message(action_group: Option<&str>, api_path: Option<&str>) -> String {
    format!(
        "Unrecognized api path: {}::{}",
        action_group.unwrap_or("None"),
        api_path.unwrap_or("None"),
    )
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionGroupResponse {
    #[serde(rename = "messageVersion")]
    pub message_version: String,
    pub response: ActionResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub action_group: Option<String>,
    pub api_path: Option<String>,
    pub http_method: Option<String>,
    pub http_status_code: u16,
    pub response_body: ResponseBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseBody {
    #[serde(rename = "application/json")]
    pub application_json: JsonBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonBody {
    pub body: Value,
}

impl ActionGroupResponse {
    /// Wraps `body` in the envelope the agent expects, echoing the routing
    /// fields of the triggering event.
    pub fn new(event: &ActionGroupEvent, http_status_code: u16, body: Value) -> Self {
        Self {
            message_version: MESSAGE_VERSION.to_string(),
            response: ActionResponse {
                action_group: event.action_group.clone(),
                api_path: event.api_path.clone(),
                http_method: event.http_method.clone(),
                http_status_code,
                response_body: ResponseBody {
                    application_json: JsonBody { body },
                },
            },
        }
    }

    pub fn status_code(&self) -> u16 {
        self.response.http_status_code
    }

    pub fn body(&self) -> &Value {
        &self.response.response_body.application_json.body
    }
}

/// Converts a contract value into JSON for a response body.
pub fn contract_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or_else(|error| {
        json!({
            "Error": format!("An exception occurred: failed to serialize result: {error}"),
        })
    })
}
