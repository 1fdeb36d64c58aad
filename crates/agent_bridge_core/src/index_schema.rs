use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const VECTOR_FIELD: &str = "bedrock-knowledge-base-default-vector";
pub const VECTOR_DIMENSION: u32 = 1536;
pub const OPENSEARCH_SERVERLESS_SERVICE: &str = "aoss";
pub const OPENSEARCH_HTTPS_PORT: u16 = 443;

/// Target collection and index for one provisioning call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexProvisionRequest {
    #[serde(rename = "OPENSEARCH_HTTPS_ENDPOINT")]
    pub endpoint: String,
    #[serde(rename = "INDEX_NAME")]
    pub index_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisionResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl ProvisionResponse {
    pub fn created() -> Self {
        Self::with_message(200, "Vector index created successfully")
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self::with_message(500, &format!("Error creating vector index: {error}"))
    }

    // body is a JSON-encoded string, not bare text
    fn with_message(status_code: u16, message: &str) -> Self {
        Self {
            status_code,
            body: Value::String(message.to_string()).to_string(),
        }
    }
}

/// Host name without the URL scheme.
pub fn strip_scheme(endpoint: &str) -> &str {
    endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint)
}

/// Index body a Bedrock knowledge base expects: one FAISS HNSW vector
/// field plus the text fields the knowledge base writes alongside it.
pub fn vector_index_body() -> Value {
    json!({
        "settings": {"index": {"knn": true}},
        "mappings": {
            "properties": {
                VECTOR_FIELD: {
                    "type": "knn_vector",
                    "dimension": VECTOR_DIMENSION,
                    "method": {
                        "name": "hnsw",
                        "engine": "faiss",
                        "parameters": {"ef_construction": 512, "m": 16},
                        "space_type": "l2",
                    },
                },
                "AMAZON_BEDROCK_METADATA": {"type": "text", "index": "false"},
                "AMAZON_BEDROCK_TEXT_CHUNK": {"type": "text", "index": "true"},
                "id": {"type": "text", "index": "true"},
                "x-amz-bedrock-kb-data-source-id": {"type": "text", "index": "true"},
                "x-amz-bedrock-kb-source-uri": {"type": "text", "index": "true"},
            }
        }
    })
}
