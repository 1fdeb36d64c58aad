use agent_bridge_core::index_schema::{
    ProvisionResponse, OPENSEARCH_HTTPS_PORT, OPENSEARCH_SERVERLESS_SERVICE,
};
use agent_bridge_lambda::adapters::blocking::block_on_current;
use agent_bridge_lambda::adapters::index_admin::IndexAdmin;
use agent_bridge_lambda::config::IndexProvisionerConfig;
use agent_bridge_lambda::handlers::index_provisioner::handle_provision_event;
use agent_bridge_lambda::telemetry::init_tracing;
use aws_config::{Region, SdkConfig};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use opensearch::auth::Credentials;
use opensearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use opensearch::http::Url;
use opensearch::indices::IndicesCreateParts;
use opensearch::OpenSearch;
use serde_json::Value;

/// SigV4-signed OpenSearch Serverless client, built per call since the
/// collection endpoint arrives with each event.
struct ServerlessIndexAdmin {
    aws_config: SdkConfig,
}

impl ServerlessIndexAdmin {
    fn client_for(&self, host: &str) -> Result<OpenSearch, String> {
        let url = Url::parse(&format!("https://{host}:{OPENSEARCH_HTTPS_PORT}"))
            .map_err(|error| format!("invalid opensearch host '{host}': {error}"))?;
        let credentials: Credentials = self
            .aws_config
            .clone()
            .try_into()
            .map_err(|error| format!("failed to load aws credentials: {error}"))?;
        let transport = TransportBuilder::new(SingleNodeConnectionPool::new(url))
            .auth(credentials)
            .service_name(OPENSEARCH_SERVERLESS_SERVICE)
            .build()
            .map_err(|error| format!("failed to build opensearch transport: {error}"))?;
        Ok(OpenSearch::new(transport))
    }
}

impl IndexAdmin for ServerlessIndexAdmin {
    fn create_index(&self, host: &str, index_name: &str, body: &Value) -> Result<Value, String> {
        let client = self.client_for(host)?;
        let body = body.clone();

        block_on_current(async move {
            let response = client
                .indices()
                .create(IndicesCreateParts::Index(index_name))
                .body(body)
                .send()
                .await
                .map_err(|error| format!("create index request failed: {error}"))?;
            let status = response.status_code();
            let payload = response
                .json::<Value>()
                .await
                .map_err(|error| format!("failed to read create index response: {error}"))?;
            if status.is_success() {
                Ok(payload)
            } else {
                Err(format!("{} {payload}", status.as_u16()))
            }
        })
    }
}

async fn handle_request(
    event: LambdaEvent<Value>,
    admin: &ServerlessIndexAdmin,
) -> Result<ProvisionResponse, Error> {
    Ok(handle_provision_event(event.payload, admin))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = IndexProvisionerConfig::from_env()?;
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region))
        .load()
        .await;
    let admin = ServerlessIndexAdmin { aws_config };

    let admin = &admin;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(event, admin).await
    }))
    .await
}
