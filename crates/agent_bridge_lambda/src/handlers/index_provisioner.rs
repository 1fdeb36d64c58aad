use agent_bridge_core::index_schema::{
    strip_scheme, vector_index_body, IndexProvisionRequest, ProvisionResponse,
};
use serde_json::Value;
use tracing::{error, info};

use crate::adapters::index_admin::IndexAdmin;

const COMPONENT: &str = "index_provisioner";

/// Creates the knowledge-base vector index named in the event. One call, no
/// retry; every outcome is reported through the status code.
pub fn handle_provision_event(event: Value, admin: &impl IndexAdmin) -> ProvisionResponse {
    let request = match serde_json::from_value::<IndexProvisionRequest>(event) {
        Ok(value) => value,
        Err(parse_error) => {
            error!(component = COMPONENT, event = "request_invalid", error = %parse_error);
            return ProvisionResponse::failed(format!("invalid request: {parse_error}"));
        }
    };

    let host = strip_scheme(&request.endpoint);
    match admin.create_index(host, &request.index_name, &vector_index_body()) {
        Ok(response) => {
            info!(
                component = COMPONENT,
                event = "index_created",
                host,
                index_name = %request.index_name,
                response = %response,
            );
            ProvisionResponse::created()
        }
        Err(create_error) => {
            error!(
                component = COMPONENT,
                event = "index_create_failed",
                host,
                index_name = %request.index_name,
                error = %create_error,
            );
            ProvisionResponse::failed(create_error)
        }
    }
}
