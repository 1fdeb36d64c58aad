use agent_bridge_core::action_group::{ActionGroupEvent, ActionGroupResponse};
use std::time::SystemTime;

use agent_bridge_core::query::{QueryResultSet, QueryState, QueryStatusReport};
use agent_bridge_lambda::adapters::blocking::block_on_current;
use agent_bridge_lambda::adapters::clock::{time_budget, ThreadSleeper};
use agent_bridge_lambda::adapters::query_engine::{result_set_from_sdk, QueryEngine};
use agent_bridge_lambda::config::QueryExecutorConfig;
use agent_bridge_lambda::handlers::query_executor::handle_action_group_event;
use agent_bridge_lambda::telemetry::init_tracing;
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::ResultConfiguration;
use lambda_runtime::{service_fn, Error, LambdaEvent};

struct AthenaQueryEngine {
    client: aws_sdk_athena::Client,
}

impl QueryEngine for AthenaQueryEngine {
    fn start_query(&self, query: &str, output_location: &str) -> Result<String, String> {
        let request = self
            .client
            .start_query_execution()
            .query_string(query)
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(output_location)
                    .build(),
            );

        let output = block_on_current(request.send()).map_err(|error| {
            format!(
                "failed to start athena query: {}",
                DisplayErrorContext(&error)
            )
        })?;
        output
            .query_execution_id()
            .map(str::to_string)
            .ok_or_else(|| "athena did not return a query execution id".to_string())
    }

    fn query_status(&self, query_execution_id: &str) -> Result<QueryStatusReport, String> {
        let request = self
            .client
            .get_query_execution()
            .query_execution_id(query_execution_id);

        let output = block_on_current(request.send()).map_err(|error| {
            format!(
                "failed to read athena query status: {}",
                DisplayErrorContext(&error)
            )
        })?;
        let status = output
            .query_execution()
            .and_then(|execution| execution.status())
            .ok_or_else(|| format!("athena returned no status for {query_execution_id}"))?;
        let state = status
            .state()
            .map(|state| QueryState::parse(state.as_str()))
            .ok_or_else(|| format!("athena returned no state for {query_execution_id}"))?;

        Ok(QueryStatusReport {
            state,
            state_change_reason: status.state_change_reason().map(str::to_string),
        })
    }

    fn query_results(&self, query_execution_id: &str) -> Result<QueryResultSet, String> {
        let request = self
            .client
            .get_query_results()
            .query_execution_id(query_execution_id);

        let output = block_on_current(request.send()).map_err(|error| {
            format!(
                "failed to fetch athena query results: {}",
                DisplayErrorContext(&error)
            )
        })?;

        Ok(result_set_from_sdk(&output))
    }
}

async fn handle_request(
    event: LambdaEvent<ActionGroupEvent>,
    config: &QueryExecutorConfig,
    engine: &AthenaQueryEngine,
) -> Result<ActionGroupResponse, Error> {
    let budget = time_budget(event.context.deadline, SystemTime::now());
    Ok(handle_action_group_event(
        event.payload,
        config,
        engine,
        &ThreadSleeper,
        Some(budget),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = QueryExecutorConfig::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let engine = AthenaQueryEngine {
        client: aws_sdk_athena::Client::new(&aws_config),
    };

    let config = &config;
    let engine = &engine;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<ActionGroupEvent>| async move {
        handle_request(event, config, engine).await
    }))
    .await
}
