use std::time::{Duration, Instant};

use agent_bridge_core::action_group::{
    unrecognized_route_message, ActionGroupEvent, ActionGroupResponse, Route,
};
use agent_bridge_core::query::{
    normalize_query_text, query_fingerprint, QueryError, QueryFailure, QueryOutcome, QueryState,
    QueryStatusReport,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::adapters::clock::Sleeper;
use crate::adapters::query_engine::QueryEngine;
use crate::config::QueryExecutorConfig;

const COMPONENT: &str = "query_executor";

/// Entry point for action-group invocations. Always produces an envelope:
/// 200 for the query route (success or structured failure), 404 otherwise.
///
/// `time_budget` caps how long polling may run, on top of the poll policy.
pub fn handle_action_group_event(
    event: ActionGroupEvent,
    config: &QueryExecutorConfig,
    engine: &impl QueryEngine,
    sleeper: &impl Sleeper,
    time_budget: Option<Duration>,
) -> ActionGroupResponse {
    debug!(component = COMPONENT, event = "event_received", payload = ?event);

    let (status_code, body) = match Route::resolve(event.api_path.as_deref()) {
        Route::AthenaQuery => (
            200,
            run_athena_query(&event, config, engine, sleeper, time_budget),
        ),
        Route::Unrecognized => {
            let message = unrecognized_route_message(
                event.action_group.as_deref(),
                event.api_path.as_deref(),
            );
            warn!(component = COMPONENT, event = "route_unrecognized", %message);
            (404, Value::String(message))
        }
    };

    ActionGroupResponse::new(&event, status_code, body)
}

fn run_athena_query(
    event: &ActionGroupEvent,
    config: &QueryExecutorConfig,
    engine: &impl QueryEngine,
    sleeper: &impl Sleeper,
    time_budget: Option<Duration>,
) -> Value {
    let event_query = event.query_text();
    match execute_query(event_query, config, engine, sleeper, time_budget) {
        Ok(outcome) => outcome.into_body(),
        Err(query_error) => {
            error!(
                component = COMPONENT,
                event = "query_error",
                kind = query_error.kind(),
                error = %query_error,
            );
            query_error.into_body(event_query)
        }
    }
}

/// Submits the query and waits for it to finish.
///
/// Engine-reported FAILED/CANCELLED comes back as `QueryOutcome::Failed`;
/// `Err` is reserved for missing input, engine transport failures, and
/// running out of status checks or time.
pub fn execute_query(
    raw_query: Option<&str>,
    config: &QueryExecutorConfig,
    engine: &impl QueryEngine,
    sleeper: &impl Sleeper,
    time_budget: Option<Duration>,
) -> Result<QueryOutcome, QueryError> {
    let raw_query = raw_query.ok_or(QueryError::MissingQuery)?;
    let query = normalize_query_text(raw_query);
    let fingerprint = query_fingerprint(&query);
    debug!(component = COMPONENT, event = "query_text", %fingerprint, %query);

    let started_at = Instant::now();
    let query_execution_id = engine
        .start_query(&query, &config.output_location())
        .map_err(QueryError::Engine)?;
    info!(
        component = COMPONENT,
        event = "query_submitted",
        %fingerprint,
        query_execution_id = %query_execution_id,
    );

    let report = wait_for_terminal_state(
        &query_execution_id,
        &query,
        config,
        engine,
        sleeper,
        PollClock {
            started_at,
            time_budget,
        },
    )?;

    let outcome = match report.state {
        QueryState::Succeeded => QueryOutcome::Succeeded(
            engine
                .query_results(&query_execution_id)
                .map_err(QueryError::Engine)?,
        ),
        _ => QueryOutcome::Failed(QueryFailure::from_report(
            query_execution_id.clone(),
            &report,
            query,
        )),
    };

    info!(
        component = COMPONENT,
        event = "query_finished",
        %fingerprint,
        query_execution_id = %query_execution_id,
        status = outcome.status(),
        duration_ms = started_at.elapsed().as_millis() as u64,
    );
    Ok(outcome)
}

struct PollClock {
    started_at: Instant,
    time_budget: Option<Duration>,
}

impl PollClock {
    /// Whether sleeping `delay` more would overrun the budget. Time is the
    /// larger of wall-clock elapsed and the pauses requested so far.
    fn overruns(&self, slept: Duration, delay: Duration) -> bool {
        self.time_budget.is_some_and(|budget| {
            self.started_at.elapsed().max(slept).saturating_add(delay) > budget
        })
    }
}

fn wait_for_terminal_state(
    query_execution_id: &str,
    query: &str,
    config: &QueryExecutorConfig,
    engine: &impl QueryEngine,
    sleeper: &impl Sleeper,
    clock: PollClock,
) -> Result<QueryStatusReport, QueryError> {
    let policy = &config.poll_policy;
    let mut slept = Duration::ZERO;
    let mut attempts = 0;
    for check_index in 0..policy.max_attempts {
        attempts = check_index + 1;
        let report = engine
            .query_status(query_execution_id)
            .map_err(QueryError::Engine)?;
        debug!(
            component = COMPONENT,
            event = "query_polled",
            query_execution_id,
            attempt = check_index + 1,
            state = %report.state,
        );
        if report.state.is_terminal() {
            return Ok(report);
        }
        if attempts == policy.max_attempts {
            break;
        }
        let delay = policy.delay_after(check_index);
        if clock.overruns(slept, delay) {
            warn!(
                component = COMPONENT,
                event = "poll_deadline_reached",
                query_execution_id,
                attempts,
                slept_ms = slept.as_millis() as u64,
            );
            break;
        }
        sleeper.sleep(delay);
        slept += delay;
    }

    Err(QueryError::PollExhausted {
        query_execution_id: query_execution_id.to_string(),
        attempts,
        query: query.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    use agent_bridge_core::poll::PollPolicy;
    use agent_bridge_core::query::QueryResultSet;
    use serde_json::json;

    use super::*;

    struct ScriptedEngine {
        states: RefCell<VecDeque<QueryStatusReport>>,
        status_checks: RefCell<usize>,
    }

    impl ScriptedEngine {
        fn new(states: Vec<QueryStatusReport>) -> Self {
            Self {
                states: RefCell::new(states.into()),
                status_checks: RefCell::new(0),
            }
        }
    }

    impl QueryEngine for ScriptedEngine {
        fn start_query(&self, _query: &str, _output_location: &str) -> Result<String, String> {
            Ok("exec-1".to_string())
        }

        fn query_status(&self, _id: &str) -> Result<QueryStatusReport, String> {
            *self.status_checks.borrow_mut() += 1;
            let mut states = self.states.borrow_mut();
            if states.len() > 1 {
                Ok(states.pop_front().expect("scripted state"))
            } else {
                Ok(states.front().cloned().expect("scripted state"))
            }
        }

        fn query_results(&self, _id: &str) -> Result<QueryResultSet, String> {
            Ok(QueryResultSet::default())
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        pauses: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.pauses.borrow_mut().push(duration);
        }
    }

    fn config(policy: PollPolicy) -> QueryExecutorConfig {
        QueryExecutorConfig {
            output_bucket: "results".to_string(),
            poll_policy: policy,
        }
    }

    #[test]
    fn stops_polling_at_the_attempt_limit() {
        let engine = ScriptedEngine::new(vec![QueryStatusReport::new(QueryState::Running)]);
        let sleeper = RecordingSleeper::default();

        let error = execute_query(
            Some("SELECT 1"),
            &config(PollPolicy::fixed(Duration::from_secs(1), 3)),
            &engine,
            &sleeper,
            None,
        )
        .expect_err("query should never finish");

        assert_eq!(*engine.status_checks.borrow(), 3);
        assert_eq!(sleeper.pauses.borrow().len(), 2);
        assert!(matches!(error, QueryError::PollExhausted { attempts: 3, .. }));
    }

    #[test]
    fn backs_off_between_checks() {
        let engine = ScriptedEngine::new(vec![
            QueryStatusReport::new(QueryState::Queued),
            QueryStatusReport::new(QueryState::Running),
            QueryStatusReport::new(QueryState::Running),
            QueryStatusReport::new(QueryState::Succeeded),
        ]);
        let sleeper = RecordingSleeper::default();

        let outcome = execute_query(
            Some("SELECT 1"),
            &config(PollPolicy::default()),
            &engine,
            &sleeper,
            None,
        )
        .expect("query should succeed");

        assert_eq!(outcome, QueryOutcome::Succeeded(QueryResultSet::default()));
        assert_eq!(
            *sleeper.pauses.borrow(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn terminal_first_check_never_sleeps() {
        let engine = ScriptedEngine::new(vec![
            QueryStatusReport::new(QueryState::Cancelled).with_reason("user cancelled")
        ]);
        let sleeper = RecordingSleeper::default();

        let outcome = execute_query(
            Some("SELECT 1"),
            &config(PollPolicy::default()),
            &engine,
            &sleeper,
            None,
        )
        .expect("cancelled query is an outcome");

        assert!(sleeper.pauses.borrow().is_empty());
        assert_eq!(outcome.status(), "CANCELLED");
        assert_eq!(
            outcome.into_body()["Error"],
            json!("The query failed: user cancelled")
        );
    }

    #[test]
    fn stops_polling_before_the_time_budget_runs_out() {
        let engine = ScriptedEngine::new(vec![QueryStatusReport::new(QueryState::Running)]);
        let sleeper = RecordingSleeper::default();

        let error = execute_query(
            Some("SELECT * FROM huge_table"),
            &config(PollPolicy::default()),
            &engine,
            &sleeper,
            Some(Duration::from_secs(20)),
        )
        .expect_err("budget should run out first");

        // 1 + 2 + 4 + 8 = 15s slept; the next 8s pause would pass 20s
        assert_eq!(
            *sleeper.pauses.borrow(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
        assert_eq!(*engine.status_checks.borrow(), 5);
        assert!(matches!(error, QueryError::PollExhausted { attempts: 5, .. }));
    }

    #[test]
    fn exhausted_budget_still_checks_once() {
        let engine = ScriptedEngine::new(vec![QueryStatusReport::new(QueryState::Running)]);
        let sleeper = RecordingSleeper::default();

        let error = execute_query(
            Some("SELECT 1"),
            &config(PollPolicy::default()),
            &engine,
            &sleeper,
            Some(Duration::ZERO),
        )
        .expect_err("no time to wait");

        assert_eq!(*engine.status_checks.borrow(), 1);
        assert!(sleeper.pauses.borrow().is_empty());
        assert!(matches!(error, QueryError::PollExhausted { attempts: 1, .. }));
    }
}
