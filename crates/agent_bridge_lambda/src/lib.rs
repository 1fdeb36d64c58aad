//! AWS-oriented adapters and handlers for the agent bridge functions.
//!
//! This crate owns runtime integration details (Lambda handlers, environment
//! configuration, and the seams to Athena, Bedrock, API Gateway, and
//! OpenSearch). Contracts and deterministic shaping live in
//! `agent_bridge_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod telemetry;
