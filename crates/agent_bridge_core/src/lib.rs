//! Shared agent bridge domain primitives.
//!
//! This crate owns the action-group and relay wire contracts, query polling
//! policy, completion accumulation, and the vector index schema. It
//! intentionally excludes AWS SDK and Lambda runtime concerns.

pub mod action_group;
pub mod index_schema;
pub mod poll;
pub mod query;
pub mod relay;
