pub mod agent_runtime;
pub mod blocking;
pub mod clock;
pub mod connection;
pub mod index_admin;
pub mod query_engine;
