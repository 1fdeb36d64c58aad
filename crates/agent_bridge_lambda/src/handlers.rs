pub mod agent_relay;
pub mod index_provisioner;
pub mod query_executor;
