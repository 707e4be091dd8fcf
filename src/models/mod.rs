pub mod activity;
pub mod agent_memory;
pub mod app_state;
pub mod profile;
