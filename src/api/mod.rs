pub mod activities;
pub mod agent_memory;
pub mod profile;
