//! Durable storage: directory layout and the persisted deployment state

pub mod layout;
pub mod state;
