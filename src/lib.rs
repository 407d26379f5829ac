//! Fact bot — a guided conversation that collects labeled facts about each
//! user and keeps them across restarts.

pub mod channels;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod store;
