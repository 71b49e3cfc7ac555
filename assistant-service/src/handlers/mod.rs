//! HTTP handlers.

pub mod assistants;
pub mod chat;
pub mod conversations;
pub mod health;
pub mod users;
