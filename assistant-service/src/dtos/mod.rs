//! Request/response payloads.

pub mod assistants;
pub mod conversations;
pub mod users;
