pub mod attachments;
pub mod commands;
pub mod handler;
pub mod responder;
