pub mod arbiter;
pub mod chat;
pub mod flow;
