pub mod chunked;
pub mod endpoint;
pub mod event;
pub mod hooks;
pub mod mirror;
pub mod progress;
pub mod resource;
pub mod transport;
