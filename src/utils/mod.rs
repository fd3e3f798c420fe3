pub mod api;
pub mod chartdata;
pub mod config;
pub mod debounce;
pub mod firebase;
pub mod models;
pub mod server;
pub mod session;
