pub mod auth;
pub mod brokers;
pub mod dashboard;
pub mod marketplace;
pub mod orders;
pub mod strategy_form;
pub mod workbench;
