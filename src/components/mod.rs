pub mod backtest;
pub mod charts;
pub mod chat;
pub mod code_editor;
pub mod flow_builder;
pub mod status;
pub mod template;
