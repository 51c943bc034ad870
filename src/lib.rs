// Public API for integration tests and potential library usage

pub mod api;
pub mod code;
pub mod config;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod room;
pub mod state;
pub mod store;
pub mod sweep;
pub mod types;
pub mod words;
pub mod ws;
