// Public API for integration tests and potential library usage

pub mod api;
pub mod blob;
pub mod config;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod state;
pub mod transport;
pub mod types;
pub mod ws;
