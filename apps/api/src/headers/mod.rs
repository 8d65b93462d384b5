pub mod config_sync;
pub mod discovery;
pub mod handlers;
pub mod registry;
