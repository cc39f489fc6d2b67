pub mod client;
pub mod config;
pub mod error;
pub mod log_sanitize;
pub mod model;
pub mod normalize;
pub mod poller;
pub mod report;
pub mod session;
pub mod tracker;
pub mod ui;
pub mod watch;

pub use error::{Error, Result};
