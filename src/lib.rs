pub mod auth;
pub mod handler;
pub mod log;
pub mod properties;
pub mod server;
pub mod wire;

pub use log::{Config, Log, LogError, SegmentConfig};
pub use server::{CommitLog, Server};
