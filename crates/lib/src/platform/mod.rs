//! Host environment lookups.

pub mod paths;
mod signal;
mod user;

pub use signal::shutdown_signal;
pub use user::{HostUser, host_user};
