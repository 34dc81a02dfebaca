//! Command handlers behind the two binaries

pub mod daemon;
pub mod query;

pub use daemon::handle_daemon;
pub use query::handle_query;
