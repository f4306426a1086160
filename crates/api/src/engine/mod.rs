//! Server-side engines: the completion pipeline and the heartbeat monitor.

pub mod completion;
pub mod monitor;
