//! HTTP request handlers, grouped by resource.

pub mod credits;
pub mod tasks;
pub mod workers;
