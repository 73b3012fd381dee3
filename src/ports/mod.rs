//! Port traits the domain consumes; implemented in [`crate::adapters`].

pub mod config_port;
pub mod data_port;
pub mod quote_port;
pub mod report_port;
