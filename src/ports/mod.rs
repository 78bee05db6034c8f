//! Port traits: the boundaries between the simulation core and its I/O.

pub mod config_port;
pub mod data_port;
pub mod report_port;
pub mod run_store_port;
