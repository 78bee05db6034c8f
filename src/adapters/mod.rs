//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_report_adapter;
pub mod setup_csv;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod text_report_adapter;
