//! Core domain types and logic.

pub mod bar;
pub mod timeframe;
pub mod trade;
pub mod pair_profile;
pub mod outcome;
pub mod simulator;
pub mod metrics;
pub mod batch;
pub mod report;
pub mod config_validation;
pub mod error;
