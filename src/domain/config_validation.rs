//! Configuration validation.
//!
//! Validates the `[simulation]` section before any trade is simulated and
//! merges it over the pair profile of the traded symbol.

use std::str::FromStr;

use crate::domain::error::PipreplayError;
use crate::domain::pair_profile::profile_for;
use crate::domain::simulator::SimulationParams;
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "simulation";

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), PipreplayError> {
    validate_cutoff_hour(config)?;
    validate_utc_offset(config)?;
    validate_pip_size(config)?;
    validate_tp1_close_pct(config)?;
    Ok(())
}

/// Simulation parameters for `symbol`: config values where present, the
/// symbol's pair profile otherwise.
pub fn simulation_params_from_config(
    config: &dyn ConfigPort,
    symbol: &str,
) -> Result<SimulationParams, PipreplayError> {
    validate_simulation_config(config)?;
    let base = SimulationParams::for_profile(&profile_for(symbol));

    let params = SimulationParams {
        session_cutoff_hour: config.get_int(
            SECTION,
            "session_cutoff_hour",
            i64::from(base.session_cutoff_hour),
        ) as u32,
        utc_offset_hours: config.get_int(
            SECTION,
            "utc_offset_hours",
            i64::from(base.utc_offset_hours),
        ) as i32,
        pip_size: config.get_double(SECTION, "pip_size", base.pip_size),
        tp1_close_fraction: config.get_double(
            SECTION,
            "tp1_close_pct",
            base.tp1_close_fraction * 100.0,
        ) / 100.0,
    };
    params.validate()?;
    Ok(params)
}

fn invalid(key: &str, reason: String) -> PipreplayError {
    PipreplayError::ConfigInvalid {
        section: SECTION.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn parsed<T: FromStr>(config: &dyn ConfigPort, key: &str) -> Result<Option<T>, PipreplayError> {
    match config.get_string(SECTION, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(key, format!("'{raw}' is not a valid number"))),
    }
}

fn validate_cutoff_hour(config: &dyn ConfigPort) -> Result<(), PipreplayError> {
    if let Some(hour) = parsed::<i64>(config, "session_cutoff_hour")? {
        if !(0..=24).contains(&hour) {
            return Err(invalid(
                "session_cutoff_hour",
                "session_cutoff_hour must be between 0 and 24".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_utc_offset(config: &dyn ConfigPort) -> Result<(), PipreplayError> {
    if let Some(offset) = parsed::<i64>(config, "utc_offset_hours")? {
        if !(-23..=23).contains(&offset) {
            return Err(invalid(
                "utc_offset_hours",
                "utc_offset_hours must be between -23 and 23".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_pip_size(config: &dyn ConfigPort) -> Result<(), PipreplayError> {
    if let Some(pip) = parsed::<f64>(config, "pip_size")? {
        if !(pip.is_finite() && pip > 0.0) {
            return Err(invalid("pip_size", "pip_size must be positive".to_string()));
        }
    }
    Ok(())
}

fn validate_tp1_close_pct(config: &dyn ConfigPort) -> Result<(), PipreplayError> {
    if let Some(pct) = parsed::<f64>(config, "tp1_close_pct")? {
        if !(0.0..=100.0).contains(&pct) {
            return Err(invalid(
                "tp1_close_pct",
                "tp1_close_pct must be between 0 and 100".to_string(),
            ));
        }
    }
    Ok(())
}
